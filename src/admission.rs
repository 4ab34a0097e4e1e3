//! Per-IP concurrent-connection admission control.
//!
//! Disjoint from the file cache's lock: this is its own mutex guarding its own map, so admission
//! checks never contend with cache reads.

use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks how many connections are currently open per client IP, rejecting new ones past a fixed
/// ceiling.
pub struct AdmissionTable {
    counts: Mutex<HashMap<String, usize>>,
    max_per_ip: usize,
}

impl AdmissionTable {
    /// Creates a table that admits at most `max_per_ip` concurrent connections per IP.
    pub fn new(max_per_ip: usize) -> Self {
        AdmissionTable {
            counts: Mutex::new(HashMap::new()),
            max_per_ip,
        }
    }

    /// Attempts to reserve a slot for `ip`. Empty IP strings are always admitted and never
    /// tracked (used for connections whose peer address couldn't be determined). Returns `false`
    /// if `ip` is already at the per-IP ceiling.
    pub fn try_acquire(&self, ip: &str) -> bool {
        if ip.is_empty() {
            return true;
        }
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(ip.to_string()).or_insert(0);
        if *count >= self.max_per_ip {
            return false;
        }
        *count += 1;
        true
    }

    /// Releases a previously-acquired slot for `ip`. Removes the entry entirely once its count
    /// would drop to zero. No-op for empty IP strings, and safe to call on an IP with no tracked
    /// slot (a no-op in that case too).
    pub fn release(&self, ip: &str) {
        if ip.is_empty() {
            return;
        }
        let mut counts = self.counts.lock().unwrap();
        if let Some(count) = counts.get_mut(ip) {
            if *count > 1 {
                *count -= 1;
            } else {
                counts.remove(ip);
            }
        }
    }
}

impl std::fmt::Debug for AdmissionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionTable")
            .field("max_per_ip", &self.max_per_ip)
            .field("tracked_ips", &self.counts.lock().unwrap().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_per_ip_ceiling() {
        let table = AdmissionTable::new(2);
        assert!(table.try_acquire("1.2.3.4"));
        assert!(table.try_acquire("1.2.3.4"));
        assert!(!table.try_acquire("1.2.3.4"));
    }

    #[test]
    fn the_101st_connection_is_rejected_at_default_ceiling() {
        let table = AdmissionTable::new(100);
        for _ in 0..100 {
            assert!(table.try_acquire("9.9.9.9"));
        }
        assert!(!table.try_acquire("9.9.9.9"));
    }

    #[test]
    fn release_frees_a_slot_for_reuse() {
        let table = AdmissionTable::new(1);
        assert!(table.try_acquire("1.2.3.4"));
        assert!(!table.try_acquire("1.2.3.4"));
        table.release("1.2.3.4");
        assert!(table.try_acquire("1.2.3.4"));
    }

    #[test]
    fn entry_is_removed_once_count_drops_to_zero() {
        let table = AdmissionTable::new(5);
        table.try_acquire("1.2.3.4");
        table.release("1.2.3.4");
        assert_eq!(0, table.counts.lock().unwrap().len());
    }

    #[test]
    fn empty_ip_is_always_admitted_and_never_tracked() {
        let table = AdmissionTable::new(1);
        assert!(table.try_acquire(""));
        assert!(table.try_acquire(""));
        assert!(table.counts.lock().unwrap().is_empty());
    }

    #[test]
    fn different_ips_have_independent_ceilings() {
        let table = AdmissionTable::new(1);
        assert!(table.try_acquire("1.1.1.1"));
        assert!(table.try_acquire("2.2.2.2"));
        assert!(!table.try_acquire("1.1.1.1"));
    }
}
