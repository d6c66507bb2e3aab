// src/utils/system.rs: System functions

use sysinfo::System;

/// Determines how many per-file external invocations may run at once:
/// the requested thread count bounded by the physical cores actually
/// present, never less than one.
pub fn compute_worker_slots(requested: usize) -> usize {
    let physical_cores = System::physical_core_count().unwrap_or(1);
    physical_cores.min(requested).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_slots_at_least_one() {
        assert_eq!(compute_worker_slots(0), 1);
    }

    #[test]
    fn test_worker_slots_bounded_by_request() {
        assert!(compute_worker_slots(2) <= 2);
    }

    #[test]
    fn test_worker_slots_bounded_by_cores() {
        let physical = System::physical_core_count().unwrap_or(1);
        assert!(compute_worker_slots(usize::MAX) <= physical.max(1));
    }
}
