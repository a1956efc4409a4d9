//! Host port selection over the union of local and remote records.

use outpost_common::StateCollection;

use crate::domain::error::PortAllocationError;

pub const DEFAULT_BASE_PORT: u32 = 27018;
pub const MIN_BASE_PORT: u32 = 1024;
/// Allocations at or above this port are flagged as close to exhaustion.
pub const NEAR_LIMIT_PORT: u16 = 65500;

/// A port chosen by [`allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAllocation {
    pub port: u16,
    pub near_limit: bool,
}

/// Return the smallest port `>= base` recorded in neither collection.
///
/// # Errors
///
/// [`PortAllocationError::InvalidBase`] when `base` is outside 1024-65535,
/// [`PortAllocationError::Exhausted`] when no port up to 65535 is free.
pub fn allocate(
    local: &StateCollection,
    remote: &StateCollection,
    base: u32,
) -> Result<PortAllocation, PortAllocationError> {
    let base = u16::try_from(base)
        .ok()
        .filter(|b| u32::from(*b) >= MIN_BASE_PORT)
        .ok_or(PortAllocationError::InvalidBase(base))?;

    let used: std::collections::BTreeSet<u16> = local.ports().chain(remote.ports()).collect();

    (base..=u16::MAX)
        .find(|p| !used.contains(p))
        .map(|port| PortAllocation {
            port,
            near_limit: port >= NEAR_LIMIT_PORT,
        })
        .ok_or(PortAllocationError::Exhausted { base })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use chrono::Utc;
    use outpost_common::{InstanceKey, InstanceRecord};

    use super::*;

    fn record(port: u16) -> InstanceRecord {
        InstanceRecord {
            port,
            database: "db".into(),
            app_username: "db_app".into(),
            app_password: "x".repeat(32),
            admin_password: "y".repeat(32),
            volume: "vol".into(),
            container_id: "c".into(),
            created_at: Utc::now(),
            last_backup_at: None,
        }
    }

    fn collection(ports: &[u16]) -> StateCollection {
        ports
            .iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    InstanceKey::new("app", &format!("env{i}")).expect("key"),
                    record(*p),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_collections_return_base() {
        let a = allocate(&StateCollection::new(), &StateCollection::new(), 27018).expect("alloc");
        assert_eq!(a.port, 27018);
        assert!(!a.near_limit);
    }

    #[test]
    fn test_skips_ports_used_in_either_collection() {
        let local = collection(&[27018]);
        let remote = collection(&[27019, 27021]);
        let a = allocate(&local, &remote, 27018).expect("alloc");
        assert_eq!(a.port, 27020);
    }

    #[test]
    fn test_fills_gaps_with_smallest_free_port() {
        let local = collection(&[27018, 27020]);
        let a = allocate(&local, &StateCollection::new(), 27018).expect("alloc");
        assert_eq!(a.port, 27019);
    }

    #[test]
    fn test_ports_below_base_are_ignored() {
        let local = collection(&[5000, 27017]);
        let a = allocate(&local, &StateCollection::new(), 27018).expect("alloc");
        assert_eq!(a.port, 27018);
    }

    #[test]
    fn test_rejects_base_outside_range() {
        let empty = StateCollection::new();
        assert_eq!(
            allocate(&empty, &empty, 1023),
            Err(PortAllocationError::InvalidBase(1023))
        );
        assert_eq!(
            allocate(&empty, &empty, 70000),
            Err(PortAllocationError::InvalidBase(70000))
        );
    }

    #[test]
    fn test_exhaustion_at_top_of_range() {
        let local = collection(&[65534, 65535]);
        assert_eq!(
            allocate(&local, &StateCollection::new(), 65534),
            Err(PortAllocationError::Exhausted { base: 65534 })
        );
    }

    #[test]
    fn test_near_limit_flag() {
        let a = allocate(&StateCollection::new(), &StateCollection::new(), 65500).expect("alloc");
        assert!(a.near_limit);
        assert_eq!(a.port, 65500);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn prop_allocated_port_is_minimal_and_unused(
                base in 1024u32..60000,
                local_offsets in proptest::collection::vec(0u16..64, 0..16),
                remote_offsets in proptest::collection::vec(0u16..64, 0..16),
            ) {
                let b = u16::try_from(base).expect("fits");
                let local = collection(&local_offsets.iter().map(|o| b + o).collect::<Vec<_>>());
                let remote = collection(&remote_offsets.iter().map(|o| b + o).collect::<Vec<_>>());
                let a = allocate(&local, &remote, base).expect("alloc");
                let used: Vec<u16> = local.ports().chain(remote.ports()).collect();
                prop_assert!(a.port >= b);
                prop_assert!(!used.contains(&a.port));
                prop_assert!((b..a.port).all(|p| used.contains(&p)));
            }
        }
    }
}
