use bookmint_library::{LibraryConfig, LibraryError, LibraryFactory, LibraryRegistry};
use bookmint_primitives::{EventLog, Identity};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn admin() -> Identity {
    Identity::derive(b"registry/admin")
}

fn owner(n: usize) -> Identity {
    Identity::derive(format!("registry/owner/{n}").as_bytes())
}

#[test]
fn test_capacity_bounds_entries() {
    let registry = LibraryRegistry::new(admin(), Arc::new(EventLog::new()));
    let config = LibraryConfig::default().with_capacity(2).with_max_entry_len(8);
    let handle = registry.create_library(admin(), owner(0), &config).unwrap();

    registry.add_entry(handle, owner(0), "one").unwrap();
    assert!(matches!(
        registry.add_entry(handle, owner(0), "too long for this"),
        Err(LibraryError::EntryTooLarge { len: 17, max: 8 })
    ));
    registry.add_entry(handle, owner(0), "two").unwrap();
    assert_eq!(
        registry.add_entry(handle, owner(0), "three"),
        Err(LibraryError::CapacityReached { capacity: 2 })
    );
    assert_eq!(registry.library(handle).unwrap().len(), 2);
}

#[test]
fn test_only_owner_manages_collaborators() {
    let registry = LibraryRegistry::new(admin(), Arc::new(EventLog::new()));
    let handle = registry
        .create_library(admin(), owner(0), &LibraryConfig::default())
        .unwrap();

    let err = registry
        .add_collaborator(handle, owner(1), owner(2))
        .unwrap_err();
    assert!(err.is_authorization());

    registry.add_collaborator(handle, owner(0), owner(1)).unwrap();
    assert_eq!(
        registry.add_collaborator(handle, owner(0), owner(1)),
        Err(LibraryError::AlreadyCollaborator(owner(1)))
    );
    assert_eq!(
        registry.remove_collaborator(handle, owner(0), owner(2)),
        Err(LibraryError::NotCollaborator(owner(2)))
    );
}

#[test]
fn test_concurrent_creation_keeps_registry_consistent() {
    let events = Arc::new(EventLog::new());
    let registry = LibraryRegistry::new(admin(), events.clone());

    std::thread::scope(|scope| {
        for t in 0..4 {
            let registry = &registry;
            scope.spawn(move || {
                for i in 0..25 {
                    registry
                        .create_library(admin(), owner(t * 100 + i), &LibraryConfig::default())
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(registry.count(), 100);
    let unique: HashSet<_> = registry.all().into_iter().collect();
    assert_eq!(unique.len(), 100);
    assert_eq!(events.len(), 100);
    assert!(events.verify_integrity().is_ok());
}

proptest! {
    #[test]
    fn prop_enumeration_matches_creation_order(count in 0usize..20) {
        let registry = LibraryRegistry::new(admin(), Arc::new(EventLog::new()));
        let created: Vec<_> = (0..count)
            .map(|i| registry.create_library(admin(), owner(i), &LibraryConfig::default()).unwrap())
            .collect();

        prop_assert_eq!(registry.count(), count);
        prop_assert_eq!(registry.all(), created.clone());
        for (i, handle) in created.iter().enumerate() {
            prop_assert_eq!(registry.by_index(i).unwrap(), *handle);
        }
        let is_out_of_range = matches!(
            registry.by_index(count),
            Err(LibraryError::IndexOutOfRange { .. })
        );
        prop_assert!(is_out_of_range);
    }
}
