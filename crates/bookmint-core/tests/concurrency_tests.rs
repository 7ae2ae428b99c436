use bookmint_core::{IssuanceEngine, MintError, PayoutJournal};
use bookmint_library::{LibraryConfig, LibraryError, LibraryFactory, LibraryRegistry};
use bookmint_primitives::{EventLog, Identity, LibraryHandle, TokenId};
use bookmint_test_utils::{
    admin, deploy, deploy_with, identities, identity, public_config, public_deployment, whitelist,
    whitelist_config,
};
use mockall::mock;
use mockall::predicate::eq;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

mock! {
    pub Factory {}

    impl LibraryFactory for Factory {
        fn create_library(
            &self,
            caller: Identity,
            owner: Identity,
            config: &LibraryConfig,
        ) -> Result<LibraryHandle, LibraryError>;
        fn count(&self) -> usize;
        fn by_index(&self, index: usize) -> Result<LibraryHandle, LibraryError>;
        fn all(&self) -> Vec<LibraryHandle>;
    }
}

fn engine_with(factory: Arc<dyn LibraryFactory>, max_supply: u64) -> IssuanceEngine {
    IssuanceEngine::new(
        public_config(max_supply, 1),
        factory,
        Arc::new(PayoutJournal::new()),
        Arc::new(EventLog::new()),
    )
    .unwrap()
}

#[test]
fn test_parallel_mints_never_exceed_cap() {
    let d = public_deployment(50, 1);
    let callers = identities(8);

    std::thread::scope(|scope| {
        for caller in &callers {
            let engine = &d.engine;
            scope.spawn(move || {
                for _ in 0..20 {
                    let _ = engine.mint(*caller, &[], 1);
                }
            });
        }
    });

    assert_eq!(d.engine.total_issued().unwrap(), 50);
    assert_eq!(d.engine.library_count().unwrap(), 50);
    let held: u64 = callers
        .iter()
        .map(|c| d.engine.balance_of(c).unwrap())
        .sum();
    assert_eq!(held, 50);

    let libraries: HashSet<_> = (0..50)
        .map(|id| d.engine.library_for(TokenId(id)).unwrap())
        .collect();
    assert_eq!(libraries.len(), 50);
    assert!(d.events.verify_integrity().is_ok());
}

#[test]
fn test_admin_and_mints_interleave_safely() {
    let d = public_deployment(1_000, 1);

    std::thread::scope(|scope| {
        let engine = &d.engine;
        scope.spawn(move || {
            for _ in 0..50 {
                let _ = engine.pause(admin());
                let _ = engine.unpause(admin());
            }
        });
        for caller in identities(4) {
            scope.spawn(move || {
                for _ in 0..50 {
                    match engine.mint(caller, &[], 1) {
                        Ok(_) | Err(MintError::Paused) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            });
        }
    });

    assert!(d.engine.orphaned_tokens().unwrap().is_empty());
    assert_eq!(
        d.engine.total_issued().unwrap(),
        d.engine.library_count().unwrap() as u64
    );
}

/// Factory that calls back into the engine while a mint is in flight
struct CallbackFactory {
    inner: Arc<LibraryRegistry>,
    engine: OnceLock<Arc<IssuanceEngine>>,
    observed: Mutex<Vec<String>>,
}

impl LibraryFactory for CallbackFactory {
    fn create_library(
        &self,
        caller: Identity,
        owner: Identity,
        config: &LibraryConfig,
    ) -> Result<LibraryHandle, LibraryError> {
        if let Some(engine) = self.engine.get() {
            let nested_mint = engine.mint(owner, &[], 1);
            let nested_read = engine.total_issued();
            let mut observed = self.observed.lock();
            observed.push(nested_mint.map(|_| "ok".to_string()).unwrap_or_else(|e| e.code().into()));
            observed.push(nested_read.map(|_| "ok".to_string()).unwrap_or_else(|e| e.code().into()));
        }
        self.inner.create_library(caller, owner, config)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn by_index(&self, index: usize) -> Result<LibraryHandle, LibraryError> {
        self.inner.by_index(index)
    }

    fn all(&self) -> Vec<LibraryHandle> {
        self.inner.all()
    }
}

#[test]
fn test_reentrant_calls_are_rejected() {
    let config = public_config(10, 1);
    let events = Arc::new(EventLog::new());
    let registry = Arc::new(LibraryRegistry::new(config.administrator, events.clone()));
    registry
        .authorize_creator(config.administrator, config.minter)
        .unwrap();
    let factory = Arc::new(CallbackFactory {
        inner: registry,
        engine: OnceLock::new(),
        observed: Mutex::new(Vec::new()),
    });
    let engine = Arc::new(
        IssuanceEngine::new(config, factory.clone(), Arc::new(PayoutJournal::new()), events)
            .unwrap(),
    );
    let _ = factory.engine.set(engine.clone());

    let receipt = engine.mint(identity(0), &[], 1).unwrap();

    assert_eq!(receipt.token_id, TokenId(0));
    assert_eq!(
        *factory.observed.lock(),
        vec!["reentrant_call".to_string(), "reentrant_call".to_string()]
    );
    assert_eq!(engine.total_issued().unwrap(), 1);
}

#[test]
fn test_engine_presents_minter_identity_to_factory() {
    let config = public_config(3, 1);
    let minter = config.minter;
    let holder = identity(1);
    let handle = LibraryHandle::new([7u8; 32]);

    let mut factory = MockFactory::new();
    factory
        .expect_create_library()
        .withf(move |caller, owner, config| {
            *caller == minter && *owner == holder && config.capacity > 0
        })
        .times(1)
        .returning(move |_, _, _| Ok(handle));
    factory.expect_count().return_const(1usize);
    factory
        .expect_by_index()
        .with(eq(0))
        .returning(move |_| Ok(handle));

    let engine = engine_with(Arc::new(factory), 3);
    let receipt = engine.mint(holder, &[], 1).unwrap();

    assert_eq!(receipt.library, handle);
    assert_eq!(engine.library_count().unwrap(), 1);
    assert_eq!(engine.library_by_index(0).unwrap(), handle);
}

#[test]
fn test_factory_error_surfaces_and_unwinds() {
    let mut factory = MockFactory::new();
    factory
        .expect_create_library()
        .times(2)
        .returning(|_, _, _| Err(LibraryError::CreationFailed("out of space".into())));

    let engine = engine_with(Arc::new(factory), 3);

    for _ in 0..2 {
        let err = engine.mint(identity(0), &[], 1).unwrap_err();
        assert!(matches!(err, MintError::Library(LibraryError::CreationFailed(_))));
        assert_eq!(engine.total_issued().unwrap(), 0);
    }
    assert_eq!(engine.balance().unwrap(), 0);
    assert_eq!(engine.balance_of(&identity(0)).unwrap(), 0);
}

#[test]
fn test_reused_handle_is_rejected_and_unwound() {
    let handle = LibraryHandle::new([1u8; 32]);
    let mut factory = MockFactory::new();
    factory
        .expect_create_library()
        .times(2)
        .returning(move |_, _, _| Ok(handle));

    let engine = engine_with(Arc::new(factory), 3);
    let first = engine.mint(identity(0), &[], 1).unwrap();
    let err = engine.mint(identity(1), &[], 1).unwrap_err();

    assert_eq!(first.library, handle);
    assert!(matches!(
        err,
        MintError::LibraryAlreadyBound { library, token_id: TokenId(0) } if library == handle
    ));
    assert_eq!(err.code(), "library_already_bound");
    assert_eq!(engine.total_issued().unwrap(), 1);
    assert_eq!(engine.balance_of(&identity(1)).unwrap(), 0);
    assert_eq!(engine.balance().unwrap(), 1);
    assert!(engine.orphaned_tokens().unwrap().is_empty());
    assert!(matches!(
        engine.library_for(TokenId(1)),
        Err(MintError::UnknownToken(TokenId(1)))
    ));
}

/// Factory that panics on its first call and delegates afterwards
struct PanickingFactory {
    inner: Arc<LibraryRegistry>,
    armed: AtomicBool,
}

impl LibraryFactory for PanickingFactory {
    fn create_library(
        &self,
        caller: Identity,
        owner: Identity,
        config: &LibraryConfig,
    ) -> Result<LibraryHandle, LibraryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            panic!("storage backend went away");
        }
        self.inner.create_library(caller, owner, config)
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn by_index(&self, index: usize) -> Result<LibraryHandle, LibraryError> {
        self.inner.by_index(index)
    }

    fn all(&self) -> Vec<LibraryHandle> {
        self.inner.all()
    }
}

#[test]
fn test_factory_panic_rolls_back_mint() {
    let (d, factory) = deploy_with(public_config(5, 2), |registry| PanickingFactory {
        inner: registry,
        armed: AtomicBool::new(true),
    });

    let err = d.engine.mint(identity(0), &[], 2).unwrap_err();

    assert!(matches!(
        &err,
        MintError::Library(LibraryError::CreationFailed(reason)) if reason.contains("storage backend went away")
    ));
    assert!(!factory.armed.load(Ordering::SeqCst));
    assert_eq!(d.engine.total_issued().unwrap(), 0);
    assert_eq!(d.engine.balance_of(&identity(0)).unwrap(), 0);
    assert_eq!(d.engine.balance().unwrap(), 0);
    assert!(d.engine.orphaned_tokens().unwrap().is_empty());

    let receipt = d.engine.mint(identity(0), &[], 2).unwrap();
    assert_eq!(receipt.token_id, TokenId(0));
    assert_eq!(d.engine.library_for(TokenId(0)).unwrap(), receipt.library);
}

#[test]
fn test_parallel_whitelist_claims_succeed_once() {
    let members = identities(4);
    let tree = whitelist(&members);
    let d = deploy(whitelist_config(100, 1, &tree));
    let member = members[1];
    let proof = tree.proof_for(&member).unwrap();
    let successes = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let (engine, proof, successes) = (&d.engine, &proof, &successes);
            scope.spawn(move || {
                for _ in 0..5 {
                    match engine.mint(member, proof, 1) {
                        Ok(_) => {
                            successes.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(MintError::AlreadyClaimed(who)) => assert_eq!(who, member),
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(d.engine.claimants().unwrap(), vec![member]);
    assert_eq!(d.engine.total_issued().unwrap(), 1);
    assert_eq!(d.engine.balance_of(&member).unwrap(), 1);
}
