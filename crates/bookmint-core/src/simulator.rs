//! Seeded workload simulator
//!
//! Drives an in-memory deployment with a random mix of mints and
//! administrative actions, predicts the outcome of every step from a small
//! shadow model and records a [`Violation`] whenever the engine disagrees.
//! After each step it also checks the supply cap, that no token is left
//! without a library, and that the claim record matches the model. The event
//! log's hash chain is verified at the end.
//!
//! Library creation goes through a [`FlakyFactory`] so that a configurable
//! share of otherwise valid mints fail inside the transaction and must roll
//! back.

use crate::config::{EngineConfig, OverpaymentPolicy};
use crate::deployment::Deployment;
use crate::engine::IssuanceEngine;
use crate::error::MintError;
use crate::phase::PriceTable;
use bookmint_library::{LibraryConfig, LibraryError, LibraryFactory, LibraryRegistry};
use bookmint_primitives::{
    merkle, Amount, EventLog, Hash32, Identity, LibraryHandle, MembershipTree, Phase, TokenId,
};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Factory wrapper that fails the next creation when armed
#[derive(Debug)]
pub struct FlakyFactory {
    inner: Arc<LibraryRegistry>,
    armed: AtomicBool,
    injected: AtomicU64,
}

impl FlakyFactory {
    #[must_use]
    pub fn new(inner: Arc<LibraryRegistry>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(false),
            injected: AtomicU64::new(0),
        }
    }

    /// Make the next `create_library` fail
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }

    /// Failures actually delivered
    #[must_use]
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }
}

impl LibraryFactory for FlakyFactory {
    fn create_library(
        &self,
        caller: Identity,
        owner: Identity,
        config: &LibraryConfig,
    ) -> Result<LibraryHandle, LibraryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(LibraryError::CreationFailed("injected failure".into()));
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

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of steps to run
    pub requests: u64,
    /// Engine under test; the simulator installs its own whitelist root
    pub engine: EngineConfig,
    /// Distinct callers
    pub population: usize,
    /// Share of the population placed on each whitelist
    pub whitelist_share: f64,
    /// Chance that a mint reaching the factory is forced to fail
    pub failure_rate: f64,
    pub stop_on_first_violation: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            requests: 1000,
            engine: EngineConfig::default()
                .with_phase(Phase::Public)
                .with_prices(PriceTable::new(3, 2, 5)),
            population: 32,
            whitelist_share: 0.5,
            failure_rate: 0.1,
            stop_on_first_violation: false,
        }
    }
}

impl SimulatorConfig {
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_requests(mut self, requests: u64) -> Self {
        self.requests = requests;
        self
    }

    #[must_use]
    pub fn with_max_supply(mut self, max_supply: u64) -> Self {
        self.engine.max_supply = max_supply;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Which proof a simulated caller presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    /// Built from the current tree (empty for non-members)
    Current,
    /// Built from the tree before the last rotation
    Stale,
    /// Random siblings
    Garbage,
}

/// One simulated step
#[derive(Debug, Clone)]
pub enum SimulatedOperation {
    Mint {
        caller: Identity,
        proof: ProofKind,
        value: Amount,
        fail_factory: bool,
    },
    SetPhase(Phase),
    SetPrices(PriceTable),
    RotateRoot(Vec<Identity>),
    TogglePause,
    Withdraw,
}

/// A disagreement between engine and model, or a broken invariant
#[derive(Debug, Clone)]
pub enum Violation {
    UnexpectedOutcome {
        step: u64,
        operation: SimulatedOperation,
        expected: &'static str,
        actual: &'static str,
    },
    SupplyExceeded { issued: u64, max_supply: u64 },
    OrphanedToken(TokenId),
    MissingLibrary(TokenId),
    ClaimMismatch { expected: usize, actual: usize },
    BalanceMismatch { expected: Amount, actual: Amount },
    LogIntegrity(String),
    EngineUnavailable(String),
}

/// Counters for a run
#[derive(Debug, Clone, Default)]
pub struct SimulatorStats {
    pub mints_attempted: u64,
    pub mints_succeeded: u64,
    pub mints_rejected: u64,
    pub rollbacks: u64,
    pub admin_operations: u64,
    pub withdrawn: Amount,
}

/// Final report from a run
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    pub config: SimulatorConfig,
    pub stats: SimulatorStats,
    pub violations: Vec<Violation>,
    pub total_issued: u64,
    pub events: usize,
}

impl SimulatorReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Plain-text summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let _ = writeln!(report, "=== bookmint simulator ===\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Requests: {}", self.config.requests);
        let _ = writeln!(report, "Max supply: {}", self.config.engine.max_supply);
        let _ = writeln!(report, "Mints attempted: {}", self.stats.mints_attempted);
        let _ = writeln!(report, "Mints succeeded: {}", self.stats.mints_succeeded);
        let _ = writeln!(report, "Mints rejected: {}", self.stats.mints_rejected);
        let _ = writeln!(report, "Rolled back: {}", self.stats.rollbacks);
        let _ = writeln!(report, "Admin operations: {}", self.stats.admin_operations);
        let _ = writeln!(report, "Withdrawn: {}", self.stats.withdrawn);
        let _ = writeln!(report, "Total issued: {}", self.total_issued);
        let _ = writeln!(report, "Events: {}", self.events);
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            let _ = writeln!(report, "\n=== Violations ===");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {v:?}", i + 1);
            }
        }

        let _ = writeln!(
            report,
            "\n=== Result: {} ===",
            if self.passed() { "PASS" } else { "FAIL" }
        );
        report
    }
}

/// What the simulator believes the engine state is
struct Model {
    phase: Phase,
    prices: PriceTable,
    paused: bool,
    issued: u64,
    max_supply: u64,
    balance: Amount,
    overpayment: OverpaymentPolicy,
    claimed: HashSet<Identity>,
    tree: MembershipTree,
    previous: Option<MembershipTree>,
}

impl Model {
    fn expect_mint(
        &self,
        caller: &Identity,
        siblings: &[Hash32],
        value: Amount,
        fail: bool,
    ) -> &'static str {
        if self.paused {
            return "paused";
        }
        if self.issued >= self.max_supply {
            return "supply_exhausted";
        }
        let Some(price) = self.prices.price_for(self.phase) else {
            return "minting_locked";
        };
        if value < price {
            return "insufficient_payment";
        }
        if self.phase == Phase::Whitelist {
            if self.claimed.contains(caller) {
                return "already_claimed";
            }
            if !merkle::verify_member(siblings, self.tree.root(), caller) {
                return "invalid_proof";
            }
        }
        if fail {
            return "library_failed";
        }
        "ok"
    }

    fn proof(&self, rng: &mut StdRng, caller: &Identity, kind: ProofKind) -> Vec<Hash32> {
        match kind {
            ProofKind::Current => self.tree.proof_for(caller).unwrap_or_default(),
            ProofKind::Stale => self
                .previous
                .as_ref()
                .and_then(|tree| tree.proof_for(caller))
                .unwrap_or_default(),
            ProofKind::Garbage => (0..rng.gen_range(1..6))
                .map(|_| Hash32::new(rng.gen()))
                .collect(),
        }
    }
}

/// Run the simulator
#[must_use]
pub fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut stats = SimulatorStats::default();
    let mut violations = Vec::new();

    let events = Arc::new(EventLog::new());
    let registry = Arc::new(LibraryRegistry::new(config.engine.administrator, events.clone()));
    let factory = Arc::new(FlakyFactory::new(registry.clone()));
    let deployment =
        match Deployment::with_factory(config.engine.clone(), registry, factory.clone(), events) {
            Ok(deployment) => deployment,
            Err(e) => {
                violations.push(Violation::EngineUnavailable(e.to_string()));
                return SimulatorReport {
                    config,
                    stats,
                    violations,
                    total_issued: 0,
                    events: 0,
                };
            }
        };
    let engine = &deployment.engine;
    let admin = config.engine.administrator;

    let population: Vec<Identity> = (0..config.population.max(1))
        .map(|i| Identity::derive(format!("bookmint/sim/{}/{i}", config.seed).as_bytes()))
        .collect();
    let share = config.whitelist_share.clamp(0.0, 1.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let whitelist_len = ((population.len() as f64 * share).round() as usize).max(1);

    let tree = MembershipTree::from_members(
        population.choose_multiple(&mut rng, whitelist_len).copied(),
    );
    if let Err(e) = engine.set_merkle_root(admin, tree.root()) {
        violations.push(Violation::EngineUnavailable(e.to_string()));
    }

    let mut model = Model {
        phase: config.engine.phase,
        prices: config.engine.prices,
        paused: false,
        issued: 0,
        max_supply: config.engine.max_supply,
        balance: 0,
        overpayment: config.engine.overpayment,
        claimed: HashSet::new(),
        tree,
        previous: None,
    };

    tracing::info!(seed = config.seed, requests = config.requests, "simulation started");

    for step in 0..config.requests {
        let operation = generate_operation(&mut rng, &config, &population, whitelist_len);
        let (expected, actual) =
            execute_operation(engine, &factory, &mut model, &mut rng, &operation, admin, &mut stats);

        if expected != actual {
            violations.push(Violation::UnexpectedOutcome {
                step,
                operation,
                expected,
                actual,
            });
        }
        check_invariants(engine, &model, &mut violations);

        if config.stop_on_first_violation && !violations.is_empty() {
            break;
        }
    }

    let total_issued = engine.total_issued().unwrap_or_default();
    for id in 0..total_issued {
        if engine.library_for(TokenId(id)).is_err() {
            violations.push(Violation::MissingLibrary(TokenId(id)));
        }
    }
    if let Err(e) = deployment.events.verify_integrity() {
        violations.push(Violation::LogIntegrity(e.to_string()));
    }

    tracing::info!(
        total_issued,
        violations = violations.len(),
        "simulation finished"
    );

    SimulatorReport {
        config,
        stats,
        violations,
        total_issued,
        events: deployment.events.len(),
    }
}

fn generate_operation(
    rng: &mut StdRng,
    config: &SimulatorConfig,
    population: &[Identity],
    whitelist_len: usize,
) -> SimulatedOperation {
    match rng.gen_range(0..100) {
        0..=74 => {
            let caller = population[rng.gen_range(0..population.len())];
            let proof = match rng.gen_range(0..10) {
                0 => ProofKind::Garbage,
                1 => ProofKind::Stale,
                _ => ProofKind::Current,
            };
            let value = rng.gen_range(0..8);
            let fail_factory = rng.gen_bool(config.failure_rate.clamp(0.0, 1.0));
            SimulatedOperation::Mint {
                caller,
                proof,
                value,
                fail_factory,
            }
        }
        75..=84 => SimulatedOperation::SetPhase(Phase::ALL[rng.gen_range(0..Phase::ALL.len())]),
        85..=88 => SimulatedOperation::SetPrices(PriceTable::new(
            rng.gen_range(0..6),
            rng.gen_range(0..6),
            rng.gen_range(0..6),
        )),
        89..=92 => {
            let size = rng.gen_range(1..=whitelist_len);
            SimulatedOperation::RotateRoot(population.choose_multiple(rng, size).copied().collect())
        }
        93..=96 => SimulatedOperation::TogglePause,
        _ => SimulatedOperation::Withdraw,
    }
}

fn outcome<T>(result: &Result<T, MintError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) => e.code(),
    }
}

fn execute_operation(
    engine: &IssuanceEngine,
    factory: &FlakyFactory,
    model: &mut Model,
    rng: &mut StdRng,
    operation: &SimulatedOperation,
    admin: Identity,
    stats: &mut SimulatorStats,
) -> (&'static str, &'static str) {
    match operation {
        SimulatedOperation::Mint {
            caller,
            proof,
            value,
            fail_factory,
        } => {
            stats.mints_attempted += 1;
            let siblings = model.proof(rng, caller, *proof);
            let expected = model.expect_mint(caller, &siblings, *value, *fail_factory);
            if *fail_factory {
                factory.arm();
            }
            let result = engine.mint(*caller, &siblings, *value);
            factory.disarm();

            match &result {
                Ok(receipt) => {
                    stats.mints_succeeded += 1;
                    model.issued += 1;
                    model.balance += receipt.paid;
                    if model.phase == Phase::Whitelist {
                        model.claimed.insert(*caller);
                    }
                    if model.overpayment == OverpaymentPolicy::Retain && receipt.refunded != 0 {
                        return (expected, "unexpected_refund");
                    }
                }
                Err(MintError::Library(_)) => {
                    stats.mints_rejected += 1;
                    stats.rollbacks += 1;
                }
                Err(_) => stats.mints_rejected += 1,
            }
            (expected, outcome(&result))
        }
        SimulatedOperation::SetPhase(phase) => {
            stats.admin_operations += 1;
            let result = engine.set_phase(admin, *phase);
            if result.is_ok() {
                model.phase = *phase;
            }
            ("ok", outcome(&result))
        }
        SimulatedOperation::SetPrices(prices) => {
            stats.admin_operations += 1;
            let result = engine.set_prices(admin, *prices);
            if result.is_ok() {
                model.prices = *prices;
            }
            ("ok", outcome(&result))
        }
        SimulatedOperation::RotateRoot(members) => {
            stats.admin_operations += 1;
            let next = MembershipTree::from_members(members.iter().copied());
            let result = engine.set_merkle_root(admin, next.root());
            if result.is_ok() {
                model.previous = Some(std::mem::replace(&mut model.tree, next));
            }
            ("ok", outcome(&result))
        }
        SimulatedOperation::TogglePause => {
            stats.admin_operations += 1;
            let result = if model.paused {
                engine.unpause(admin)
            } else {
                engine.pause(admin)
            };
            if result.is_ok() {
                model.paused = !model.paused;
            }
            ("ok", outcome(&result))
        }
        SimulatedOperation::Withdraw => {
            stats.admin_operations += 1;
            let expected = if model.balance == 0 {
                "nothing_to_withdraw"
            } else {
                "ok"
            };
            let result = engine.withdraw(admin);
            if let Ok(amount) = &result {
                stats.withdrawn += amount;
                model.balance = 0;
            }
            (expected, outcome(&result))
        }
    }
}

type Snapshot = (u64, u64, Vec<TokenId>, Vec<Identity>, Amount);

fn snapshot(engine: &IssuanceEngine) -> Result<Snapshot, MintError> {
    Ok((
        engine.total_issued()?,
        engine.max_supply()?,
        engine.orphaned_tokens()?,
        engine.claimants()?,
        engine.balance()?,
    ))
}

fn check_invariants(engine: &IssuanceEngine, model: &Model, violations: &mut Vec<Violation>) {
    let (issued, max_supply, orphans, claimants, balance) = match snapshot(engine) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            violations.push(Violation::EngineUnavailable(e.to_string()));
            return;
        }
    };

    if issued > max_supply {
        violations.push(Violation::SupplyExceeded { issued, max_supply });
    }
    violations.extend(orphans.into_iter().map(Violation::OrphanedToken));

    let unique: HashSet<_> = claimants.iter().collect();
    if unique.len() != claimants.len() || claimants.len() != model.claimed.len() {
        violations.push(Violation::ClaimMismatch {
            expected: model.claimed.len(),
            actual: claimants.len(),
        });
    }
    if balance != model.balance {
        violations.push(Violation::BalanceMismatch {
            expected: model.balance,
            actual: balance,
        });
    }
}
