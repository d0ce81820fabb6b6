use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::table::{PolicyReport, QTable};
use pricelearn_core::{
    round_price, Action, DecisionMode, FeedbackAck, PricingFeedback, PricingPolicy,
    PricingRequest, State, Suggestion,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Counters describing how the agent has been used since construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub total_suggestions: u64,
    pub explorations: u64,
    pub exploitations: u64,
    pub updates: u64,
    pub total_reward: f64,
    pub states_visited: usize,
    pub avg_q_value: f64,
}

#[derive(Debug, Default)]
struct Learned {
    table: QTable,
    total_reward: f64,
}

#[derive(Debug, Default)]
struct Counters {
    suggestions: AtomicU64,
    explorations: AtomicU64,
    exploitations: AtomicU64,
    updates: AtomicU64,
}

/// ε-greedy Q-learning agent over discretized retail states.
///
/// Construct one per process and share it (e.g. behind an `Arc`). Suggestions
/// only take the table's read lock for the greedy lookup. Learning holds the
/// persist lock from reading the old value until the table has been written to
/// disk, so concurrent updates never interleave and the file always reflects
/// them in order; the table's write lock is held only while the row is
/// updated and copied, never during file I/O.
///
/// Durability: every successful [`learn`](Self::learn) has been flushed when it
/// returns unless the write failed, in which case the update lives in memory
/// only until the next successful save or [`flush`](Self::flush).
#[derive(Debug)]
pub struct PricingAgent {
    config: AgentConfig,
    learned: RwLock<Learned>,
    persist_lock: Mutex<()>,
    counters: Counters,
}

impl PricingAgent {
    /// Validates `config` and loads the table from `config.model_path`.
    ///
    /// A missing or unreadable model file is not an error: a warning is logged
    /// and the agent starts with an empty table.
    pub fn new(config: AgentConfig) -> Result<Self> {
        config.validate()?;
        let table = match QTable::load(&config.model_path) {
            Ok(table) => {
                log_info!(
                    "loaded pricing model from {} ({} states)",
                    config.model_path.display(),
                    table.len()
                );
                table
            }
            Err(e) => {
                log_warn!("failed to load pricing model, starting cold: {}", e);
                QTable::new()
            }
        };
        Self::with_table(config, table)
    }

    /// Validates `config` and builds an agent around an existing table
    /// without touching disk.
    pub fn with_table(config: AgentConfig, table: QTable) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            learned: RwLock::new(Learned {
                table,
                total_reward: 0.0,
            }),
            persist_lock: Mutex::new(()),
            counters: Counters::default(),
        })
    }

    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Learned>> {
        self.learned
            .read()
            .map_err(|_| AgentError::Internal("policy table lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Learned>> {
        self.learned
            .write()
            .map_err(|_| AgentError::Internal("policy table lock poisoned"))
    }

    /// Suggests a price using the thread-local RNG.
    pub fn suggest_price(&self, request: &PricingRequest) -> Result<Suggestion> {
        self.suggest_price_with_rng(request, &mut rand::thread_rng())
    }

    /// Suggests a price, drawing exploration decisions from `rng`.
    ///
    /// Does not modify the table.
    pub fn suggest_price_with_rng<R: Rng + ?Sized>(
        &self,
        request: &PricingRequest,
        rng: &mut R,
    ) -> Result<Suggestion> {
        check_prices(request)?;
        let state = request.state();

        let explore = rng.gen::<f64>() < self.config.epsilon;
        let action = if explore {
            Action::ALL[rng.gen_range(0..Action::ALL.len())]
        } else {
            self.read()?.table.best_action(&state)
        };

        self.counters.suggestions.fetch_add(1, Ordering::Relaxed);
        let mode = if explore {
            self.counters.explorations.fetch_add(1, Ordering::Relaxed);
            DecisionMode::Explore
        } else {
            self.counters.exploitations.fetch_add(1, Ordering::Relaxed);
            DecisionMode::Exploit
        };
        log_debug!("{:?} {} in state {}", mode, action, state);

        Ok(Suggestion {
            suggested_price: round_price(request.base_price * action.multiplier()),
            multiplier: action.multiplier(),
            explanation: explain(action, &state),
            state,
            mode,
        })
    }

    /// Applies one TD update from observed feedback and persists the table.
    ///
    /// Fails without touching the table if the applied multiplier is not a
    /// known action or any input is not a finite number. Persistence failures
    /// are logged, not returned.
    pub fn learn(&self, feedback: &PricingFeedback) -> Result<FeedbackAck> {
        let action = Action::from_multiplier(feedback.applied_multiplier)
            .ok_or(AgentError::InvalidAction(feedback.applied_multiplier))?;
        check_prices(&feedback.request)?;
        let reward = feedback.realized_profit;
        if !reward.is_finite() {
            return Err(AgentError::InvalidInput("realized profit must be finite"));
        }

        let state = feedback.request.state();
        let next_state = feedback.request.successor_state();

        let _persisting = self.lock_persist()?;
        let mut learned = self.write()?;
        let current = learned.table.get(&state, action);
        let max_next = learned.table.max_value(&next_state);
        let updated =
            current + self.config.alpha * (reward + self.config.gamma * max_next - current);
        if !updated.is_finite() {
            return Err(AgentError::InvalidInput(
                "update would produce a non-finite value",
            ));
        }

        learned.table.ensure(state);
        learned.table.ensure(next_state);
        learned.table.set(state, action, updated);
        learned.total_reward += reward;
        self.counters.updates.fetch_add(1, Ordering::Relaxed);
        log_debug!(
            "Q{} {}: {} -> {} (reward {}, next {})",
            state,
            action,
            current,
            updated,
            reward,
            next_state
        );

        let table = learned.table.clone();
        drop(learned);

        self.persist(&table);
        Ok(FeedbackAck::learned(reward))
    }

    fn lock_persist(&self) -> Result<MutexGuard<'_, ()>> {
        self.persist_lock
            .lock()
            .map_err(|_| AgentError::Internal("persist lock poisoned"))
    }

    fn persist(&self, table: &QTable) {
        if let Err(e) = table.save(&self.config.model_path) {
            log_warn!("failed to save pricing model: {}", e);
        }
    }

    /// Writes the current table to disk; call at shutdown.
    pub fn flush(&self) -> Result<()> {
        let _persisting = self.lock_persist()?;
        let table = self.snapshot()?;
        table.save(&self.config.model_path)?;
        Ok(())
    }

    /// Current value estimate for `action` in `state`.
    pub fn q_value(&self, state: &State, action: Action) -> Result<f64> {
        Ok(self.read()?.table.get(state, action))
    }

    /// Copy of the current table.
    pub fn snapshot(&self) -> Result<QTable> {
        Ok(self.read()?.table.clone())
    }

    pub fn report(&self) -> Result<PolicyReport> {
        Ok(self.read()?.table.report())
    }

    pub fn stats(&self) -> Result<AgentStats> {
        let learned = self.read()?;
        let report = learned.table.report();
        Ok(AgentStats {
            total_suggestions: self.counters.suggestions.load(Ordering::Relaxed),
            explorations: self.counters.explorations.load(Ordering::Relaxed),
            exploitations: self.counters.exploitations.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            total_reward: learned.total_reward,
            states_visited: report.states_visited,
            avg_q_value: report.avg_q_value,
        })
    }
}

impl PricingPolicy for PricingAgent {
    type Error = AgentError;

    fn optimize(&self, request: &PricingRequest) -> Result<Suggestion> {
        self.suggest_price(request)
    }

    fn record_feedback(&self, feedback: &PricingFeedback) -> Result<FeedbackAck> {
        self.learn(feedback)
    }
}

fn check_prices(request: &PricingRequest) -> Result<()> {
    if !request.base_price.is_finite() {
        return Err(AgentError::InvalidInput("base price must be finite"));
    }
    if !request.competitor_price.is_finite() {
        return Err(AgentError::InvalidInput("competitor price must be finite"));
    }
    Ok(())
}

fn explain(action: Action, state: &State) -> String {
    format!(
        "Adjusted by {}% based on {} stock and {} expiry.",
        action.percent_change(),
        state.stock,
        state.expiry
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use pricelearn_core::{discretize, CompBin, ExpiryBin, StockBin};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::path::PathBuf;

    fn config(name: &str, epsilon: f64) -> AgentConfig {
        let dir = std::env::temp_dir().join(format!(
            "pricelearn_agent_{}_{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        AgentConfig {
            epsilon,
            model_path: dir.join("model.json"),
            ..Default::default()
        }
    }

    fn request(stock: i64, days: i64, competitor: f64) -> PricingRequest {
        PricingRequest {
            product_name: None,
            base_price: 100.0,
            current_stock: stock,
            days_to_expiry: days,
            competitor_price: competitor,
        }
    }

    fn feedback(stock: i64, multiplier: f64, profit: f64) -> PricingFeedback {
        PricingFeedback {
            request: request(stock, 3, 90.0),
            applied_multiplier: multiplier,
            realized_profit: profit,
        }
    }

    fn cleanup(cfg: &AgentConfig) {
        if let Some(dir) = cfg.model_path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn cold_start_exploit_suggests_first_action() {
        let cfg = config("cold_exploit", 0.0);
        let agent = PricingAgent::new(cfg.clone()).unwrap();
        let s = agent.suggest_price(&request(10, 3, 90.0)).unwrap();

        assert_eq!(
            s.state,
            State::new(StockBin::Low, ExpiryBin::Urgent, CompBin::Cheaper)
        );
        assert_eq!(s.multiplier, 0.8);
        assert_eq!(s.suggested_price, 80.0);
        assert_eq!(s.mode, DecisionMode::Exploit);
        assert_eq!(
            s.explanation,
            "Adjusted by -20% based on low stock and urgent expiry."
        );
        assert!(agent.snapshot().unwrap().is_empty());
        assert!(!cfg.model_path.exists());
    }

    #[test]
    fn full_exploration_draws_every_action() {
        let cfg = config("explore", 1.0);
        let agent = PricingAgent::with_table(cfg, QTable::new()).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            let s = agent
                .suggest_price_with_rng(&request(60, 40, 100.0), &mut rng)
                .unwrap();
            assert_eq!(s.mode, DecisionMode::Explore);
            let action = Action::from_multiplier(s.multiplier).unwrap();
            seen.insert(action);
        }
        assert_eq!(seen.len(), Action::ALL.len());
        let stats = agent.stats().unwrap();
        assert_eq!(stats.explorations, 200);
        assert_eq!(stats.exploitations, 0);
    }

    #[test]
    fn learn_applies_td_update_and_persists() {
        let cfg = config("td_update", 0.0);
        let agent = PricingAgent::new(cfg.clone()).unwrap();
        // stock 20 is `med`; the successor (19) is `low`.
        let fb = PricingFeedback {
            request: request(20, 3, 90.0),
            applied_multiplier: 1.1,
            realized_profit: 10.0,
        };
        let ack = agent.learn(&fb).unwrap();
        assert_eq!(ack, FeedbackAck::learned(10.0));

        let state = discretize(20, 3, 0.9);
        let next = discretize(19, 3, 0.9);
        assert_eq!(agent.q_value(&state, Action::Markup10).unwrap(), 1.0);

        let table = agent.snapshot().unwrap();
        assert!(table.contains(&state));
        assert!(table.contains(&next));

        let reloaded = QTable::load(&cfg.model_path).unwrap();
        assert_eq!(reloaded, table);

        let s = agent.suggest_price(&fb.request).unwrap();
        assert_eq!(s.multiplier, 1.1);
        assert_eq!(s.suggested_price, 110.0);
        cleanup(&cfg);
    }

    #[test]
    fn td_target_uses_successor_maximum() {
        let cfg = config("successor", 0.0);
        let mut table = QTable::new();
        let next = discretize(19, 3, 0.9);
        table.set(next, Action::Hold, 5.0);
        let agent = PricingAgent::with_table(cfg.clone(), table).unwrap();

        agent.learn(&feedback(20, 0.9, 1.0)).unwrap();
        // 0 + 0.1 * (1 + 0.9 * 5 - 0)
        let q = agent
            .q_value(&discretize(20, 3, 0.9), Action::Discount10)
            .unwrap();
        assert!((q - 0.55).abs() < 1e-12);
        cleanup(&cfg);
    }

    #[test]
    fn repeated_reward_converges_monotonically() {
        let cfg = AgentConfig {
            alpha: 0.5,
            ..config("converge", 0.0)
        };
        let agent = PricingAgent::with_table(cfg.clone(), QTable::new()).unwrap();
        // stock 10 and its successor 9 share a state, so the successor value
        // is the value being learned.
        let fb = feedback(10, 0.8, 1.0);
        let state = fb.request.state();
        let target = 1.0 / (1.0 - cfg.gamma);

        let mut previous = 0.0;
        for _ in 0..800 {
            agent.learn(&fb).unwrap();
            let q = agent.q_value(&state, Action::Discount20).unwrap();
            assert!(q >= previous - 1e-12);
            assert!(q <= target + 1e-9);
            previous = q;
        }
        assert!((previous - target).abs() < 1e-6);
        cleanup(&cfg);
    }

    #[test]
    fn invalid_multiplier_is_rejected_without_side_effects() {
        let cfg = config("invalid", 0.0);
        let agent = PricingAgent::new(cfg.clone()).unwrap();
        agent.learn(&feedback(10, 0.8, 3.0)).unwrap();
        let before = agent.snapshot().unwrap();

        let err = agent.learn(&feedback(10, 1.5, 3.0)).unwrap_err();
        assert!(matches!(err, AgentError::InvalidAction(m) if m == 1.5));
        assert_eq!(agent.snapshot().unwrap(), before);
        assert_eq!(agent.stats().unwrap().updates, 1);
        cleanup(&cfg);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let cfg = config("non_finite", 0.0);
        let agent = PricingAgent::with_table(cfg, QTable::new()).unwrap();
        assert!(matches!(
            agent.learn(&feedback(10, 0.8, f64::NAN)),
            Err(AgentError::InvalidInput(_))
        ));
        assert!(matches!(
            agent.suggest_price(&request(10, 3, f64::INFINITY)),
            Err(AgentError::InvalidInput(_))
        ));
        assert!(agent.snapshot().unwrap().is_empty());
    }

    #[test]
    fn zero_base_price_assumes_parity() {
        let agent = PricingAgent::with_table(config("zero_base", 0.0), QTable::new()).unwrap();
        let req = PricingRequest {
            base_price: 0.0,
            ..request(10, 3, 90.0)
        };
        let s = agent.suggest_price(&req).unwrap();
        assert_eq!(s.state.competition, CompBin::Equal);
        assert_eq!(s.suggested_price, 0.0);
    }

    #[test]
    fn corrupt_model_file_means_cold_start() {
        let cfg = config("corrupt", 0.0);
        std::fs::create_dir_all(cfg.model_path.parent().unwrap()).unwrap();
        std::fs::write(&cfg.model_path, "{not json").unwrap();

        let agent = PricingAgent::new(cfg.clone()).unwrap();
        assert!(agent.snapshot().unwrap().is_empty());
        cleanup(&cfg);
    }

    #[test]
    fn save_failure_keeps_learning_in_memory() {
        let blocker = std::env::temp_dir().join(format!(
            "pricelearn_agent_blocker_{}",
            std::process::id()
        ));
        std::fs::write(&blocker, "not a directory").unwrap();
        let cfg = AgentConfig {
            epsilon: 0.0,
            model_path: blocker.join("model.json"),
            ..Default::default()
        };

        let agent = PricingAgent::new(cfg).unwrap();
        agent.learn(&feedback(10, 1.2, 50.0)).unwrap();
        assert!(agent.q_value(&discretize(10, 3, 0.9), Action::Markup20).unwrap() > 0.0);
        assert!(matches!(agent.flush(), Err(AgentError::Persist(_))));
        let _ = std::fs::remove_file(&blocker);
    }

    #[test]
    fn reload_restores_learned_policy() {
        let cfg = config("reload", 0.0);
        {
            let agent = PricingAgent::new(cfg.clone()).unwrap();
            agent.learn(&feedback(10, 1.0, 20.0)).unwrap();
            agent.flush().unwrap();
        }
        let agent = PricingAgent::new(cfg.clone()).unwrap();
        let s = agent.suggest_price(&request(10, 3, 90.0)).unwrap();
        assert_eq!(s.multiplier, 1.0);
        assert_eq!(s.explanation, "Adjusted by 0% based on low stock and urgent expiry.");
        cleanup(&cfg);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = AgentConfig {
            epsilon: 2.0,
            model_path: PathBuf::from("unused.json"),
            ..Default::default()
        };
        assert!(matches!(
            PricingAgent::new(cfg),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[test]
    fn with_table_validates_config() {
        let cfg = AgentConfig {
            alpha: f64::NAN,
            ..config("nan_alpha", 0.0)
        };
        assert!(matches!(
            PricingAgent::with_table(cfg, QTable::new()),
            Err(AgentError::InvalidConfig(_))
        ));
    }
}
