use qe_policy::SymbolPolicy;
use qe_schemas::{IndicatorSnapshot, Position, Signal};

/// Strategy identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategySpec {
    pub name: String,
}

impl StrategySpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Everything a strategy is allowed to see for one symbol in one cycle.
///
/// `recent` is a bounded, time-ordered window ending at `snapshot` itself
/// (i.e. `recent.last() == Some(&snapshot)`) — strategies that need N-bar
/// confirmation (MACD cross holding, VWAP bounce holding) read it instead of
/// keeping their own history, since `on_bar` takes `&self`.
#[derive(Clone, Debug)]
pub struct StrategyContext {
    pub snapshot: IndicatorSnapshot,
    pub policy: SymbolPolicy,
    pub open_position: Option<Position>,
    pub recent: Vec<IndicatorSnapshot>,
}

impl StrategyContext {
    pub fn new(
        snapshot: IndicatorSnapshot,
        policy: SymbolPolicy,
        open_position: Option<Position>,
        recent: Vec<IndicatorSnapshot>,
    ) -> Self {
        Self {
            snapshot,
            policy,
            open_position,
            recent,
        }
    }

    /// The last `n` snapshots including the current one, oldest first.
    /// Shorter than `n` if the window hasn't filled yet.
    pub fn confirmation_window(&self, n: usize) -> &[IndicatorSnapshot] {
        let len = self.recent.len();
        &self.recent[len.saturating_sub(n)..]
    }
}

/// Strategies propose; they never touch account, position, or broker state.
pub trait Strategy: Send + Sync {
    fn spec(&self) -> StrategySpec;

    /// Minimum strategy-level confidence (0-100) a candidate must clear
    /// before `propose` will emit it. The engine-level gate in `qe-confidence`
    /// is authoritative; this is a cheap pre-filter.
    fn min_confidence(&self) -> f64 {
        65.0
    }

    fn propose(&self, ctx: &StrategyContext) -> Option<Signal>;
}

/// Host-level policy errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyHostError {
    NoStrategiesRegistered,
}

impl std::fmt::Display for StrategyHostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoStrategiesRegistered => write!(f, "no strategies registered on host"),
        }
    }
}

impl std::error::Error for StrategyHostError {}

/// Shadow mode gates whether a strategy's candidates are eligible for
/// execution or are logged only, for staged rollout of a new strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShadowMode {
    Off,
    On,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntentMode {
    Live,
    Shadow,
}

/// One strategy's output for one symbol in one cycle.
#[derive(Clone, Debug)]
pub struct StrategyIntent {
    pub spec: StrategySpec,
    pub mode: IntentMode,
    pub signal: Signal,
}

impl StrategyIntent {
    pub fn should_execute(&self) -> bool {
        self.mode == IntentMode::Live
    }
}
