use std::env;

/// Default minimum similarity for attaching an article to an event outright
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.85;

/// Default minimum similarity for suggesting a merge pending human review
pub const DEFAULT_PENDING_THRESHOLD: f64 = 0.60;

/// Default number of hours an event stays open for new matches
pub const DEFAULT_ACTIVE_WINDOW_HOURS: i64 = 48;

/// Default points contributed by one source before weighting
pub const DEFAULT_BASE_POINTS: f64 = 10.0;

/// Default multiplier applied to the heat score per decay period
pub const DEFAULT_DECAY_RATE: f64 = 0.9;

/// Default length of one decay period in hours
pub const DEFAULT_DECAY_PERIOD_HOURS: f64 = 24.0;

/// Tunable parameters for the clustering and scoring engines.
///
/// Passed explicitly into `process_article` and the scoring functions so
/// tests can run with alternate thresholds without touching process state.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub match_threshold: f64,
    pub pending_threshold: f64,
    pub active_window_hours: i64,
    pub base_points: f64,
    pub decay_rate: f64,
    pub decay_period_hours: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            pending_threshold: DEFAULT_PENDING_THRESHOLD,
            active_window_hours: DEFAULT_ACTIVE_WINDOW_HOURS,
            base_points: DEFAULT_BASE_POINTS,
            decay_rate: DEFAULT_DECAY_RATE,
            decay_period_hours: DEFAULT_DECAY_PERIOD_HOURS,
        }
    }
}

impl EngineConfig {
    /// Builds a configuration from `KAWARABAN_*` environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults; this never
    /// fails.
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            match_threshold: env_or("KAWARABAN_MATCH_THRESHOLD", defaults.match_threshold),
            pending_threshold: env_or("KAWARABAN_PENDING_THRESHOLD", defaults.pending_threshold),
            active_window_hours: env_or(
                "KAWARABAN_ACTIVE_WINDOW_HOURS",
                defaults.active_window_hours,
            ),
            base_points: env_or("KAWARABAN_BASE_POINTS", defaults.base_points),
            decay_rate: env_or("KAWARABAN_DECAY_RATE", defaults.decay_rate),
            decay_period_hours: env_or(
                "KAWARABAN_DECAY_PERIOD_HOURS",
                defaults.decay_period_hours,
            ),
        }
    }
}

/// Retrieves an environment variable and parses it, falling back to a
/// default when the variable is missing or malformed.
fn env_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
