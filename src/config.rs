use std::env;
use std::time::Duration;

use crate::profile::RatingMetric;

pub const DEFAULT_ENDPOINT: &str = "https://api-public.cs-prod.leetify.com/v3/profile?steam64_id={id}";
pub const DEFAULT_CLIENT_ID: &str = "lobby_scout/0.1 (+https://github.com/lobby-scout/lobby_scout)";
pub const ID_PLACEHOLDER: &str = "{id}";

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PARALLELISM: usize = 10;
const DEFAULT_WIN_RATE_WINDOW: usize = 30;

/// Binary logging setup: `RUST_LOG` when set, otherwise warnings and up so
/// per-candidate fetch failures show without extra configuration.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    if let Err(err) = env_logger::Builder::from_env(env).try_init() {
        log::warn!("logger already initialised: {err}");
    }
}

/// Run settings, read from the environment by [`ScoutConfig::from_env`].
///
/// `win_rate_window` is the number of most recent matches win rate is computed
/// over. It defaults to 30 and can be overridden with `LOBBY_WIN_RATE_WINDOW`
/// (1..=200); deployments that change it no longer match the provider's own
/// recent-form figures.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoutConfig {
    /// Profile endpoint; `{id}` is replaced with the decimal player id.
    pub endpoint_template: String,
    pub client_id: String,
    pub request_timeout: Duration,
    pub fetch_parallelism: usize,
    pub sort_metric: RatingMetric,
    pub win_rate_window: usize,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            endpoint_template: DEFAULT_ENDPOINT.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            fetch_parallelism: DEFAULT_PARALLELISM,
            sort_metric: RatingMetric::Leetify,
            win_rate_window: DEFAULT_WIN_RATE_WINDOW,
        }
    }
}

impl ScoutConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let endpoint_template = env::var("LOBBY_STATS_URL")
            .ok()
            .filter(|v| v.contains(ID_PLACEHOLDER))
            .unwrap_or(defaults.endpoint_template);
        let client_id = env::var("LOBBY_STATS_CLIENT_ID")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.client_id);
        let timeout_secs = env::var("LOBBY_STATS_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, 120);
        let fetch_parallelism = env::var("FETCH_PARALLELISM")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_PARALLELISM)
            .clamp(1, 32);
        let sort_metric = env::var("LOBBY_SORT_METRIC")
            .ok()
            .and_then(|val| RatingMetric::from_label(&val))
            .unwrap_or(defaults.sort_metric);
        let win_rate_window = env::var("LOBBY_WIN_RATE_WINDOW")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_WIN_RATE_WINDOW)
            .clamp(1, 200);

        Self {
            endpoint_template,
            client_id,
            request_timeout: Duration::from_secs(timeout_secs),
            fetch_parallelism,
            sort_metric,
            win_rate_window,
        }
    }

    pub fn profile_url(&self, id: u64) -> String {
        self.endpoint_template.replace(ID_PLACEHOLDER, &id.to_string())
    }
}
