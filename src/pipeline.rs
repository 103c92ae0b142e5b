use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ScoutConfig;
use crate::error::FetchError;
use crate::lobby::{LobbyCounter, LobbySummary, assign_lobbies};
use crate::normalize::{NormalizeContext, normalize_all};
use crate::profile::{Candidate, Profile};
use crate::ranking::sort_profiles;
use crate::session::ProviderSession;
use crate::stats_fetch::{ProfileSource, RawFetch, fail_all, fetch_candidates};

#[derive(Debug, Clone, Serialize)]
pub struct ScoutReport {
    /// Display-ordered, one per candidate.
    pub profiles: Vec<Profile>,
    pub lobbies: LobbySummary,
    pub failed: usize,
}

/// Open a session, scout every candidate, release the session.
pub fn run(config: &ScoutConfig, candidates: &[Candidate], now: DateTime<Utc>) -> ScoutReport {
    run_with(config, candidates, now, |_| {})
}

/// Like [`run`], with a hook to wire up the session (signal flags) before any request goes out.
pub fn run_with<F>(
    config: &ScoutConfig,
    candidates: &[Candidate],
    now: DateTime<Utc>,
    on_open: F,
) -> ScoutReport
where
    F: FnOnce(&ProviderSession),
{
    match ProviderSession::open(config) {
        Ok(session) => {
            on_open(&session);
            scout_profiles(&session, candidates, config, now)
        }
        Err(err) => {
            log::error!("{err}; every profile will be marked unavailable");
            scout_unavailable(candidates, &err, config, now)
        }
    }
}

pub fn scout_profiles<S>(
    source: &S,
    candidates: &[Candidate],
    config: &ScoutConfig,
    now: DateTime<Utc>,
) -> ScoutReport
where
    S: ProfileSource + ?Sized,
{
    let fetched = fetch_candidates(source, candidates, config.fetch_parallelism);
    finish(candidates, fetched, config, now)
}

pub fn scout_unavailable(
    candidates: &[Candidate],
    err: &FetchError,
    config: &ScoutConfig,
    now: DateTime<Utc>,
) -> ScoutReport {
    finish(candidates, fail_all(candidates, err), config, now)
}

// Only runs once every fetch result is in hand.
fn finish(
    candidates: &[Candidate],
    fetched: Vec<RawFetch>,
    config: &ScoutConfig,
    now: DateTime<Utc>,
) -> ScoutReport {
    let ctx = NormalizeContext::from_config(config, now);
    let mut profiles = normalize_all(candidates, fetched, &ctx);
    let lobbies = assign_lobbies(&mut profiles, &mut LobbyCounter::default());
    sort_profiles(&mut profiles, config.sort_metric);
    let failed = profiles.iter().filter(|p| !p.succeeded).count();
    log::info!(
        "scouted {} players: {} unavailable, {} lobbies",
        profiles.len(),
        failed,
        lobbies.lobbies
    );
    ScoutReport {
        profiles,
        lobbies,
        failed,
    }
}
