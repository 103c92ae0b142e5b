use rayon::prelude::*;

use crate::error::FetchError;
use crate::profile::Candidate;

/// Anything that can hand back the raw provider document for one player.
pub trait ProfileSource: Sync {
    fn fetch_profile(&self, id: u64) -> Result<String, FetchError>;

    fn is_interrupted(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFetch {
    pub id: u64,
    pub outcome: Result<String, FetchError>,
}

/// Fan out one request per candidate and join on all of them.
///
/// The returned vector lines up index-for-index with `candidates`, whatever
/// order the requests finished in.
pub fn fetch_candidates<S>(source: &S, candidates: &[Candidate], parallelism: usize) -> Vec<RawFetch>
where
    S: ProfileSource + ?Sized,
{
    if candidates.is_empty() {
        return Vec::new();
    }
    let threads = candidates.len().min(parallelism.max(1));
    with_fetch_pool(threads, || {
        candidates
            .par_iter()
            .with_max_len(1)
            .map(|candidate| fetch_one(source, candidate.id))
            .collect()
    })
}

/// One failed entry per candidate, used when no session could be opened.
pub fn fail_all(candidates: &[Candidate], err: &FetchError) -> Vec<RawFetch> {
    candidates
        .iter()
        .map(|candidate| RawFetch {
            id: candidate.id,
            outcome: Err(err.clone()),
        })
        .collect()
}

fn fetch_one<S>(source: &S, id: u64) -> RawFetch
where
    S: ProfileSource + ?Sized,
{
    if source.is_interrupted() {
        return RawFetch {
            id,
            outcome: Err(FetchError::Interrupted),
        };
    }
    let outcome = source.fetch_profile(id);
    match &outcome {
        Ok(body) => log::debug!("{id}: fetched {} bytes", body.len()),
        Err(err) if err.is_expected() => log::debug!("{id}: {err}"),
        Err(err) => log::warn!("{id}: profile fetch failed: {err}"),
    }
    RawFetch { id, outcome }
}

fn with_fetch_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("profile-fetch-{i}"))
        .build()
    {
        Ok(pool) => pool.install(action),
        Err(err) => {
            log::warn!("fetch pool build failed, using global pool: {err}");
            action()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::{DateTime, Utc};

    use super::*;

    struct ScriptedSource {
        replies: HashMap<u64, (u64, Result<String, FetchError>)>,
        seen: Mutex<Vec<u64>>,
    }

    impl ProfileSource for ScriptedSource {
        fn fetch_profile(&self, id: u64) -> Result<String, FetchError> {
            let (delay_ms, reply) = self
                .replies
                .get(&id)
                .cloned()
                .unwrap_or((0, Err(FetchError::NotFound)));
            std::thread::sleep(Duration::from_millis(delay_ms));
            self.seen.lock().unwrap().push(id);
            reply
        }
    }

    fn candidates(ids: &[u64]) -> Vec<Candidate> {
        ids.iter()
            .map(|id| Candidate::new(*id, DateTime::<Utc>::UNIX_EPOCH))
            .collect()
    }

    #[test]
    fn results_follow_input_order_not_completion_order() {
        let source = ScriptedSource {
            replies: HashMap::from([
                (1, (60, Ok("one".to_string()))),
                (2, (30, Err(FetchError::Status(500)))),
                (3, (0, Ok("three".to_string()))),
            ]),
            seen: Mutex::new(Vec::new()),
        };
        let out = fetch_candidates(&source, &candidates(&[1, 2, 3]), 8);
        let ids: Vec<u64> = out.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(out[0].outcome, Ok("one".to_string()));
        assert_eq!(out[1].outcome, Err(FetchError::Status(500)));
        assert_eq!(out[2].outcome, Ok("three".to_string()));
        assert_eq!(source.seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn requests_run_side_by_side() {
        let ids: Vec<u64> = (1..=10).collect();
        let source = ScriptedSource {
            replies: ids.iter().map(|id| (*id, (400, Ok(id.to_string())))).collect(),
            seen: Mutex::new(Vec::new()),
        };
        let started = std::time::Instant::now();
        let out = fetch_candidates(&source, &candidates(&ids), 10);
        let elapsed = started.elapsed();

        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|r| r.outcome.is_ok()));
        // Ten 400ms requests one after another would take 4s.
        assert!(elapsed < Duration::from_millis(1500), "took {elapsed:?}");
    }

    #[test]
    fn every_candidate_gets_a_result_when_everything_fails() {
        let source = ScriptedSource {
            replies: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        };
        let out = fetch_candidates(&source, &candidates(&[9, 8, 7, 6]), 2);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|r| r.outcome == Err(FetchError::NotFound)));
    }

    #[test]
    fn interrupted_source_skips_requests() {
        struct Stopped;
        impl ProfileSource for Stopped {
            fn fetch_profile(&self, _id: u64) -> Result<String, FetchError> {
                panic!("no request should be issued after interrupt");
            }
            fn is_interrupted(&self) -> bool {
                true
            }
        }
        let out = fetch_candidates(&Stopped, &candidates(&[1, 2]), 4);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.outcome == Err(FetchError::Interrupted)));
    }

    #[test]
    fn fail_all_keeps_cardinality() {
        let out = fail_all(&candidates(&[5, 6]), &FetchError::ClientInit("boom".into()));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].id, 6);
    }
}
