use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::config::ScoutConfig;
use crate::profile::{
    Candidate, DEFAULT_RATING, Profile, ProfileStage, RankKind, RatingMetric, Teammate, UNKNOWN_RANK,
};
use crate::stats_fetch::RawFetch;

pub const WIN_RATE_WINDOW: usize = 30;
const FACEIT_ELO_MAX_AGE_DAYS: i64 = 60;
const PREMIER_RANK_TYPE: i64 = 11;

type Path = &'static [&'static str];

/// Provider document shapes seen in the wild.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSchema {
    /// Old per-profile endpoint: `meta`, `recentGameRatings`, `games`.
    Legacy,
    /// Public v3 endpoint with snake_case keys.
    PublicV2,
}

impl ProfileSchema {
    pub fn detect(root: &Map<String, Value>) -> Self {
        const LEGACY_KEYS: [&str; 3] = ["meta", "recentGameRatings", "games"];
        if LEGACY_KEYS.iter().any(|key| root.contains_key(*key)) {
            ProfileSchema::Legacy
        } else {
            ProfileSchema::PublicV2
        }
    }

    fn table(self) -> &'static SchemaTable {
        match self {
            ProfileSchema::Legacy => &LEGACY_TABLE,
            ProfileSchema::PublicV2 => &PUBLIC_V2_TABLE,
        }
    }
}

/// Where each canonical field lives in one schema. Anything not listed keeps
/// its default.
struct SchemaTable {
    name: Path,
    faceit_nickname: &'static [Path],
    ratings: &'static [(RatingMetric, Path)],
    ranks: &'static [(RankKind, Path)],
    match_count: Option<Path>,
    matches: Path,
    match_finished_at: &'static str,
    match_outcome: &'static str,
    teammates: Path,
    teammate_id: &'static str,
    teammate_count: &'static str,
    bans: Path,
    ban_label: &'static str,
}

static LEGACY_TABLE: SchemaTable = SchemaTable {
    name: &["meta", "name"],
    faceit_nickname: &[&["meta", "faceitNickname"]],
    ratings: &[
        (RatingMetric::Aim, &["recentGameRatings", "aim"]),
        (RatingMetric::Positioning, &["recentGameRatings", "positioning"]),
        (RatingMetric::Utility, &["recentGameRatings", "utility"]),
        (RatingMetric::Clutch, &["recentGameRatings", "clutch"]),
        (RatingMetric::Opening, &["recentGameRatings", "opening"]),
        (RatingMetric::Leetify, &["recentGameRatings", "leetify"]),
    ],
    ranks: &[],
    match_count: None,
    matches: &["games"],
    match_finished_at: "gameFinishedAt",
    match_outcome: "matchResult",
    teammates: &["teammates"],
    teammate_id: "steam64Id",
    teammate_count: "recentGamesTogetherCount",
    bans: &["bans"],
    ban_label: "type",
};

static PUBLIC_V2_TABLE: SchemaTable = SchemaTable {
    name: &["name"],
    faceit_nickname: &[&["faceit", "nickname"], &["faceit_nickname"]],
    ratings: &[
        (RatingMetric::Aim, &["rating", "aim"]),
        (RatingMetric::Positioning, &["rating", "positioning"]),
        (RatingMetric::Utility, &["rating", "utility"]),
        (RatingMetric::Clutch, &["rating", "clutch"]),
        (RatingMetric::Opening, &["rating", "opening"]),
        (RatingMetric::Leetify, &["ranks", "leetify"]),
        (RatingMetric::Reaction, &["stats", "reaction_time_ms"]),
        (RatingMetric::Preaim, &["stats", "preaim"]),
        (RatingMetric::HeadAccuracy, &["stats", "accuracy_head"]),
    ],
    ranks: &[
        (RankKind::Premier, &["ranks", "premier"]),
        (RankKind::Faceit, &["ranks", "faceit"]),
        (RankKind::FaceitElo, &["ranks", "faceit_elo"]),
        (RankKind::Wingman, &["ranks", "wingman"]),
        (RankKind::Renown, &["ranks", "renown"]),
    ],
    match_count: Some(&["total_matches"]),
    matches: &["recent_matches"],
    match_finished_at: "finished_at",
    match_outcome: "outcome",
    teammates: &["recent_teammates"],
    teammate_id: "steam64_id",
    teammate_count: "recent_matches_count",
    bans: &["bans"],
    ban_label: "platform",
};

#[derive(Debug, Clone, Copy)]
pub struct NormalizeContext {
    /// Reference time for age-limited fields (FACEIT elo).
    pub now: DateTime<Utc>,
    pub win_rate_window: usize,
}

impl NormalizeContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            win_rate_window: WIN_RATE_WINDOW,
        }
    }

    pub fn from_config(config: &ScoutConfig, now: DateTime<Utc>) -> Self {
        Self {
            now,
            win_rate_window: config.win_rate_window.max(1),
        }
    }
}

/// Join fetch results back onto candidates and normalize each one on its own.
pub fn normalize_all(
    candidates: &[Candidate],
    fetched: Vec<RawFetch>,
    ctx: &NormalizeContext,
) -> Vec<Profile> {
    let mut by_id: HashMap<u64, RawFetch> = fetched.into_iter().map(|r| (r.id, r)).collect();
    candidates
        .iter()
        .map(|candidate| match by_id.remove(&candidate.id) {
            Some(raw) => normalize(candidate, &raw, ctx),
            None => Profile::failed(candidate, "no fetch result"),
        })
        .collect()
}

pub fn normalize(candidate: &Candidate, raw: &RawFetch, ctx: &NormalizeContext) -> Profile {
    match &raw.outcome {
        Err(err) => Profile::failed(candidate, err.to_string()),
        Ok(body) => match parse_profile_json(candidate, body, ctx) {
            Ok(profile) => profile,
            Err(err) => {
                log::warn!("{}: unexpected profile document: {err:#}", candidate.id);
                Profile::failed(candidate, format!("{err:#}"))
            }
        },
    }
}

pub fn parse_profile_json(candidate: &Candidate, raw: &str, ctx: &NormalizeContext) -> Result<Profile> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(anyhow::anyhow!("empty profile response"));
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid profile json")?;
    let Value::Object(map) = &root else {
        return Err(anyhow::anyhow!("profile document is not an object"));
    };
    let schema = ProfileSchema::detect(map);
    let doc = Lookup::new(&root);
    let table = schema.table();

    let mut profile = Profile::unresolved(candidate);
    profile.display_name = doc.str_or(table.name, "");
    profile.faceit_nickname = table
        .faceit_nickname
        .iter()
        .map(|path| doc.str_or(path, ""))
        .find(|nick| !nick.is_empty())
        .unwrap_or_default();
    for (metric, path) in table.ratings {
        profile.ratings.insert(*metric, doc.f64_or(path, DEFAULT_RATING));
    }
    for (kind, path) in table.ranks {
        profile.ranks.insert(*kind, doc.i64_or(path, UNKNOWN_RANK));
    }

    let matches = recent_first(doc.array(table.matches), table.match_finished_at);
    let window = &matches[..matches.len().min(ctx.win_rate_window)];
    profile.win_rate = win_rate(window, table.match_outcome);
    profile.match_count = match table.match_count {
        Some(path) => doc.u32_or(path, 0),
        None => u32::try_from(matches.len()).unwrap_or(u32::MAX),
    };

    let mut tally = TeammateTally::new(candidate.id);
    if schema == ProfileSchema::Legacy {
        apply_legacy_games(&mut profile, &matches, window, &mut tally, ctx);
    }
    for entry in doc.array(table.teammates) {
        let Some(id) = entry.get(table.teammate_id).and_then(parse_player_id) else {
            log::debug!("{}: dropping teammate with malformed id", candidate.id);
            continue;
        };
        let count = Lookup::new(entry).u32_or(&[table.teammate_count], 0);
        tally.report(id, count);
    }
    profile.recent_teammates = tally.into_vec();

    for ban in doc.array(table.bans) {
        let label = match ban {
            Value::String(s) => s.trim().to_string(),
            other => Lookup::new(other).str_or(&[table.ban_label], ""),
        };
        if !label.is_empty() {
            profile.bans.insert(label);
        }
    }

    profile.succeeded = true;
    profile.stage = ProfileStage::Resolved;
    Ok(profile)
}

/// Fields the legacy shape only exposes through its per-game list.
fn apply_legacy_games(
    profile: &mut Profile,
    games: &[&Value],
    window: &[&Value],
    tally: &mut TeammateTally,
    ctx: &NormalizeContext,
) {
    let cutoff = ctx.now - Duration::days(FACEIT_ELO_MAX_AGE_DAYS);
    let faceit_elo = games
        .iter()
        .map(|g| Lookup::new(g))
        .find(|g| {
            g.str_or(&["dataSource"], "") == "faceit"
                && g.get(&["gameFinishedAt"])
                    .and_then(Value::as_str)
                    .and_then(parse_timestamp)
                    .is_some_and(|at| at > cutoff)
        })
        .map(|g| g.i64_or(&["elo"], UNKNOWN_RANK));
    if let Some(elo) = faceit_elo {
        profile.ranks.insert(RankKind::FaceitElo, elo);
    }

    let premier = games
        .iter()
        .map(|g| Lookup::new(g))
        .find(|g| {
            g.str_or(&["dataSource"], "") == "matchmaking"
                && g.i64_or(&["rankType"], UNKNOWN_RANK) == PREMIER_RANK_TYPE
        })
        .map(|g| g.i64_or(&["skillLevel"], UNKNOWN_RANK));
    if let Some(level) = premier {
        profile.ranks.insert(RankKind::Premier, level);
    }

    for game in window {
        for raw in Lookup::new(game).array(&["ownTeamSteam64Ids"]) {
            match parse_player_id(raw) {
                Some(id) => tally.bump(id),
                None => log::debug!("{}: dropping malformed team id {raw}", profile.id),
            }
        }
    }
}

/// Stable newest-first order; undated entries keep their relative order at the end.
fn recent_first<'a>(matches: &'a [Value], finished_key: &str) -> Vec<&'a Value> {
    let mut dated: Vec<(Option<DateTime<Utc>>, &Value)> = matches
        .iter()
        .map(|m| {
            let at = m.get(finished_key).and_then(Value::as_str).and_then(parse_timestamp);
            (at, m)
        })
        .collect();
    dated.sort_by(|a, b| match (a.0, b.0) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    dated.into_iter().map(|(_, m)| m).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchOutcome {
    Win,
    Loss,
    Tie,
}

fn match_outcome(raw: &str) -> Option<MatchOutcome> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "win" | "won" => Some(MatchOutcome::Win),
        "loss" | "lose" | "lost" => Some(MatchOutcome::Loss),
        "tie" | "draw" => Some(MatchOutcome::Tie),
        _ => None,
    }
}

/// Wins over decided games; ties and unknown outcomes count for neither side.
pub fn win_rate(window: &[&Value], outcome_key: &str) -> f64 {
    let mut wins = 0u32;
    let mut losses = 0u32;
    for game in window {
        match game.get(outcome_key).and_then(Value::as_str).and_then(match_outcome) {
            Some(MatchOutcome::Win) => wins += 1,
            Some(MatchOutcome::Loss) => losses += 1,
            Some(MatchOutcome::Tie) | None => {}
        }
    }
    let decided = wins + losses;
    if decided == 0 {
        0.0
    } else {
        f64::from(wins) / f64::from(decided)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Truncates toward zero; NaN, infinities and anything past the i64 range are unknown.
fn float_to_i64(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (f.is_finite() && f >= -LIMIT && f < LIMIT).then_some(f as i64)
}

/// Provider ids are decimal strings; plain numbers are tolerated too.
fn parse_player_id(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.trim().parse::<u64>().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

/// Ordered, de-duplicated teammate counts that never include the owner.
struct TeammateTally {
    owner: u64,
    order: Vec<Teammate>,
    index: HashMap<u64, usize>,
}

impl TeammateTally {
    fn new(owner: u64) -> Self {
        Self {
            owner,
            order: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn slot(&mut self, id: u64) -> Option<&mut Teammate> {
        if id == self.owner {
            return None;
        }
        let idx = *self.index.entry(id).or_insert_with(|| {
            self.order.push(Teammate {
                id,
                recent_match_count: 0,
            });
            self.order.len() - 1
        });
        self.order.get_mut(idx)
    }

    fn bump(&mut self, id: u64) {
        if let Some(mate) = self.slot(id) {
            mate.recent_match_count = mate.recent_match_count.saturating_add(1);
        }
    }

    fn report(&mut self, id: u64, count: u32) {
        if let Some(mate) = self.slot(id) {
            mate.recent_match_count = mate.recent_match_count.max(count);
        }
    }

    fn into_vec(self) -> Vec<Teammate> {
        self.order
    }
}

/// Path lookup over a JSON tree where missing and `null` both mean "use the default".
#[derive(Clone, Copy)]
struct Lookup<'a> {
    root: &'a Value,
}

impl<'a> Lookup<'a> {
    fn new(root: &'a Value) -> Self {
        Self { root }
    }

    fn get(&self, path: &[&str]) -> Option<&'a Value> {
        let mut cur = self.root;
        for key in path {
            cur = cur.as_object()?.get(*key)?;
        }
        if cur.is_null() { None } else { Some(cur) }
    }

    fn f64_or(&self, path: &[&str], default: f64) -> f64 {
        self.get(path).and_then(Value::as_f64).unwrap_or(default)
    }

    fn i64_or(&self, path: &[&str], default: i64) -> i64 {
        self.get(path)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().and_then(float_to_i64)))
            .unwrap_or(default)
    }

    fn u32_or(&self, path: &[&str], default: u32) -> u32 {
        self.i64_or(path, i64::from(default))
            .try_into()
            .unwrap_or(default)
    }

    fn str_or(&self, path: &[&str], default: &str) -> String {
        self.get(path)
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| default.to_string())
    }

    fn array(&self, path: &[&str]) -> &'a [Value] {
        self.get(path)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
