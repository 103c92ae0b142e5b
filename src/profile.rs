use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RATING: f64 = 0.0;
pub const UNKNOWN_RANK: i64 = -1;
pub const NO_LOBBY: u32 = 0;

/// A co-observed player handed to us by the candidate source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: u64,
    pub last_activity: DateTime<Utc>,
    /// Name from the candidate source, preferred over the provider name when shown.
    #[serde(default)]
    pub persona_name: Option<String>,
}

impl Candidate {
    pub fn new(id: u64, last_activity: DateTime<Utc>) -> Self {
        Self {
            id,
            last_activity,
            persona_name: None,
        }
    }

    pub fn with_persona(mut self, name: impl Into<String>) -> Self {
        self.persona_name = Some(name.into());
        self
    }

    /// Parse `<steam64id>[@<when>][=<name>]`. `<when>` is either minutes ago
    /// (`45m`) or an RFC 3339 timestamp; without it the candidate is active `now`.
    pub fn from_arg(arg: &str, now: DateTime<Utc>) -> Result<Self> {
        let (head, name) = match arg.split_once('=') {
            Some((head, name)) => (head, Some(name.trim()).filter(|n| !n.is_empty())),
            None => (arg, None),
        };
        let (raw_id, when) = match head.split_once('@') {
            Some((id, when)) => (id, Some(when.trim())),
            None => (head, None),
        };
        let id = raw_id
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid player id {raw_id:?}"))?;
        let last_activity = match when {
            Some(when) => parse_activity(when, now)?,
            None => now,
        };

        let candidate = Self::new(id, last_activity);
        Ok(match name {
            Some(name) => candidate.with_persona(name),
            None => candidate,
        })
    }
}

fn parse_activity(raw: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Some(minutes) = raw.strip_suffix('m') {
        let minutes = minutes
            .parse::<u32>()
            .with_context(|| format!("invalid minutes {raw:?}"))?;
        return Ok(now - Duration::minutes(i64::from(minutes)));
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(at) => Ok(at.with_timezone(&Utc)),
        Err(err) => bail!("invalid activity time {raw:?}: {err}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RatingMetric {
    Aim,
    Positioning,
    Utility,
    Clutch,
    Opening,
    Leetify,
    Reaction,
    Preaim,
    HeadAccuracy,
}

impl RatingMetric {
    pub const ALL: [RatingMetric; 9] = [
        RatingMetric::Aim,
        RatingMetric::Positioning,
        RatingMetric::Utility,
        RatingMetric::Clutch,
        RatingMetric::Opening,
        RatingMetric::Leetify,
        RatingMetric::Reaction,
        RatingMetric::Preaim,
        RatingMetric::HeadAccuracy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RatingMetric::Aim => "aim",
            RatingMetric::Positioning => "positioning",
            RatingMetric::Utility => "utility",
            RatingMetric::Clutch => "clutch",
            RatingMetric::Opening => "opening",
            RatingMetric::Leetify => "leetify",
            RatingMetric::Reaction => "reaction",
            RatingMetric::Preaim => "preaim",
            RatingMetric::HeadAccuracy => "head_accuracy",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL.into_iter().find(|m| m.label() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RankKind {
    Premier,
    Faceit,
    FaceitElo,
    Wingman,
    Renown,
}

impl RankKind {
    pub const ALL: [RankKind; 5] = [
        RankKind::Premier,
        RankKind::Faceit,
        RankKind::FaceitElo,
        RankKind::Wingman,
        RankKind::Renown,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teammate {
    pub id: u64,
    pub recent_match_count: u32,
}

/// Per-profile lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProfileStage {
    Unresolved,
    Resolved,
    Failed,
    LobbyAssigned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: u64,
    pub succeeded: bool,
    pub display_name: String,
    pub faceit_nickname: String,
    pub ratings: BTreeMap<RatingMetric, f64>,
    pub ranks: BTreeMap<RankKind, i64>,
    pub win_rate: f64,
    pub match_count: u32,
    pub recent_teammates: Vec<Teammate>,
    pub bans: BTreeSet<String>,
    pub last_activity: DateTime<Utc>,
    pub failure: Option<String>,
    pub lobby_id: u32,
    pub stage: ProfileStage,
}

impl Profile {
    /// Fresh record with every field at its sentinel default.
    pub fn unresolved(candidate: &Candidate) -> Self {
        Self {
            id: candidate.id,
            succeeded: false,
            display_name: String::new(),
            faceit_nickname: String::new(),
            ratings: RatingMetric::ALL
                .into_iter()
                .map(|m| (m, DEFAULT_RATING))
                .collect(),
            ranks: RankKind::ALL.into_iter().map(|r| (r, UNKNOWN_RANK)).collect(),
            win_rate: 0.0,
            match_count: 0,
            recent_teammates: Vec::new(),
            bans: BTreeSet::new(),
            last_activity: candidate.last_activity,
            failure: None,
            lobby_id: NO_LOBBY,
            stage: ProfileStage::Unresolved,
        }
    }

    pub fn failed(candidate: &Candidate, reason: impl Into<String>) -> Self {
        let mut profile = Self::unresolved(candidate);
        profile.failure = Some(reason.into());
        profile.stage = ProfileStage::Failed;
        profile
    }

    pub fn rating(&self, metric: RatingMetric) -> f64 {
        self.ratings.get(&metric).copied().unwrap_or(DEFAULT_RATING)
    }

    pub fn rank(&self, kind: RankKind) -> i64 {
        self.ranks.get(&kind).copied().unwrap_or(UNKNOWN_RANK)
    }

    pub fn lists_teammate(&self, id: u64) -> bool {
        self.recent_teammates.iter().any(|t| t.id == id)
    }

    pub fn in_lobby(&self) -> bool {
        self.lobby_id != NO_LOBBY
    }

    /// External persona name, then provider name, then the raw id.
    pub fn display_name(&self, persona: Option<&str>) -> String {
        let persona = persona
            .map(str::trim)
            .filter(|name| !name.is_empty() && *name != "[unknown]");
        if let Some(name) = persona {
            return name.to_string();
        }
        let provider = self.display_name.trim();
        if !provider.is_empty() {
            return provider.to_string();
        }
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> Candidate {
        Candidate::new(76561198000000001, DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn failed_profile_carries_every_default() {
        let p = Profile::failed(&candidate(), "http 500");
        assert!(!p.succeeded);
        assert_eq!(p.stage, ProfileStage::Failed);
        assert_eq!(p.ratings.len(), RatingMetric::ALL.len());
        assert!(p.ratings.values().all(|v| *v == DEFAULT_RATING));
        assert!(p.ranks.values().all(|v| *v == UNKNOWN_RANK));
        assert_eq!(p.win_rate, 0.0);
        assert_eq!(p.lobby_id, NO_LOBBY);
    }

    #[test]
    fn display_name_falls_through_in_order() {
        let mut p = Profile::unresolved(&candidate());
        assert_eq!(p.display_name(None), "76561198000000001");
        p.display_name = "provider".to_string();
        assert_eq!(p.display_name(Some("")), "provider");
        assert_eq!(p.display_name(Some("[unknown]")), "provider");
        assert_eq!(p.display_name(Some("persona")), "persona");
    }

    #[test]
    fn candidate_arg_carries_activity_time() {
        let now = DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let plain = Candidate::from_arg("76561198000000001", now).unwrap();
        assert_eq!(plain.last_activity, now);
        assert_eq!(plain.persona_name, None);

        let ago = Candidate::from_arg("76561198000000002@45m=bob@home", now).unwrap();
        assert_eq!(ago.id, 76561198000000002);
        assert_eq!(now - ago.last_activity, Duration::minutes(45));
        assert_eq!(ago.persona_name.as_deref(), Some("bob@home"));

        let stamped = Candidate::from_arg("3@2025-03-01T11:30:00Z", now).unwrap();
        assert_eq!((now - stamped.last_activity).num_minutes(), 30);

        assert!(Candidate::from_arg("abc=name", now).is_err());
        assert!(Candidate::from_arg("3@soon", now).is_err());
    }

    #[test]
    fn metric_labels_round_trip_loosely() {
        assert_eq!(RatingMetric::from_label("Head-Accuracy"), Some(RatingMetric::HeadAccuracy));
        assert_eq!(RatingMetric::from_label(" LEETIFY "), Some(RatingMetric::Leetify));
        assert_eq!(RatingMetric::from_label("kd"), None);
    }
}
