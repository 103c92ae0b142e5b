use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use chrono::{DateTime, Utc};

use lobby_scout::config::{self, ScoutConfig};
use lobby_scout::pipeline::{self, ScoutReport};
use lobby_scout::profile::{Candidate, Profile, RankKind, RatingMetric};

const PROFILE_URL: &str = "https://leetify.com/app/profile/";

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    config::init_logging();

    let now = Utc::now();
    let candidates = candidates_from_args(std::env::args().skip(1), now)?;
    if candidates.is_empty() {
        eprintln!("usage: lobby_scout <steam64id>[@<minutes>m|@<rfc3339>][=name] ...");
        return Ok(());
    }

    let config = ScoutConfig::from_env();
    let mut interrupted: Option<Arc<AtomicBool>> = None;
    let report = pipeline::run_with(&config, &candidates, now, |session| {
        if let Err(err) = session.stop_on_signals() {
            log::warn!("failed to register signal handlers: {err}");
        }
        interrupted = Some(session.interrupt_flag());
    });

    let personas: HashMap<u64, &str> = candidates
        .iter()
        .filter_map(|c| c.persona_name.as_deref().map(|name| (c.id, name)))
        .collect();
    print_report(&report, &personas, config.sort_metric, now);

    if interrupted.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        log::warn!("interrupted; unsent requests were skipped");
    }
    Ok(())
}

fn candidates_from_args(args: impl Iterator<Item = String>, now: DateTime<Utc>) -> Result<Vec<Candidate>> {
    let mut out: Vec<Candidate> = Vec::new();
    for arg in args {
        let candidate = Candidate::from_arg(&arg, now)?;
        if out.iter().any(|c| c.id == candidate.id) {
            continue;
        }
        out.push(candidate);
    }
    Ok(out)
}

fn print_report(
    report: &ScoutReport,
    personas: &HashMap<u64, &str>,
    metric: RatingMetric,
    now: DateTime<Utc>,
) {
    let header = [
        "Name", "Lobby", "Sort", "Premier", "Aim", "Pos", "Util", "Win%", "Matches", "FACEIT",
        "Time", "Bans", "Teammates",
    ];
    let mut rows: Vec<Option<Vec<String>>> = Vec::new();
    let mut last_lobby: Option<u32> = None;
    for profile in &report.profiles {
        if last_lobby.is_some_and(|id| id != profile.lobby_id) {
            rows.push(None);
        }
        last_lobby = Some(profile.lobby_id);
        rows.push(Some(profile_row(profile, report, personas, metric, now)));
    }

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows.iter().flatten() {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let render = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    println!("{}", render(&header));
    println!("{}", "-".repeat(widths.iter().sum::<usize>() + 3 * (widths.len() - 1)));
    for row in rows {
        match row {
            Some(cells) => println!("{}", render(&cells)),
            None => println!(),
        }
    }
    println!();
    for profile in &report.profiles {
        println!("{PROFILE_URL}{}", profile.id);
    }
}

fn profile_row(
    profile: &Profile,
    report: &ScoutReport,
    personas: &HashMap<u64, &str>,
    metric: RatingMetric,
    now: DateTime<Utc>,
) -> Vec<String> {
    let name = profile.display_name(personas.get(&profile.id).copied());
    let lobby = if profile.in_lobby() {
        profile.lobby_id.to_string()
    } else {
        "-".to_string()
    };
    let minutes = (now - profile.last_activity).num_minutes().max(0);
    let played = format!("{minutes}m");
    let teammates = report
        .profiles
        .iter()
        .filter(|other| other.id != profile.id && other.lists_teammate(profile.id))
        .map(|other| other.display_name(personas.get(&other.id).copied()))
        .collect::<Vec<_>>()
        .join(", ");

    if !profile.succeeded {
        let mut row = vec![name, lobby, "N/A".to_string()];
        row.extend(std::iter::repeat_n(String::new(), 7));
        row.extend([played, String::new(), teammates]);
        return row;
    }

    let rank = |kind: RankKind| match profile.rank(kind) {
        r if r <= 0 => "N/A".to_string(),
        r => r.to_string(),
    };
    let faceit = match (profile.rank(RankKind::FaceitElo), profile.faceit_nickname.as_str()) {
        (elo, nick) if elo > 0 => format!("[{elo}] {nick}").trim().to_string(),
        (_, nick) => nick.to_string(),
    };
    vec![
        name,
        lobby,
        format!("{:.2}", profile.rating(metric)),
        rank(RankKind::Premier),
        format!("{:.0}", profile.rating(RatingMetric::Aim)),
        format!("{:.0}", profile.rating(RatingMetric::Positioning)),
        format!("{:.0}", profile.rating(RatingMetric::Utility)),
        format!("{:.0}%", profile.win_rate * 100.0),
        profile.match_count.to_string(),
        faceit,
        played,
        profile.bans.iter().cloned().collect::<Vec<_>>().join(", "),
        teammates,
    ]
}
