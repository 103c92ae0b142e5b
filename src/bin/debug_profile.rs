use anyhow::{Context, Result};
use chrono::Utc;

use lobby_scout::config::{self, ScoutConfig};
use lobby_scout::normalize::{NormalizeContext, ProfileSchema, normalize};
use lobby_scout::profile::Candidate;
use lobby_scout::session::ProviderSession;
use lobby_scout::stats_fetch::{ProfileSource, RawFetch};

/// Fetch one profile, report which document shape it came back in, and dump
/// the normalized record as JSON.
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    config::init_logging();

    let id = std::env::args()
        .nth(1)
        .context("usage: debug_profile <steam64id>")?
        .parse::<u64>()
        .context("player id must be a number")?;

    let config = ScoutConfig::from_env();
    let session = ProviderSession::open(&config).context("open provider session")?;
    println!("GET {}", config.profile_url(id));

    let outcome = session.fetch_profile(id);
    if let Ok(body) = &outcome {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::Object(map)) => {
                println!("schema: {:?}", ProfileSchema::detect(&map));
            }
            Ok(_) => println!("schema: <not an object>"),
            Err(err) => println!("schema: <invalid json: {err}>"),
        }
    }

    let now = Utc::now();
    let candidate = Candidate::new(id, now);
    let profile = normalize(
        &candidate,
        &RawFetch { id, outcome },
        &NormalizeContext::from_config(&config, now),
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&profile).context("serialize profile")?
    );
    Ok(())
}
