pub mod config;
pub mod error;
pub mod lobby;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod ranking;
pub mod session;
pub mod stats_fetch;
