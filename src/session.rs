use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use signal_hook::consts::{SIGINT, SIGTERM};

use crate::config::ScoutConfig;
use crate::error::FetchError;
use crate::stats_fetch::ProfileSource;

/// Provider connection state for one run. Built once, passed to the fetcher,
/// released on drop.
pub struct ProviderSession {
    client: Client,
    config: ScoutConfig,
    interrupted: Arc<AtomicBool>,
}

impl ProviderSession {
    pub fn open(config: &ScoutConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.client_id.as_str())
            .build()
            .map_err(|err| FetchError::ClientInit(err.to_string()))?;
        log::debug!(
            "provider session opened (timeout={}s)",
            config.request_timeout.as_secs()
        );
        Ok(Self {
            client,
            config: config.clone(),
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag shared with signal handlers; once set, unsent requests are skipped.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// Route SIGINT/SIGTERM into the interrupt flag. A repeated signal, once
    /// the flag is already set, terminates the process.
    pub fn stop_on_signals(&self) -> io::Result<()> {
        for signal in [SIGINT, SIGTERM] {
            signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(&self.interrupted))?;
            signal_hook::flag::register(signal, Arc::clone(&self.interrupted))?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.config
    }
}

impl ProfileSource for ProviderSession {
    fn fetch_profile(&self, id: u64) -> Result<String, FetchError> {
        let url = self.config.profile_url(id);
        let resp = self.client.get(&url).send()?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.text().map_err(FetchError::from)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }
}

impl Drop for ProviderSession {
    fn drop(&mut self) {
        log::debug!(
            "provider session released (interrupted={})",
            self.interrupted.load(Ordering::Relaxed)
        );
    }
}
