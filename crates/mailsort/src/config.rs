//! Configuration loading for the sync and sorting engines
//!
//! OAuth client credentials come from the build, a Google Cloud Console
//! JSON file or the environment, in that order.
//!
//! Engine limits (page size, batch size, concurrency, retry ceiling) live in
//! [`EngineConfig`], which is passed explicitly to every engine entry point.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine settings filename in the gmailsort config directory
const ENGINE_FILE: &str = "engine.json";

/// OAuth client of the Google Cloud project gmailsort runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Credentials JSON as downloaded from the Google Cloud Console
///
/// Desktop clients are stored under `installed`, web clients under `web`.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
}

impl ClientSecretFile {
    fn into_credentials(self) -> Result<GmailCredentials> {
        let ClientSecret {
            client_id,
            client_secret,
        } = self
            .installed
            .or(self.web)
            .context("Credentials JSON has neither an 'installed' nor a 'web' client")?;
        Ok(GmailCredentials {
            client_id,
            client_secret,
        })
    }
}

impl GmailCredentials {
    /// Resolve credentials: embedded at build time, then `credentials_file`
    /// when it exists, then the environment
    pub fn load(credentials_file: &Path) -> Result<Self> {
        if let Some(embedded) = Self::from_compile_time() {
            debug!("Using credentials embedded at build time");
            return Ok(embedded);
        }
        if credentials_file.is_file() {
            return Self::from_file(credentials_file);
        }
        Self::from_env().with_context(|| {
            format!(
                "No credentials at {} and none in the environment",
                credentials_file.display()
            )
        })
    }

    /// Credentials baked in with
    /// `GOOGLE_CLIENT_ID=... GOOGLE_CLIENT_SECRET=... cargo build --release`
    pub fn from_compile_time() -> Option<Self> {
        match (option_env!("GOOGLE_CLIENT_ID"), option_env!("GOOGLE_CLIENT_SECRET")) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Some(Self {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => None,
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file::<ClientSecretFile>(path)?.into_credentials()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str::<ClientSecretFile>(json)
            .context("Credentials JSON is malformed")?
            .into_credentials()
    }

    /// `GMAIL_CLIENT_ID` and `GMAIL_CLIENT_SECRET`
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).with_context(|| format!("{name} is not set"));
        Ok(Self {
            client_id: var("GMAIL_CLIENT_ID")?,
            client_secret: var("GMAIL_CLIENT_SECRET")?,
        })
    }
}

/// Upper bound for `EngineConfig::max_retries`
const MAX_RETRIES: u32 = 20;

/// Upper bound for `EngineConfig::backoff_base_ms`
const MAX_BACKOFF_BASE_MS: u64 = 60_000;

/// Limits and locations used by the sync engine and the fetch executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory holding one directory per profile
    pub profiles_dir: Option<PathBuf>,
    /// Results requested per listing page (Gmail caps this at 500)
    pub page_size: usize,
    /// Message IDs per batch label mutation (Gmail caps this at 1000)
    pub batch_size: usize,
    /// Worker threads used for concurrent message fetches
    pub concurrency: usize,
    /// Retries per message after the first attempt
    pub max_retries: u32,
    /// Backoff unit; the n-th retry waits `uniform(0,1) * 2^n` of these
    pub backoff_base_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profiles_dir: None,
            page_size: 500,
            batch_size: 1000,
            concurrency: 16,
            max_retries: 10,
            backoff_base_ms: 1000,
        }
    }
}

impl EngineConfig {
    /// Load `engine.json` from the config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        if config::config_exists(ENGINE_FILE) {
            let engine: Self = config::load_json(ENGINE_FILE)?;
            return Ok(engine.validated());
        }
        Ok(Self::default())
    }

    /// Clamp values to what the Gmail API accepts and to sane retry limits
    pub fn validated(mut self) -> Self {
        self.page_size = self.page_size.clamp(1, 500);
        self.batch_size = self.batch_size.clamp(1, 1000);
        self.concurrency = self.concurrency.max(1);
        self.max_retries = self.max_retries.min(MAX_RETRIES);
        self.backoff_base_ms = self.backoff_base_ms.min(MAX_BACKOFF_BASE_MS);
        self
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Directory of a named profile
    pub fn profile_dir(&self, profile: &str) -> Result<PathBuf> {
        let root = match &self.profiles_dir {
            Some(dir) => dir.clone(),
            None => config::profiles_dir().context("Could not determine config directory")?,
        };
        config::profile_dir_in(&root, profile)
    }
}
