//! Configuration

use std::env;

use serde::{Deserialize, Serialize};
use zkcas_tree::DEFAULT_ROOT_HISTORY;

/// Proof service mode
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProofMode {
    /// Remote prover over HTTP
    Http,
    /// Canned proofs (for testing, instant)
    Mock,
}

impl Default for ProofMode {
    fn default() -> Self {
        Self::Mock
    }
}

impl From<&str> for ProofMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "http" => Self::Http,
            _ => Self::Mock,
        }
    }
}

/// Host configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Proof service mode
    pub proof_mode: ProofMode,
    /// Proof service endpoint (Http mode)
    pub proof_service_url: String,
    /// Per-call proof service timeout in milliseconds
    pub proof_timeout_ms: u64,
    /// Proof fetch attempts before surfacing the failure
    pub max_proof_retries: u32,
    /// Base backoff between proof retries in milliseconds (doubles per attempt)
    pub retry_backoff_ms: u64,
    /// Historical roots retained for proof freshness checks
    pub root_history_window: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proof_mode: ProofMode::Mock,
            proof_service_url: "http://localhost:3001".to_string(),
            proof_timeout_ms: 5_000,
            max_proof_retries: 3,
            retry_backoff_ms: 100,
            root_history_window: DEFAULT_ROOT_HISTORY,
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            proof_mode: env::var("PROOF_MODE")
                .map(|s| ProofMode::from(s.as_str()))
                .unwrap_or_default(),
            proof_service_url: env::var("PROOF_SERVICE_URL")
                .unwrap_or(defaults.proof_service_url),
            proof_timeout_ms: env::var("PROOF_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.proof_timeout_ms),
            max_proof_retries: env::var("MAX_PROOF_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_proof_retries),
            retry_backoff_ms: env::var("RETRY_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_backoff_ms),
            root_history_window: env::var("ROOT_HISTORY_WINDOW")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.root_history_window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ProofMode::from("http"), ProofMode::Http);
        assert_eq!(ProofMode::from("HTTP"), ProofMode::Http);
        assert_eq!(ProofMode::from("mock"), ProofMode::Mock);
        assert_eq!(ProofMode::from("anything-else"), ProofMode::Mock);
    }

    #[test]
    fn test_defaults_run_without_env() {
        let config = Config::default();
        assert_eq!(config.proof_mode, ProofMode::Mock);
        assert!(config.max_proof_retries > 0);
    }
}
