//! Explicit configuration objects, constructed once at startup.
//!
//! Nothing in the core reads the environment or a global site registry;
//! `main` builds these and passes them down by reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, ScrapeError};
use crate::types::Location;

fn default_search_input() -> String {
    "#zip-input".to_string()
}

fn default_search_button() -> String {
    "#btnGo".to_string()
}

/// One chain's scrape target: the booking site, the search controls on it,
/// and the store locations to check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Filled from the site-list map key, not the JSON body.
    #[serde(skip)]
    pub name: String,
    pub website: String,
    /// Link surfaced in result records; falls back to `website`.
    #[serde(default)]
    pub sign_up_link: Option<String>,
    /// URL fragment of the endpoint that answers a postal-code search.
    pub search_endpoint: String,
    #[serde(default = "default_search_input")]
    pub search_input: String,
    #[serde(default = "default_search_button")]
    pub search_button: String,
    pub locations: Vec<Location>,
}

impl ChainConfig {
    pub fn sign_up_link(&self) -> &str {
        self.sign_up_link.as_deref().unwrap_or(&self.website)
    }
}

/// The static site list: chain name → chain config.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteList {
    #[serde(flatten)]
    chains: HashMap<String, ChainConfig>,
}

impl SiteList {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScrapeError::Config(format!("cannot read site list {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            ScrapeError::Config(format!("invalid site list {}: {e}", path.display()))
        })
    }

    /// Look up a chain by name, returning a config with `name` filled in.
    pub fn chain(&self, name: &str) -> Result<ChainConfig> {
        let config = self.chains.get(name).ok_or_else(|| {
            let mut known: Vec<&str> = self.chains.keys().map(String::as_str).collect();
            known.sort_unstable();
            ScrapeError::Config(format!(
                "unknown chain \"{name}\" (site list has: {})",
                known.join(", ")
            ))
        })?;
        let mut config = config.clone();
        config.name = name.to_string();
        Ok(config)
    }
}

/// Object-storage credentials and bucket, from the environment.
///
/// Variable names are inherited from the deployment this watcher replaces;
/// renaming them would break the scheduler's secret wiring.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    /// Override for S3-compatible stores; normal AWS use leaves this unset.
    pub endpoint: Option<String>,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |name: &str| {
            get(name).ok_or_else(|| ScrapeError::Config(format!("{name} is not set")))
        };
        Ok(Self {
            access_key_id: require("AWSACCESSKEYID")?,
            secret_access_key: require("AWSSECRETACCESSKEY")?,
            bucket: require("AWSS3BUCKETNAME")?,
            region: get("AWSREGION").unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: get("AWSS3ENDPOINT"),
        })
    }
}

/// Anti-automation challenge solver credentials. Absence is not an error:
/// the gate degrades to detect-and-warn.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub token: Option<String>,
    pub api_base: String,
}

impl SolverConfig {
    pub fn from_env() -> Self {
        Self {
            token: std::env::var("TWOCAPTCHA_TOKEN").ok(),
            api_base: "https://2captcha.com".to_string(),
        }
    }
}

/// Minimum settle delay before a markup capture. The booking page exposes no
/// network-idle signal, so a fixed wait stands in for one; anything shorter
/// than this reliably truncates the in-flight slot listings.
pub const MIN_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Where evidence artifacts land locally, and how long to let the page
/// settle before reading its markup.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub artifact_dir: PathBuf,
    pub settle_delay: Duration,
}

impl SnapshotConfig {
    /// `settle_delay` is clamped up to [`MIN_SETTLE_DELAY`].
    pub fn new(artifact_dir: PathBuf, settle_delay: Duration) -> Self {
        Self {
            artifact_dir,
            settle_delay: settle_delay.max(MIN_SETTLE_DELAY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site_list(json: &str) -> SiteList {
        serde_json::from_str(json).expect("site list should parse")
    }

    #[test]
    fn test_chain_lookup_fills_name_and_defaults() {
        let list = site_list(
            r#"{
                "Hannaford": {
                    "website": "https://hannafordsched.example.com/schedule",
                    "searchEndpoint": "/Patient/CheckZipCode",
                    "locations": [{"zip": "04101", "city": "Portland"}]
                }
            }"#,
        );
        let chain = list.chain("Hannaford").unwrap();
        assert_eq!(chain.name, "Hannaford");
        assert_eq!(chain.search_input, "#zip-input");
        assert_eq!(chain.search_button, "#btnGo");
        assert_eq!(chain.sign_up_link(), "https://hannafordsched.example.com/schedule");
        assert_eq!(chain.locations.len(), 1);
    }

    #[test]
    fn test_explicit_sign_up_link_wins() {
        let list = site_list(
            r#"{
                "Hannaford": {
                    "website": "https://sched.example.com",
                    "signUpLink": "https://signup.example.com",
                    "searchEndpoint": "/CheckZipCode",
                    "locations": []
                }
            }"#,
        );
        assert_eq!(
            list.chain("Hannaford").unwrap().sign_up_link(),
            "https://signup.example.com"
        );
    }

    #[test]
    fn test_unknown_chain_names_the_known_ones() {
        let list = site_list(
            r#"{"Hannaford": {"website": "w", "searchEndpoint": "e", "locations": []}}"#,
        );
        let err = list.chain("CVS").unwrap_err();
        assert!(err.to_string().contains("Hannaford"), "got: {err}");
    }

    #[test]
    fn test_storage_config_requires_credentials() {
        let err = StorageConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
        assert!(err.to_string().contains("AWSACCESSKEYID"));
    }

    #[test]
    fn test_storage_config_defaults_region() {
        let cfg = StorageConfig::from_lookup(|name| match name {
            "AWSACCESSKEYID" => Some("id".into()),
            "AWSSECRETACCESSKEY" => Some("secret".into()),
            "AWSS3BUCKETNAME" => Some("bucket".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.region, "us-east-1");
        assert!(cfg.endpoint.is_none());
    }

    #[test]
    fn test_settle_delay_clamps_to_minimum() {
        let cfg = SnapshotConfig::new(PathBuf::from("."), Duration::from_millis(50));
        assert_eq!(cfg.settle_delay, MIN_SETTLE_DELAY);

        let cfg = SnapshotConfig::new(PathBuf::from("."), Duration::from_secs(3));
        assert_eq!(cfg.settle_delay, Duration::from_secs(3));
    }
}
