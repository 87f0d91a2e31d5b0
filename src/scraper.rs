//! Chain orchestrator: one scrape pass over a chain's location list.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{info, warn};

use crate::browser::{Browser, PageSession};
use crate::challenge::clear_challenge_gate;
use crate::classify::classify;
use crate::config::ChainConfig;
use crate::driver::query_postal_code;
use crate::error::Result;
use crate::snapshot::SnapshotWriter;
use crate::types::AvailabilityResult;

pub struct ChainScraper<'a> {
    chain: &'a ChainConfig,
    snapshots: &'a SnapshotWriter,
}

impl<'a> ChainScraper<'a> {
    pub fn new(chain: &'a ChainConfig, snapshots: &'a SnapshotWriter) -> Self {
        Self { chain, snapshots }
    }

    /// Run one full pass: open a session, clear the challenge gate, query
    /// each distinct postal code once, then join the cached answers back
    /// over the complete location list.
    ///
    /// Returns one result per input location, in input order. Any failure
    /// aborts the pass; the partial cache is discarded and no result list
    /// is produced.
    pub async fn run(&self, browser: &dyn Browser) -> Result<Vec<AvailabilityResult>> {
        info!(chain = %self.chain.name, "scrape starting");

        let page = browser.open(&self.chain.website).await?;

        // The session is released on every exit path, error or not.
        let outcome = self.fill_cache(page.as_ref()).await;
        if let Err(err) = page.close().await {
            warn!(%err, "failed to close page session");
        }
        let cache = outcome?;

        let results = self
            .chain
            .locations
            .iter()
            .map(|location| {
                let raw = cache
                    .get(&location.postal_code)
                    .cloned()
                    .unwrap_or_default();
                let outcome = classify(&raw);
                AvailabilityResult {
                    name: format!("{} ({})", self.chain.name, location.city),
                    has_availability: outcome.has_availability,
                    extra_data: outcome.display_fragment,
                    sign_up_link: self.chain.sign_up_link().to_string(),
                    location: location.clone(),
                    timestamp: Utc::now(),
                }
            })
            .collect();

        info!(chain = %self.chain.name, "scrape done");
        Ok(results)
    }

    /// Query every distinct postal code, in first-seen order. Locations
    /// sharing a code share the cached answer; the driver runs once per
    /// code no matter how many stores reference it.
    async fn fill_cache(&self, page: &dyn PageSession) -> Result<HashMap<String, String>> {
        clear_challenge_gate(page).await?;

        let mut cache: HashMap<String, String> = HashMap::new();
        for location in &self.chain.locations {
            if cache.contains_key(&location.postal_code) {
                continue;
            }
            let raw =
                query_postal_code(page, self.chain, self.snapshots, &location.postal_code)
                    .await?;
            cache.insert(location.postal_code.clone(), raw);
        }
        Ok(cache)
    }
}
