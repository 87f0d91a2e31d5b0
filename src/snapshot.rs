//! Local evidence capture: screenshots and page-markup snapshots.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use tracing::info;

use crate::archive::EvidenceStore;
use crate::browser::PageSession;
use crate::config::SnapshotConfig;
use crate::error::Result;

/// Namespace under which markup evidence lands in the store.
const EVIDENCE_NAMESPACE: &str = "debug";

/// Writes evidence artifacts locally and hands markup captures to the
/// archiver.
pub struct SnapshotWriter {
    config: SnapshotConfig,
    store: Arc<dyn EvidenceStore>,
}

impl SnapshotWriter {
    pub fn new(config: SnapshotConfig, store: Arc<dyn EvidenceStore>) -> Self {
        Self { config, store }
    }

    /// Capture a PNG of the page, named by postal code and local date so a
    /// positive hit can be reviewed later. Stays local; only markup is
    /// archived remotely.
    pub async fn capture_screenshot(
        &self,
        page: &dyn PageSession,
        chain: &str,
        postal_code: &str,
    ) -> Result<PathBuf> {
        let bytes = page.screenshot_png().await?;
        let name = screenshot_name(chain, postal_code, Local::now().date_naive());
        tokio::fs::create_dir_all(&self.config.artifact_dir).await?;
        let path = self.config.artifact_dir.join(&name);
        tokio::fs::write(&path, &bytes).await?;
        info!(artifact = %path.display(), "wrote screenshot");
        Ok(path)
    }

    /// Capture the document body and archive it, returning the artifact
    /// name. The page has no usable network-idle signal, so a fixed settle
    /// delay stands in for one while in-flight slot listings finish.
    pub async fn capture_markup(&self, page: &dyn PageSession, chain: &str) -> Result<String> {
        tokio::time::sleep(self.config.settle_delay).await;

        let markup = page.body_markup().await?;
        let name = markup_name(chain, Utc::now());
        tokio::fs::create_dir_all(&self.config.artifact_dir).await?;
        let path = self.config.artifact_dir.join(&name);
        tokio::fs::write(&path, markup.as_bytes()).await?;

        let location = self.store.archive(EVIDENCE_NAMESPACE, &path).await?;
        info!(artifact = %name, location = %location, "markup archived");

        // The uploaded copy is canonical; drop the local one.
        tokio::fs::remove_file(&path).await?;
        Ok(name)
    }
}

/// `<chain>-zip-<postal>-date-<Y-M-D>.png`, month and day unpadded, local
/// date. The review tooling expects exactly this naming.
fn screenshot_name(chain: &str, postal_code: &str, date: NaiveDate) -> String {
    format!(
        "{}-zip-{}-date-{}-{}-{}.png",
        chain.to_lowercase(),
        postal_code,
        date.year(),
        date.month(),
        date.day()
    )
}

/// `<chain>-<YYYY-MM-DDTHHMM>Z.html`, minute granularity, UTC.
fn markup_name(chain: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}Z.html", chain.to_lowercase(), now.format("%Y-%m-%dT%H%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_screenshot_name_is_unpadded_and_lowercase() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 2).unwrap();
        assert_eq!(
            screenshot_name("Hannaford", "04101", date),
            "hannaford-zip-04101-date-2021-3-2.png"
        );
    }

    #[test]
    fn test_screenshot_name_keeps_double_digit_parts() {
        let date = NaiveDate::from_ymd_opt(2021, 12, 31).unwrap();
        assert_eq!(
            screenshot_name("Hannaford", "04102", date),
            "hannaford-zip-04102-date-2021-12-31.png"
        );
    }

    #[test]
    fn test_markup_name_is_minute_granular() {
        let now = Utc.with_ymd_and_hms(2021, 3, 2, 14, 5, 33).unwrap();
        assert_eq!(markup_name("Hannaford", now), "hannaford-2021-03-02T1405Z.html");
    }
}
