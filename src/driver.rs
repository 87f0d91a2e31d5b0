//! Per-postal-code query driver.

use tracing::{debug, info};

use crate::browser::{js_escape, PageSession};
use crate::classify::classify;
use crate::config::ChainConfig;
use crate::error::Result;
use crate::snapshot::SnapshotWriter;

fn clear_input_script(selector: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector('{}'); if (el) el.value = ''; }})()",
        js_escape(selector)
    )
}

/// Submit one postal-code search and return the site's raw answer.
///
/// The site answers either with an in-page response from the search
/// endpoint or with a full navigation, so the submit races both waits and
/// takes whichever settles first; dropping the losing future cancels it.
/// On a positive classification the evidence capture runs before the
/// answer is returned. Timeouts propagate; one bad postal code aborts the
/// whole pass.
pub async fn query_postal_code(
    page: &dyn PageSession,
    chain: &ChainConfig,
    snapshots: &SnapshotWriter,
    postal_code: &str,
) -> Result<String> {
    debug!(postal_code, "submitting search");

    page.evaluate(&clear_input_script(&chain.search_input)).await?;
    page.type_into(&chain.search_input, postal_code).await?;

    let answer = async {
        tokio::select! {
            body = page.wait_for_response(&chain.search_endpoint) => body,
            document = page.wait_for_navigation_text() => document,
        }
    };
    let (raw, ()) = tokio::try_join!(answer, page.click(&chain.search_button))?;

    if classify(&raw).has_availability {
        info!(postal_code, "availability detected, capturing evidence");
        snapshots
            .capture_screenshot(page, &chain.name, postal_code)
            .await?;
        snapshots.capture_markup(page, &chain.name).await?;
    }

    Ok(raw)
}
