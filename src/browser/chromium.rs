//! Chromium-backed browser collaborator using chromiumoxide.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, EventFrameNavigated,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{Browser, ChallengeOutcome, PageSession};
use crate::challenge::{self, CaptchaSolver, STEALTH_SCRIPT};
use crate::error::{Result, ScrapeError};

/// Upper bound on every response/navigation wait. The booking site answers
/// well inside this when it answers at all.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. SLOTWATCH_CHROMIUM_PATH env
    if let Ok(p) = std::env::var("SLOTWATCH_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common =
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Headless Chromium engine. One instance serves a whole process; each
/// scrape pass opens its own page session.
pub struct ChromiumBrowser {
    browser: Mutex<CdpBrowser>,
    solver: Arc<CaptchaSolver>,
    wait_timeout: Duration,
}

impl ChromiumBrowser {
    /// Launch a headless Chromium instance.
    pub async fn launch(solver: CaptchaSolver) -> Result<Self> {
        Self::launch_with_timeout(solver, DEFAULT_WAIT_TIMEOUT).await
    }

    pub async fn launch_with_timeout(
        solver: CaptchaSolver,
        wait_timeout: Duration,
    ) -> Result<Self> {
        let chrome_path = find_chromium().ok_or_else(|| {
            ScrapeError::Session(
                "Chromium not found; set SLOTWATCH_CHROMIUM_PATH or install google-chrome"
                    .to_string(),
            )
        })?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(|e| ScrapeError::Session(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .map_err(|e| ScrapeError::Session(format!("failed to launch Chromium: {e}")))?;

        // Event loop for the CDP connection; ends when the browser does.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!("Chromium launched");
        Ok(Self {
            browser: Mutex::new(browser),
            solver: Arc::new(solver),
            wait_timeout,
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>> {
        let page = self.browser.lock().await.new_page("about:blank").await?;

        // Network events feed wait_for_response; the stealth patches must be
        // registered before the first real document loads.
        page.execute(EnableParams::default()).await?;
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_SCRIPT))
            .await?;

        tokio::time::timeout(self.wait_timeout, page.goto(url))
            .await
            .map_err(|_| ScrapeError::NavigationTimeout {
                what: "initial page load",
                waited: self.wait_timeout,
            })??;
        let _ = page.wait_for_navigation().await;

        debug!(url, "page session open");
        Ok(Box::new(ChromiumPage {
            page,
            solver: Arc::clone(&self.solver),
            wait_timeout: self.wait_timeout,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await?;
        let _ = browser.wait().await;
        Ok(())
    }
}

/// A single Chromium page session.
pub struct ChromiumPage {
    page: Page,
    solver: Arc<CaptchaSolver>,
    wait_timeout: Duration,
}

impl ChromiumPage {
    /// Block until the next main-frame navigation commits. The page-level
    /// `wait_for_navigation` resolves immediately on an already-idle page,
    /// which would hand the race a phantom winner; a frameNavigated event
    /// only fires for a real document change.
    async fn next_navigation(&self) -> Result<()> {
        let mut frames = self.page.event_listener::<EventFrameNavigated>().await?;
        while let Some(event) = frames.next().await {
            if event.frame.parent_id.is_none() {
                return Ok(());
            }
        }
        Err(ScrapeError::Session(
            "event stream closed while waiting for navigation".to_string(),
        ))
    }

    async fn response_body(&self, request_id: RequestId) -> Result<String> {
        let body = self
            .page
            .execute(GetResponseBodyParams::new(request_id))
            .await?;
        if body.base64_encoded {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(body.body.as_bytes())
                .map_err(|e| ScrapeError::Session(format!("undecodable response body: {e}")))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(body.body.clone())
        }
    }
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<()> {
        let element = self.page.find_element(selector).await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn wait_for_response(&self, url_fragment: &str) -> Result<String> {
        let mut responses = self.page.event_listener::<EventResponseReceived>().await?;

        let matched = tokio::time::timeout(self.wait_timeout, async {
            while let Some(event) = responses.next().await {
                if event.response.url.contains(url_fragment) {
                    return Some(event);
                }
            }
            None
        })
        .await
        .map_err(|_| ScrapeError::NavigationTimeout {
            what: "search response",
            waited: self.wait_timeout,
        })?;

        let event = matched.ok_or_else(|| {
            ScrapeError::Session("event stream closed before the search response arrived".to_string())
        })?;
        debug!(url = %event.response.url, "matched search response");
        self.response_body(event.request_id.clone()).await
    }

    async fn wait_for_navigation_text(&self) -> Result<String> {
        PageSession::wait_for_navigation(self).await?;
        Ok(self.page.content().await?)
    }

    async fn wait_for_navigation(&self) -> Result<()> {
        let wait = async {
            self.next_navigation().await?;
            // Let the new document finish loading before anyone reads it.
            self.page.wait_for_navigation().await?;
            Ok::<(), ScrapeError>(())
        };
        tokio::time::timeout(self.wait_timeout, wait)
            .await
            .map_err(|_| ScrapeError::NavigationTimeout {
                what: "page navigation",
                waited: self.wait_timeout,
            })??;
        Ok(())
    }

    async fn body_markup(&self) -> Result<String> {
        let value = self
            .evaluate("document.body ? document.body.outerHTML : ''")
            .await?;
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| ScrapeError::Session("document body was not readable".to_string()))
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    async fn solve_challenges(&self) -> Result<ChallengeOutcome> {
        challenge::attempt_solve(self, &self.solver).await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await?;
        Ok(())
    }
}
