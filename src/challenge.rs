//! Anti-automation challenge gate.
//!
//! Runs once per session, before any search is submitted. Detection and
//! token injection happen in the page; the answer itself comes from an
//! external solving service when a token is configured. Solving is
//! best-effort throughout: an unsolved gate is left in place and shows up
//! later as unusable search answers, which is the failure mode the
//! orchestrator already handles.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::browser::{js_escape, ChallengeOutcome, PageSession};
use crate::config::SolverConfig;
use crate::error::{Result, ScrapeError};

/// Fingerprint patches evaluated on every new document: hide the
/// `navigator.webdriver` flag and fill in the surfaces headless Chromium
/// leaves empty.
pub const STEALTH_SCRIPT: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', {
        get: () => false,
        configurable: true,
    });

    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {
            connect: function() {},
            sendMessage: function() {},
        };
    }

    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) =>
        parameters.name === 'notifications'
            ? Promise.resolve({ state: Notification.permission })
            : originalQuery(parameters);

    Object.defineProperty(navigator, 'plugins', {
        get: () => [1, 2, 3, 4, 5],
        configurable: true,
    });

    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-US', 'en'],
        configurable: true,
    });
})();
"#;

/// Returns the reCAPTCHA sitekey, or '' when no widget is on the page.
const DETECT_SCRIPT: &str = r#"
(() => {
    const tagged = document.querySelector('[data-sitekey]');
    if (tagged) return tagged.getAttribute('data-sitekey') || '';
    const frame = document.querySelector(
        'iframe[src*="recaptcha/api2/anchor"], iframe[src*="recaptcha/enterprise/anchor"]');
    if (frame) {
        const m = frame.src.match(/[?&]k=([^&]+)/);
        if (m) return m[1];
    }
    return '';
})()
"#;

/// Fill every response textarea with the answer token and fire the widget
/// callback so the page reacts as if the puzzle had been solved by hand.
fn inject_script(answer: &str) -> String {
    format!(
        r#"(() => {{
    const answer = '{answer}';
    for (const area of document.querySelectorAll(
            'textarea[name="g-recaptcha-response"], #g-recaptcha-response')) {{
        area.value = answer;
    }}
    const cfg = window.___grecaptcha_cfg;
    if (cfg && cfg.clients) {{
        for (const client of Object.values(cfg.clients)) {{
            for (const part of Object.values(client)) {{
                if (!part || typeof part !== 'object') continue;
                for (const leaf of Object.values(part)) {{
                    if (leaf && typeof leaf.callback === 'function') {{
                        leaf.callback(answer);
                        return true;
                    }}
                }}
            }}
        }}
    }}
    return false;
}})()"#,
        answer = js_escape(answer)
    )
}

/// Both 2Captcha endpoints answer with this shape: `status` 1 on success,
/// `request` carrying the payload (an id, a token, or an error code).
#[derive(Debug, Deserialize)]
struct SolverResponse {
    status: u8,
    request: String,
}

/// HTTP client for the 2Captcha-compatible solving API.
pub struct CaptchaSolver {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    poll_interval: Duration,
    max_polls: u32,
}

impl CaptchaSolver {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            poll_interval: Duration::from_secs(5),
            max_polls: 24,
        }
    }

    /// Override the answer-polling cadence.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Submit a reCAPTCHA to the solver and poll for the answer token.
    ///
    /// `None` means unconfigured, rejected, or timed out. The gate treats
    /// all of those as detected-but-unsolved.
    pub async fn solve_recaptcha(&self, sitekey: &str, page_url: &str) -> Option<String> {
        let key = self.token.as_deref()?;

        let submitted = self
            .http
            .post(format!("{}/in.php", self.api_base))
            .form(&[
                ("key", key),
                ("method", "userrecaptcha"),
                ("googlekey", sitekey),
                ("pageurl", page_url),
                ("json", "1"),
            ])
            .send()
            .await;

        let task_id = match Self::parse(submitted).await {
            Ok(r) if r.status == 1 => r.request,
            Ok(r) => {
                warn!(error = %r.request, "solver rejected the challenge submission");
                return None;
            }
            Err(err) => {
                warn!(%err, "solver submission failed");
                return None;
            }
        };
        debug!(task_id = %task_id, "challenge submitted to solver");

        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;

            let polled = self
                .http
                .get(format!("{}/res.php", self.api_base))
                .query(&[("key", key), ("action", "get"), ("id", task_id.as_str()), ("json", "1")])
                .send()
                .await;

            match Self::parse(polled).await {
                Ok(r) if r.status == 1 => return Some(r.request),
                Ok(r) if r.request == "CAPCHA_NOT_READY" => continue,
                Ok(r) => {
                    warn!(error = %r.request, "solver gave up on the challenge");
                    return None;
                }
                Err(err) => {
                    warn!(%err, "solver poll failed");
                    return None;
                }
            }
        }

        warn!("solver did not answer within the polling budget");
        None
    }

    async fn parse(
        response: reqwest::Result<reqwest::Response>,
    ) -> reqwest::Result<SolverResponse> {
        response?.json::<SolverResponse>().await
    }
}

/// Detect a challenge on the page and try to solve it in place.
pub async fn attempt_solve(
    page: &dyn PageSession,
    solver: &CaptchaSolver,
) -> Result<ChallengeOutcome> {
    let detected = page.evaluate(DETECT_SCRIPT).await?;
    let sitekey = match detected.as_str() {
        Some(k) if !k.is_empty() => k.to_owned(),
        _ => return Ok(ChallengeOutcome::default()),
    };
    info!(sitekey = %sitekey, "challenge widget detected");

    if !solver.is_configured() {
        warn!("no solver token configured; leaving the challenge in place");
        return Ok(ChallengeOutcome {
            detected: true,
            solved: false,
        });
    }

    let page_url = page
        .evaluate("window.location.href")
        .await?
        .as_str()
        .map(str::to_owned)
        .unwrap_or_default();

    match solver.solve_recaptcha(&sitekey, &page_url).await {
        Some(answer) => {
            page.evaluate(&inject_script(&answer)).await?;
            info!("challenge answer injected");
            Ok(ChallengeOutcome {
                detected: true,
                solved: true,
            })
        }
        None => Ok(ChallengeOutcome {
            detected: true,
            solved: false,
        }),
    }
}

/// The gate itself: solve a present challenge and, if the solve navigated
/// the page, suspend until that navigation lands. No challenge → return
/// immediately.
pub async fn clear_challenge_gate(page: &dyn PageSession) -> Result<()> {
    let outcome = page.solve_challenges().await?;
    if outcome.solved {
        debug!("challenge solved; waiting for the follow-up navigation");
        page.wait_for_navigation()
            .await
            .map_err(|err| ScrapeError::ChallengeUnsolved(err.to_string()))?;
    } else if outcome.detected {
        warn!("challenge detected but not cleared; search answers may be unusable");
    }
    Ok(())
}
