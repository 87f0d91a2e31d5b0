//! Browser collaborator abstraction.
//!
//! `Browser` and `PageSession` define exactly what the scrape workflow
//! needs from a browser engine; `chromium` implements them with
//! chromiumoxide. Tests drive the workflow with scripted implementations.

pub mod chromium;

use async_trait::async_trait;

use crate::error::Result;

/// Outcome of a best-effort anti-automation challenge solve.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChallengeOutcome {
    /// A challenge widget was present on the page.
    pub detected: bool,
    /// An answer token was obtained and injected.
    pub solved: bool,
}

/// A browser engine that can open page sessions.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a new page session, navigated to `url`.
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>>;
    /// Shut down the engine, releasing every page.
    async fn shutdown(&self) -> Result<()>;
}

/// One live page, owned by a single scrape pass for its lifetime.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Evaluate a script against the document. `undefined` maps to `null`.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;
    /// Type into the element matching `selector`.
    async fn type_into(&self, selector: &str, text: &str) -> Result<()>;
    /// Click the element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;
    /// Resolve with the body of the next network response whose URL
    /// contains `url_fragment`.
    async fn wait_for_response(&self, url_fragment: &str) -> Result<String>;
    /// Resolve with the rendered document once a full navigation commits.
    async fn wait_for_navigation_text(&self) -> Result<String>;
    /// Wait for the next full navigation to commit and settle, without
    /// reading the document.
    async fn wait_for_navigation(&self) -> Result<()>;
    /// Full markup of the document body.
    async fn body_markup(&self) -> Result<String>;
    /// PNG screenshot of the full page.
    async fn screenshot_png(&self) -> Result<Vec<u8>>;
    /// Best-effort anti-automation challenge solve; see [`crate::challenge`].
    async fn solve_challenges(&self) -> Result<ChallengeOutcome>;
    /// Close this page.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Escape a string for safe injection into a JavaScript string literal.
///
/// Postal codes and selectors come from configuration, solver tokens from an
/// external API; all of them pass through here before being spliced into a
/// page script.
pub(crate) fn js_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\'' => result.push_str("\\'"),
            '"' => result.push_str("\\\""),
            '`' => result.push_str("\\`"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => {}
            '<' => result.push_str("\\x3c"),
            '>' => result.push_str("\\x3e"),
            _ => result.push(ch),
        }
    }
    result
}
