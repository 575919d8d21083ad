//! Chromium-backed browser engine using chromiumoxide.

use super::{BrowserEngine, NavigationResult, PageSession};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Desktop-sized viewport: entry forms routinely collapse or hide fields in
/// mobile layouts, and the visual fallback maps OCR regions against these
/// coordinates.
const VIEWPORT: (u32, u32) = (1366, 960);

/// Several entry platforms refuse the default `HeadlessChrome` UA outright,
/// so sessions present a regular desktop Chrome instead.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// How long to poll for `document.readyState === "complete"` after the
/// navigation itself resolves. Entry pages inject their forms from script;
/// scanning before they settle misses fields.
const SETTLE_CAP: Duration = Duration::from_millis(2_000);

/// Locate a Chromium binary: `ENTRANT_CHROMIUM_PATH`, then the managed
/// `~/.entrant/chromium/` install, then well-known locations and `PATH`.
pub fn find_chromium() -> Option<PathBuf> {
    if let Some(p) = std::env::var_os("ENTRANT_CHROMIUM_PATH") {
        let path = PathBuf::from(p);
        if path.is_file() {
            return Some(path);
        }
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        let managed = home.join(".entrant/chromium");
        if cfg!(target_os = "macos") {
            for dist in ["chrome-mac-arm64", "chrome-mac-x64"] {
                candidates.push(managed.join(dist).join(
                    "Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
                ));
            }
        } else {
            candidates.push(managed.join("chrome-linux64/chrome"));
        }
        candidates.push(managed.join("chrome"));
    }
    if cfg!(target_os = "macos") {
        candidates.push(PathBuf::from(
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        ));
    }

    candidates.into_iter().find(|c| c.is_file()).or_else(|| {
        ["google-chrome", "chromium", "chromium-browser"]
            .iter()
            .find_map(|name| which::which(name).ok())
    })
}

/// Chromium-backed engine.
pub struct ChromiumEngine {
    browser: Browser,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumEngine {
    /// Launch a headless Chromium tuned for form pages: fixed desktop
    /// viewport, images off (text and inputs are all the runtime reads).
    pub async fn new() -> Result<Self> {
        let exe = find_chromium()
            .context("no Chromium binary found; set ENTRANT_CHROMIUM_PATH")?;

        let config = BrowserConfig::builder()
            .chrome_executable(exe)
            .window_size(VIEWPORT.0, VIEWPORT.1)
            .args(vec![
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--disable-extensions",
                "--disable-background-networking",
                "--blink-settings=imagesEnabled=false",
            ])
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        // Drive the CDP event loop for the lifetime of the browser.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_session(&self) -> Result<Box<dyn PageSession>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        page.set_user_agent(USER_AGENT)
            .await
            .context("failed to override user agent")?;

        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(ChromiumSession {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        // The browser process exits when the engine is dropped.
        Ok(())
    }

    fn active_sessions(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium page session.
pub struct ChromiumSession {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumSession {
    /// Poll until the document reports itself complete or the cap runs out.
    /// Best effort; a page that never settles is still handed to the scans.
    async fn settle(&self, cap: Duration) {
        let deadline = tokio::time::Instant::now() + cap.min(SETTLE_CAP);
        loop {
            let ready = self
                .page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|r| r.value().and_then(|v| v.as_str().map(String::from)));
            if ready.as_deref() == Some("complete") {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult> {
        let budget = Duration::from_millis(timeout_ms);
        let start = tokio::time::Instant::now();

        match tokio::time::timeout(budget, self.page.goto(url)).await {
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Ok(Ok(_)) => {}
        }

        let remaining = budget.saturating_sub(start.elapsed());
        if let Ok(nav) = tokio::time::timeout(remaining, self.page.wait_for_navigation()).await {
            let _ = nav;
        }
        self.settle(budget.saturating_sub(start.elapsed())).await;

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .map(|u| u.to_string())
            .unwrap_or_else(|| url.to_string());
        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let eval = self
            .page
            .evaluate(script)
            .await
            .context("script evaluation failed")?;
        eval.into_value()
            .map_err(|e| anyhow::anyhow!("script result not serializable: {e:?}"))
    }

    async fn html(&self) -> Result<String> {
        self.page.content().await.context("failed to read page HTML")
    }

    async fn url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .context("failed to read page URL")?
            .map(|u| u.to_string())
            .unwrap_or_default())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .build(),
            )
            .await
            .context("failed to capture screenshot")
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "page close failed");
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
