// Copyright 2026 the Entrant Runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Browser abstraction for page interaction.
//!
//! Defines the `BrowserEngine` and `PageSession` traits that abstract over
//! the browser (currently Chromium via chromiumoxide), plus the page-side
//! helpers built on JS evaluation: element waits, live field scans with
//! geometry, bounded frame snapshots, and the [`FormDriver`] implementation
//! used by the fill executor.

pub mod chromium;

use crate::candidates::{FrameSnapshot, PageSnapshot};
use crate::executor::FormDriver;
use crate::model::RawField;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// A browser that can create page sessions.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Create a new page session (tab).
    async fn new_session(&self) -> Result<Box<dyn PageSession>>;
    /// Shut down the browser.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently active sessions.
    fn active_sessions(&self) -> usize;
}

/// A single page session for navigating and interacting with pages.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<NavigationResult>;
    /// Execute JavaScript in the page context and return the result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;
    /// Get the full page HTML.
    async fn html(&self) -> Result<String>;
    /// Get the current URL.
    async fn url(&self) -> Result<String>;
    /// Capture a PNG screenshot of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>>;
    /// Close this session.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A no-browser stub used by dry runs and tests. Every session request
/// fails; nothing that needs a live page can proceed.
pub struct NoopEngine;

#[async_trait]
impl BrowserEngine for NoopEngine {
    async fn new_session(&self) -> Result<Box<dyn PageSession>> {
        bail!("browser not available")
    }
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
    fn active_sessions(&self) -> usize {
        0
    }
}

/// Poll for an element until it exists or the wait budget runs out.
pub async fn wait_for_element(
    session: &dyn PageSession,
    selector: &str,
    timeout_ms: u64,
) -> Result<bool> {
    let script = format!(
        "document.querySelector('{}') !== null",
        sanitize_js_string(selector)
    );
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
    loop {
        if session.execute_js(&script).await?.as_bool() == Some(true) {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Click an element. Returns whether the element was found.
pub async fn click(session: &dyn PageSession, selector: &str) -> Result<bool> {
    let script = format!(
        r#"(() => {{
            const el = document.querySelector('{}');
            if (el) {{ el.click(); return true; }}
            return false;
        }})()"#,
        sanitize_js_string(selector)
    );
    Ok(session.execute_js(&script).await?.as_bool() == Some(true))
}

/// Wire shape of one scanned input, as returned by the in-page scan script.
#[derive(Debug, Deserialize)]
struct ScannedField {
    name: String,
    id: String,
    label: String,
    placeholder: String,
    input_type: String,
    locator: String,
    bbox: Option<(f32, f32, f32, f32)>,
}

const FIELD_SCAN_BODY: &str = r#"const out = [];
    root.querySelectorAll('input, select, textarea').forEach((el) => {
        const tag = el.tagName.toLowerCase();
        const type = (el.getAttribute('type') ||
            (tag === 'select' ? 'select' : tag === 'textarea' ? 'textarea' : 'text')).toLowerCase();
        if (['hidden', 'submit', 'button', 'image'].includes(type)) return;
        let label = '';
        if (el.id) {
            const l = doc.querySelector('label[for="' + CSS.escape(el.id) + '"]');
            if (l) label = l.textContent.trim();
        }
        if (!label) {
            const wrap = el.closest('label');
            if (wrap) label = wrap.textContent.trim();
        }
        let locator;
        const name = el.getAttribute('name') || '';
        if (name) {
            locator = '[name="' + name + '"]';
        } else if (el.id) {
            locator = '#' + el.id;
        } else {
            const sibs = [...el.parentElement.children].filter(c => c.tagName === el.tagName);
            locator = tag + ':nth-of-type(' + (sibs.indexOf(el) + 1) + ')';
        }
        const r = el.getBoundingClientRect();
        out.push({
            name: name,
            id: el.id || '',
            label: label,
            placeholder: el.getAttribute('placeholder') || '',
            input_type: type,
            locator: locator,
            bbox: r.width > 0 ? [r.x + ox, r.y + oy, r.width, r.height] : null,
        });
    });
    return out;"#;

/// Assemble the in-page scan script. `frame_url` retargets the scan at a
/// same-origin frame's document, with geometry offset by the frame element
/// so bboxes stay in viewport coordinates. `scope` restricts the scan to
/// the first element matching the selector.
fn field_scan_script(scope: Option<&str>, frame_url: Option<&str>) -> String {
    let doc_block = match frame_url {
        None => "let doc = document, ox = 0, oy = 0;".to_string(),
        Some(url) => format!(
            r#"let doc = null, ox = 0, oy = 0;
    for (const f of document.querySelectorAll('iframe')) {{
        try {{
            if (f.contentWindow.location.href === '{}') {{
                doc = f.contentDocument;
                const fr = f.getBoundingClientRect();
                ox = fr.x; oy = fr.y;
                break;
            }}
        }} catch (e) {{}}
    }}
    if (!doc) return [];"#,
            sanitize_js_string(url)
        ),
    };
    let root_block = match scope {
        None => "const root = doc;".to_string(),
        Some(sel) => format!(
            "const root = doc.querySelector('{}');\n    if (!root) return [];",
            sanitize_js_string(sel)
        ),
    };
    format!("(() => {{\n    {doc_block}\n    {root_block}\n    {FIELD_SCAN_BODY}\n}})()")
}

/// Scan visible inputs on the live page, with viewport geometry. The
/// geometry is what the visual fallback needs to claim OCR regions.
///
/// `scope` restricts the scan to fields inside the matching element (a form
/// candidate's selector); `frame_url` scans inside a same-origin frame
/// instead of the top document.
pub async fn scan_live_fields(
    session: &dyn PageSession,
    scope: Option<&str>,
    frame_url: Option<&str>,
) -> Result<Vec<RawField>> {
    let value = session
        .execute_js(&field_scan_script(scope, frame_url))
        .await?;
    let scanned: Vec<ScannedField> = serde_json::from_value(value)?;
    Ok(scanned
        .into_iter()
        .map(|f| RawField {
            name: f.name,
            id: f.id,
            label: f.label,
            placeholder: f.placeholder,
            input_type: f.input_type,
            locator: f.locator,
            bbox: f.bbox,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct ScannedFrame {
    url: String,
    html: String,
    depth: u8,
}

/// Collect same-origin frame documents up to `max_depth`. Cross-origin
/// frames come back with their src URL and empty HTML; the candidate
/// generator recognizes known entry platforms from the URL alone.
pub async fn frame_snapshots(
    session: &dyn PageSession,
    max_depth: u8,
) -> Result<Vec<FrameSnapshot>> {
    let script = format!(
        r#"((maxDepth) => {{
            const frames = [];
            const seen = new Set();
            const walk = (doc, depth) => {{
                if (depth > maxDepth) return;
                for (const f of doc.querySelectorAll('iframe')) {{
                    if (seen.has(f)) continue;
                    seen.add(f);
                    let url = f.src || '';
                    let html = '';
                    let inner = null;
                    try {{
                        inner = f.contentDocument;
                        if (inner) {{
                            html = inner.documentElement.outerHTML;
                            url = f.contentWindow.location.href;
                        }}
                    }} catch (e) {{}}
                    frames.push({{ url: url, html: html, depth: depth }});
                    if (inner) walk(inner, depth + 1);
                }}
            }};
            walk(document, 1);
            return frames;
        }})({max_depth})"#
    );
    let value = session.execute_js(&script).await?;
    let scanned: Vec<ScannedFrame> = serde_json::from_value(value)?;
    Ok(scanned
        .into_iter()
        .map(|f| FrameSnapshot {
            url: f.url,
            html: f.html,
            depth: f.depth,
        })
        .collect())
}

/// Full snapshot of the current page: top document plus bounded frames.
pub async fn page_snapshot(session: &dyn PageSession, max_depth: u8) -> Result<PageSnapshot> {
    let url = session.url().await?;
    let html = session.html().await?;
    let frames = frame_snapshots(session, max_depth).await?;
    Ok(PageSnapshot { url, html, frames })
}

/// [`FormDriver`] over a live page session. When `frame_url` is set, fills
/// resolve against the matching same-origin iframe document instead of the
/// top document. When a scope selector is set, field locators resolve only
/// inside that element, so fills never touch another form's inputs.
pub struct SessionFormDriver<'a> {
    session: &'a dyn PageSession,
    frame_url: Option<String>,
    scope: Option<String>,
}

impl<'a> SessionFormDriver<'a> {
    pub fn new(session: &'a dyn PageSession) -> Self {
        Self {
            session,
            frame_url: None,
            scope: None,
        }
    }

    pub fn in_frame(session: &'a dyn PageSession, frame_url: &str) -> Self {
        Self {
            session,
            frame_url: Some(frame_url.to_string()),
            scope: None,
        }
    }

    /// Restrict fills to descendants of the first element matching
    /// `selector` (the winning form candidate's locator).
    pub fn with_scope(mut self, selector: &str) -> Self {
        self.scope = Some(selector.to_string());
        self
    }

    fn doc_expr(&self) -> String {
        match &self.frame_url {
            None => "document".to_string(),
            Some(url) => format!(
                r#"(() => {{
                    for (const f of document.querySelectorAll('iframe')) {{
                        try {{
                            if (f.contentWindow.location.href === '{}') return f.contentDocument;
                        }} catch (e) {{}}
                    }}
                    return null;
                }})()"#,
                sanitize_js_string(url)
            ),
        }
    }

    fn root_expr(&self) -> String {
        match &self.scope {
            None => "doc".to_string(),
            Some(sel) => format!("doc.querySelector('{}')", sanitize_js_string(sel)),
        }
    }

    async fn run(&self, script: String) -> Result<()> {
        match self.session.execute_js(&script).await?.as_bool() {
            Some(true) => Ok(()),
            _ => bail!("element not found or not fillable"),
        }
    }
}

#[async_trait]
impl FormDriver for SessionFormDriver<'_> {
    async fn set_text(&mut self, locator: &str, value: &str) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const doc = {};
                if (!doc) return false;
                const root = {};
                if (!root) return false;
                const el = root.querySelector('{}');
                if (!el) return false;
                el.value = '{}';
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            self.doc_expr(),
            self.root_expr(),
            sanitize_js_string(locator),
            sanitize_js_string(value)
        );
        self.run(script).await
    }

    async fn set_checked(&mut self, locator: &str, checked: bool) -> Result<()> {
        let script = format!(
            r#"(() => {{
                const doc = {};
                if (!doc) return false;
                const root = {};
                if (!root) return false;
                const el = root.querySelector('{}');
                if (!el) return false;
                el.checked = {};
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            self.doc_expr(),
            self.root_expr(),
            sanitize_js_string(locator),
            checked
        );
        self.run(script).await
    }
}

/// Sanitize a string for safe injection into a JavaScript string literal.
///
/// Escapes everything that could break out of a JS string context:
/// backslashes, quotes, backticks, newlines, plus angle brackets so a
/// reflected value can never form a script tag. Null bytes are stripped.
pub fn sanitize_js_string(s: &str) -> String {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_js_string() {
        assert_eq!(sanitize_js_string("plain"), "plain");
        assert_eq!(sanitize_js_string("a'b"), "a\\'b");
        assert_eq!(sanitize_js_string("a\\b"), "a\\\\b");
        assert_eq!(
            sanitize_js_string("</script>"),
            "\\x3c/script\\x3e"
        );
        assert_eq!(sanitize_js_string("a\0b"), "ab");
    }

    #[tokio::test]
    async fn test_noop_engine_refuses_sessions() {
        let engine = NoopEngine;
        assert!(engine.new_session().await.is_err());
        assert_eq!(engine.active_sessions(), 0);
    }

    /// Fake session that answers scripted JS results in order and records
    /// the scripts it was asked to run.
    struct ScriptedSession {
        results: std::sync::Mutex<Vec<serde_json::Value>>,
        scripts: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedSession {
        fn with_results(results: Vec<serde_json::Value>) -> Self {
            Self {
                results: std::sync::Mutex::new(results),
                scripts: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn last_script(&self) -> String {
            self.scripts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl PageSession for ScriptedSession {
        async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
            Ok(NavigationResult {
                final_url: url.to_string(),
                load_time_ms: 1,
            })
        }
        async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
            self.scripts.lock().unwrap().push(script.to_string());
            let mut results = self.results.lock().unwrap();
            if results.is_empty() {
                bail!("no scripted result")
            }
            Ok(results.remove(0))
        }
        async fn html(&self) -> Result<String> {
            Ok("<html></html>".into())
        }
        async fn url(&self) -> Result<String> {
            Ok("https://example.com/".into())
        }
        async fn screenshot(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scan_live_fields_parses_script_output() {
        let session = ScriptedSession::with_results(vec![serde_json::json!([
            {
                "name": "email",
                "id": "",
                "label": "Email address",
                "placeholder": "",
                "input_type": "email",
                "locator": "[name=\"email\"]",
                "bbox": [10.0, 20.0, 200.0, 30.0]
            }
        ])]);
        let fields = scan_live_fields(&session, None, None).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "email");
        assert_eq!(fields[0].bbox, Some((10.0, 20.0, 200.0, 30.0)));
        // An unscoped top-document scan never touches frame machinery.
        assert!(!session.last_script().contains("iframe"));
    }

    #[tokio::test]
    async fn test_scan_live_fields_scoped_to_selector() {
        let session = ScriptedSession::with_results(vec![serde_json::json!([])]);
        scan_live_fields(&session, Some("form:nth-of-type(2)"), None)
            .await
            .unwrap();
        let script = session.last_script();
        assert!(script.contains("doc.querySelector('form:nth-of-type(2)')"));
        assert!(script.contains("if (!root) return [];"));
    }

    #[tokio::test]
    async fn test_scan_live_fields_targets_frame_document() {
        let session = ScriptedSession::with_results(vec![serde_json::json!([])]);
        scan_live_fields(&session, None, Some("https://a.com/widget"))
            .await
            .unwrap();
        let script = session.last_script();
        assert!(script.contains("contentWindow.location.href === 'https://a.com/widget'"));
        // Frame geometry is folded into the reported bboxes.
        assert!(script.contains("r.x + ox"));
    }

    #[tokio::test]
    async fn test_form_driver_reports_missing_element() {
        let session = ScriptedSession::with_results(vec![serde_json::Value::Bool(false)]);
        let mut driver = SessionFormDriver::new(&session);
        assert!(driver.set_text("#missing", "x").await.is_err());
    }

    #[tokio::test]
    async fn test_scoped_form_driver_resolves_inside_form() {
        let session = ScriptedSession::with_results(vec![serde_json::Value::Bool(true)]);
        let mut driver =
            SessionFormDriver::new(&session).with_scope("form:nth-of-type(2)");
        driver.set_text("[name=\"email\"]", "a@b.com").await.unwrap();
        let script = session.last_script();
        assert!(script.contains("doc.querySelector('form:nth-of-type(2)')"));
        assert!(script.contains("root.querySelector("));
    }

    #[tokio::test]
    async fn test_page_snapshot_collects_frames() {
        let session = ScriptedSession::with_results(vec![serde_json::json!([
            { "url": "https://gleam.io/abc", "html": "", "depth": 1 }
        ])]);
        let snap = page_snapshot(&session, 3).await.unwrap();
        assert_eq!(snap.url, "https://example.com/");
        assert_eq!(snap.frames.len(), 1);
        assert_eq!(snap.frames[0].depth, 1);
    }
}
