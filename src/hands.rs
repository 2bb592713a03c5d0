use anyhow::{Context, Result, anyhow};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser as Chrome, Element, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::browser::{Browser, PageMarker, Query};
use crate::error::{BrowserError, BrowserResult};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long an unchanged page is given to start navigating after a click.
const NAVIGATION_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_data_dir: Option<PathBuf>,
    /// DevTools websocket of an already running Chrome to attach to first.
    pub attach_ws_url: Option<String>,
    /// Default wait bound for navigation and element lookups.
    pub navigation_timeout: Duration,
    /// How long the DevTools connection may sit without traffic before
    /// headless_chrome drops it. The REPL can idle between commands.
    pub idle_timeout: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            user_data_dir: None,
            attach_ws_url: None,
            navigation_timeout: Duration::from_secs(20),
            idle_timeout: Duration::from_secs(3600),
        }
    }
}

/// Ask a Chrome started with `--remote-debugging-port` for its websocket URL.
pub async fn debugger_ws_url(endpoint: &str) -> Result<String> {
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        return Ok(endpoint.to_string());
    }
    let version: Value = reqwest::get(format!("{}/json/version", endpoint.trim_end_matches('/')))
        .await
        .with_context(|| format!("no DevTools endpoint at {endpoint}"))?
        .json()
        .await?;
    version["webSocketDebuggerUrl"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("DevTools endpoint at {endpoint} did not report a websocket URL"))
}

/// The one browser session the agent drives.
///
/// Dropping the inner headless_chrome handle kills a Chrome process it
/// launched. An attached Chrome has no owned process and keeps running.
pub struct ChromeSession {
    _browser: Chrome,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn launch(config: &LaunchConfig) -> Result<Self> {
        if let Some(ws_url) = &config.attach_ws_url {
            info!(%ws_url, "attempting to attach to existing Chrome");
            match Chrome::connect_with_timeout(ws_url.clone(), config.idle_timeout) {
                Ok(browser) => {
                    let tab = {
                        let tabs = browser.get_tabs();
                        let tabs = tabs.lock().map_err(|_| anyhow!("tab list lock poisoned"))?;
                        tabs.first().cloned()
                    };
                    let tab = match tab {
                        Some(tab) => tab,
                        None => browser.new_tab()?,
                    };
                    tab.set_default_timeout(config.navigation_timeout);
                    info!("attached to existing Chrome");
                    return Ok(Self {
                        _browser: browser,
                        tab,
                    });
                }
                Err(e) => warn!("could not attach ({e:#}), launching a new Chrome"),
            }
        }

        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            user_data_dir: config.user_data_dir.clone(),
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-infobars"),
            ],
            idle_browser_timeout: config.idle_timeout,
            ..Default::default()
        };

        info!(headless = config.headless, "starting Chrome");
        let browser = Chrome::new(options).map_err(|e| anyhow!("Browser launch failed: {e}"))?;
        let tab = browser.new_tab().context("could not open a tab")?;
        tab.set_default_timeout(config.navigation_timeout);
        tab.navigate_to("about:blank")?;
        info!("Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    fn eval(&self, script: &str) -> BrowserResult<Option<Value>> {
        let result = self.tab.evaluate(script, false).map_err(classify)?;
        Ok(result.value)
    }
}

/// Sort a headless_chrome failure into the collaborator's error kinds.
fn classify(err: anyhow::Error) -> BrowserError {
    let message = format!("{err:#}");
    let lower = message.to_lowercase();
    if ["connection is closed", "connection closed", "channel closed", "browser closed"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        BrowserError::SessionLost(message)
    } else if ["timed out", "timeout", "never came"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        BrowserError::Timeout(message)
    } else {
        BrowserError::Protocol(message)
    }
}

/// Script answering `found`, `missing` or `error:<message>` for `query`.
/// A selector the engine rejects throws, and that must not read as absence.
fn presence_script(query: &Query) -> String {
    let test = match query {
        Query::Css(css) => {
            let css = Value::String(css.clone());
            format!("document.querySelector({css}) !== null")
        }
        Query::XPath(xpath) => {
            let xpath = Value::String(xpath.clone());
            format!(
                "document.evaluate({xpath}, document, null, \
                 XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue !== null"
            )
        }
    };
    format!(
        "(() => {{ try {{ return ({test}) ? 'found' : 'missing'; }} \
         catch (e) {{ return 'error:' + e.message; }} }})()"
    )
}

fn read_presence(answer: Option<Value>) -> BrowserResult<bool> {
    match answer.as_ref().and_then(Value::as_str) {
        Some("found") => Ok(true),
        Some("missing") => Ok(false),
        Some(reply) if reply.starts_with("error:") => Err(BrowserError::Protocol(format!(
            "invalid selector: {}",
            &reply["error:".len()..]
        ))),
        _ => Err(BrowserError::Protocol(format!(
            "unexpected presence answer: {answer:?}"
        ))),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Settle {
    Done,
    Pending,
    TimedOut,
}

/// One polling decision while waiting for a navigation to land.
fn settle_step(
    before: &PageMarker,
    now: Option<&PageMarker>,
    ready: bool,
    required: bool,
    elapsed: Duration,
    timeout: Duration,
) -> Settle {
    let changed = now.is_some_and(|now| now != before);
    if changed && ready {
        return Settle::Done;
    }
    if !changed && !required && ready && elapsed >= NAVIGATION_GRACE {
        return Settle::Done;
    }
    if elapsed >= timeout {
        return Settle::TimedOut;
    }
    Settle::Pending
}

const MARKER_SCRIPT: &str = "location.href + '|' + performance.timeOrigin";

impl Browser for ChromeSession {
    type Element<'a> = Element<'a>;

    fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.tab.navigate_to(url).map_err(classify)?;
        self.tab.wait_until_navigated().map_err(classify)?;
        Ok(())
    }

    fn find(&self, query: &Query) -> BrowserResult<Option<Element<'_>>> {
        // Ask first so absence is not confused with a protocol failure.
        if !read_presence(self.eval(&presence_script(query))?)? {
            debug!(?query, "no match");
            return Ok(None);
        }
        let element = match query {
            Query::Css(css) => self.tab.find_element(css),
            Query::XPath(xpath) => self.tab.find_element_by_xpath(xpath),
        }
        .map_err(classify)?;
        Ok(Some(element))
    }

    fn click(&self, element: &Element<'_>) -> BrowserResult<()> {
        element.click().map_err(classify)?;
        Ok(())
    }

    fn clear_and_type(&self, element: &Element<'_>, text: &str) -> BrowserResult<()> {
        element
            .call_js_fn(
                "function () { if ('value' in this) { this.value = ''; } }",
                vec![],
                false,
            )
            .map_err(classify)?;
        element.type_into(text).map_err(classify)?;
        Ok(())
    }

    fn visible_text(&self, element: &Element<'_>) -> BrowserResult<String> {
        element.get_inner_text().map_err(classify)
    }

    fn title(&self) -> BrowserResult<String> {
        self.tab.get_title().map_err(classify)
    }

    fn url(&self) -> BrowserResult<String> {
        Ok(self.tab.get_url())
    }

    fn save_screenshot(&self, path: &Path) -> BrowserResult<()> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(classify)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BrowserError::Protocol(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(path, png)
            .map_err(|e| BrowserError::Protocol(format!("{}: {e}", path.display())))
    }

    fn scroll_by(&self, dy: i64) -> BrowserResult<()> {
        self.eval(&format!("window.scrollBy(0, {dy})"))?;
        Ok(())
    }

    fn scroll_to(&self, y: i64) -> BrowserResult<()> {
        self.eval(&format!("window.scrollTo(0, {y})"))?;
        Ok(())
    }

    fn scroll_height(&self) -> BrowserResult<i64> {
        Ok(self
            .eval("document.body.scrollHeight")?
            .and_then(|v| v.as_i64())
            .unwrap_or_default())
    }

    fn history_back(&self) -> BrowserResult<()> {
        self.eval("window.history.back()")?;
        Ok(())
    }

    fn reload(&self) -> BrowserResult<()> {
        self.tab
            .reload(false, None)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(classify)?;
        Ok(())
    }

    fn page_marker(&self) -> BrowserResult<PageMarker> {
        let marker = self.eval(MARKER_SCRIPT)?;
        match marker.as_ref().and_then(Value::as_str) {
            Some(marker) => Ok(PageMarker(marker.to_string())),
            None => Err(BrowserError::Protocol(format!(
                "unexpected page marker: {marker:?}"
            ))),
        }
    }

    fn wait_for_navigation(
        &self,
        from: &PageMarker,
        required: bool,
        timeout: Duration,
    ) -> BrowserResult<()> {
        let started = Instant::now();
        loop {
            std::thread::sleep(READY_POLL_INTERVAL);
            // Mid-navigation the old context is torn down and evaluation can
            // fail; that only means the new document is not there yet.
            let (now, ready) = match (self.page_marker(), self.eval("document.readyState")) {
                (Ok(now), Ok(state)) => {
                    let ready = state.as_ref().and_then(Value::as_str) == Some("complete");
                    (Some(now), ready)
                }
                (Err(e), _) | (_, Err(e)) if e.is_fatal() => return Err(e),
                _ => (None, false),
            };
            match settle_step(from, now.as_ref(), ready, required, started.elapsed(), timeout) {
                Settle::Done => return Ok(()),
                Settle::Pending => {}
                Settle::TimedOut => {
                    return Err(BrowserError::Timeout(format!(
                        "page did not finish loading within {timeout:?}"
                    )));
                }
            }
        }
    }
}
