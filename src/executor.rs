//! One handler per browser tool. Handlers never fail outward: every browser
//! error is folded into the returned [`ActionResult`].

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::browser::Browser;
use crate::dom;
use crate::error::{BrowserError, BrowserResult};
use crate::locator;
use crate::registry::{ToolKind, ToolSpec};
use crate::types::{ActionResult, Outcome, SCROLL_STEP_PX};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory unnamed and relative screenshot paths are written under.
    pub screenshot_dir: PathBuf,
    /// Upper bound on waiting for the document after click, back and refresh.
    pub settle_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("."),
            settle_timeout: Duration::from_secs(10),
        }
    }
}

/// Hands out `screenshot_<epoch>.png` names. A repeat within the same second
/// gets a `_<n>` suffix so names stay unique for the life of the namer.
#[derive(Debug, Default)]
pub struct ScreenshotNamer {
    last: Mutex<Option<(u64, u32)>>,
}

impl ScreenshotNamer {
    pub fn next_name(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.name_for(secs)
    }

    pub fn name_for(&self, secs: u64) -> String {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match last.as_mut() {
            Some((second, count)) if *second == secs => {
                *count += 1;
                format!("screenshot_{secs}_{count}.png")
            }
            _ => {
                *last = Some((secs, 0));
                format!("screenshot_{secs}.png")
            }
        }
    }
}

#[derive(Deserialize)]
struct NavigateParams {
    url: String,
}

#[derive(Deserialize)]
struct TargetParams {
    strategy: String,
    value: String,
}

#[derive(Deserialize)]
struct InputParams {
    #[serde(flatten)]
    target: TargetParams,
    text: String,
}

#[derive(Deserialize)]
struct ScreenshotParams {
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Deserialize)]
struct ScrollParams {
    #[serde(default = "default_direction")]
    direction: String,
}

fn default_direction() -> String {
    "down".to_string()
}

enum Step {
    Done(String),
    Missing(String),
}

enum StepError {
    Params(String),
    Browser { context: String, source: BrowserError },
}

trait StepContext<T> {
    fn context(self, context: impl FnOnce() -> String) -> Result<T, StepError>;
}

impl<T> StepContext<T> for BrowserResult<T> {
    fn context(self, context: impl FnOnce() -> String) -> Result<T, StepError> {
        self.map_err(|source| StepError::Browser {
            context: context(),
            source,
        })
    }
}

/// Prefix `https://` when the URL carries no http(s) scheme.
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

fn parse_params<T: DeserializeOwned>(params: &Map<String, Value>) -> Result<T, StepError> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| StepError::Params(format!("invalid parameters: {e}")))
}

/// Runs single tools against one browser.
pub struct Executor<'a, B: Browser> {
    browser: &'a B,
    config: &'a ExecutorConfig,
    screenshots: &'a ScreenshotNamer,
}

impl<'a, B: Browser> Executor<'a, B> {
    pub fn new(browser: &'a B, config: &'a ExecutorConfig, screenshots: &'a ScreenshotNamer) -> Self {
        Self {
            browser,
            config,
            screenshots,
        }
    }

    pub fn execute(&self, spec: &ToolSpec, params: &Map<String, Value>) -> ActionResult {
        let step = match spec.kind {
            ToolKind::Navigate => parse_params(params).and_then(|p| self.navigate(p)),
            ToolKind::FindElement => parse_params(params).and_then(|p| self.find(p)),
            ToolKind::Click => parse_params(params).and_then(|p| self.click(p)),
            ToolKind::InputText => parse_params(params).and_then(|p| self.input_text(p)),
            ToolKind::PageInfo => self.page_info(),
            ToolKind::Screenshot => parse_params(params).and_then(|p| self.screenshot(p)),
            ToolKind::Scroll => parse_params(params).and_then(|p| self.scroll(p)),
            ToolKind::Back => self.go_back(),
            ToolKind::Refresh => self.refresh(),
        };

        let tool = spec.name;
        match step {
            Ok(Step::Done(message)) => ActionResult::success(tool, message),
            Ok(Step::Missing(message)) => ActionResult::new(tool, Outcome::NotFound, message),
            Err(StepError::Params(message)) => {
                ActionResult::new(tool, Outcome::ExecutionError, message)
            }
            Err(StepError::Browser { context, source }) => {
                warn!(tool, error = %source, "{context}");
                let outcome = if source.is_fatal() {
                    Outcome::SessionFatal
                } else {
                    Outcome::ExecutionError
                };
                ActionResult::new(tool, outcome, format!("{context}: {source}"))
            }
        }
    }

    fn navigate(&self, params: NavigateParams) -> Result<Step, StepError> {
        let url = normalize_url(&params.url);
        debug!(%url, "navigating");
        self.browser
            .navigate(&url)
            .context(|| format!("Error navigating to {url}"))?;
        Ok(Step::Done(format!("Successfully navigated to {url}")))
    }

    fn find(&self, params: TargetParams) -> Result<Step, StepError> {
        let TargetParams { strategy, value } = params;
        let found = locator::locate(self.browser, &strategy, &value)
            .context(|| "Error finding element".to_string())?;
        Ok(match found {
            Some(_) => Step::Done(format!("Element found with {strategy}='{value}'")),
            None => Step::Missing(not_found(&strategy, &value)),
        })
    }

    fn click(&self, params: TargetParams) -> Result<Step, StepError> {
        let TargetParams { strategy, value } = params;
        let Some(element) = locator::locate(self.browser, &strategy, &value)
            .context(|| "Error clicking element".to_string())?
        else {
            return Ok(Step::Missing(not_found(&strategy, &value)));
        };
        let before = self
            .browser
            .page_marker()
            .context(|| "Error clicking element".to_string())?;
        self.browser
            .click(&element)
            .context(|| "Error clicking element".to_string())?;
        // Most clicks never navigate; only a navigation that started is awaited.
        self.browser
            .wait_for_navigation(&before, false, self.config.settle_timeout)
            .context(|| "Page did not settle after click".to_string())?;
        Ok(Step::Done(format!(
            "Successfully clicked element with {strategy}='{value}'"
        )))
    }

    fn input_text(&self, params: InputParams) -> Result<Step, StepError> {
        let InputParams {
            target: TargetParams { strategy, value },
            text,
        } = params;
        let Some(element) = locator::locate(self.browser, &strategy, &value)
            .context(|| "Error inputting text".to_string())?
        else {
            return Ok(Step::Missing(not_found(&strategy, &value)));
        };
        self.browser
            .clear_and_type(&element, &text)
            .context(|| "Error inputting text".to_string())?;
        Ok(Step::Done(format!(
            "Successfully input text into {strategy}='{value}'"
        )))
    }

    fn page_info(&self) -> Result<Step, StepError> {
        let snapshot =
            dom::capture_snapshot(self.browser).context(|| "Error getting page info".to_string())?;
        Ok(Step::Done(snapshot.to_string()))
    }

    fn screenshot(&self, params: ScreenshotParams) -> Result<Step, StepError> {
        let filename = match params.filename.as_deref().map(str::trim) {
            None | Some("") => self.screenshots.next_name(),
            Some(name) => bare_file_name(name).ok_or_else(|| {
                StepError::Params(format!("invalid screenshot filename '{name}'"))
            })?,
        };
        let path = self.config.screenshot_dir.join(filename);
        self.browser
            .save_screenshot(&path)
            .context(|| "Error taking screenshot".to_string())?;
        Ok(Step::Done(format!("Screenshot saved as {}", path.display())))
    }

    fn scroll(&self, params: ScrollParams) -> Result<Step, StepError> {
        let direction = params.direction;
        let scrolled = match direction.as_str() {
            "down" => self.browser.scroll_by(SCROLL_STEP_PX),
            "up" => self.browser.scroll_by(-SCROLL_STEP_PX),
            "top" => self.browser.scroll_to(0),
            "bottom" => self
                .browser
                .scroll_height()
                .and_then(|height| self.browser.scroll_to(height)),
            // Unknown directions are a no-op that still reports success.
            _ => {
                return Ok(Step::Done(format!(
                    "Unknown scroll direction '{direction}'; page left unchanged"
                )));
            }
        };
        scrolled.context(|| "Error scrolling".to_string())?;
        Ok(Step::Done(format!("Scrolled {direction}")))
    }

    fn go_back(&self) -> Result<Step, StepError> {
        let before = self
            .browser
            .page_marker()
            .context(|| "Error going back".to_string())?;
        self.browser
            .history_back()
            .context(|| "Error going back".to_string())?;
        self.browser
            .wait_for_navigation(&before, true, self.config.settle_timeout)
            .context(|| "Page did not settle after going back".to_string())?;
        Ok(Step::Done("Navigated back".to_string()))
    }

    fn refresh(&self) -> Result<Step, StepError> {
        let before = self
            .browser
            .page_marker()
            .context(|| "Error refreshing".to_string())?;
        self.browser
            .reload()
            .context(|| "Error refreshing".to_string())?;
        self.browser
            .wait_for_navigation(&before, true, self.config.settle_timeout)
            .context(|| "Page did not settle after refresh".to_string())?;
        Ok(Step::Done("Page refreshed".to_string()))
    }
}

/// The last component of a model-supplied name, so a screenshot can never be
/// written outside the screenshot directory.
fn bare_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

fn not_found(strategy: &str, value: &str) -> String {
    format!("Element not found with {strategy}='{value}'")
}
