use std::path::Path;
use std::time::Duration;

use crate::error::BrowserResult;

/// Identity of the loaded document: URL plus navigation start time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMarker(pub String);

/// A native selector the browser engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    Css(String),
    XPath(String),
}

/// Synchronous browser primitives the executors are built on.
///
/// Element handles borrow the browser, so one can never outlive the action
/// that resolved it. The page may have re-rendered by the next action.
pub trait Browser: Send + Sync {
    type Element<'a>
    where
        Self: 'a;

    /// Navigate and block until the browser reports the load complete.
    fn navigate(&self, url: &str) -> BrowserResult<()>;

    /// First match in document order, or `None` when nothing matches.
    fn find(&self, query: &Query) -> BrowserResult<Option<Self::Element<'_>>>;

    fn click(&self, element: &Self::Element<'_>) -> BrowserResult<()>;

    fn clear_and_type(&self, element: &Self::Element<'_>, text: &str) -> BrowserResult<()>;

    fn visible_text(&self, element: &Self::Element<'_>) -> BrowserResult<String>;

    fn title(&self) -> BrowserResult<String>;

    fn url(&self) -> BrowserResult<String>;

    fn save_screenshot(&self, path: &Path) -> BrowserResult<()>;

    fn scroll_by(&self, dy: i64) -> BrowserResult<()>;

    fn scroll_to(&self, y: i64) -> BrowserResult<()>;

    fn scroll_height(&self) -> BrowserResult<i64>;

    fn history_back(&self) -> BrowserResult<()>;

    fn reload(&self) -> BrowserResult<()>;

    fn page_marker(&self) -> BrowserResult<PageMarker>;

    /// Block until the page has moved on from `from` and the new document is
    /// loaded. When `required` is false an unchanged page is accepted after a
    /// short grace period (a click that never navigates). Fails with
    /// `Timeout` after `timeout`.
    fn wait_for_navigation(
        &self,
        from: &PageMarker,
        required: bool,
        timeout: Duration,
    ) -> BrowserResult<()>;
}
