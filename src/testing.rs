//! In-memory browser used by unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::browser::{Browser, PageMarker, Query};
use crate::error::{BrowserError, BrowserResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockElement(pub usize);

#[derive(Default)]
struct State {
    calls: Vec<String>,
    elements: Vec<Query>,
    failures: HashMap<&'static str, BrowserError>,
    title: String,
    url: String,
    body: String,
    scroll_y: i64,
    loads: u32,
    stuck_history: bool,
}

pub struct MockBrowser {
    state: Mutex<State>,
}

impl MockBrowser {
    pub fn new() -> Self {
        let state = State {
            title: "Example Domain".into(),
            url: "about:blank".into(),
            elements: vec![Query::Css("body".into())],
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with_element(self, query: Query) -> Self {
        self.state.lock().unwrap().elements.push(query);
        self
    }

    pub fn with_body(self, body: &str) -> Self {
        self.state.lock().unwrap().body = body.to_string();
        self
    }

    /// `history_back` succeeds but the page never changes.
    pub fn with_stuck_history(self) -> Self {
        self.state.lock().unwrap().stuck_history = true;
        self
    }

    /// Every later call to `method` fails with `err`.
    pub fn failing(self, method: &'static str, err: BrowserError) -> Self {
        self.state.lock().unwrap().failures.insert(method, err);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn scroll_y(&self) -> i64 {
        self.state.lock().unwrap().scroll_y
    }

    fn record(&self, method: &'static str, detail: String) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.failures.get(method) {
            return Err(err.clone());
        }
        if detail.is_empty() {
            state.calls.push(method.to_string());
        } else {
            state.calls.push(format!("{method} {detail}"));
        }
        Ok(())
    }
}

impl Browser for MockBrowser {
    type Element<'a> = MockElement;

    fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.record("navigate", url.to_string())?;
        let mut state = self.state.lock().unwrap();
        state.url = url.to_string();
        state.loads += 1;
        Ok(())
    }

    fn find(&self, query: &Query) -> BrowserResult<Option<MockElement>> {
        self.record("find", format!("{query:?}"))?;
        let state = self.state.lock().unwrap();
        Ok(state
            .elements
            .iter()
            .position(|q| q == query)
            .map(MockElement))
    }

    fn click(&self, element: &MockElement) -> BrowserResult<()> {
        self.record("click", format!("#{}", element.0))
    }

    fn clear_and_type(&self, element: &MockElement, text: &str) -> BrowserResult<()> {
        self.record("clear_and_type", format!("#{} {text}", element.0))
    }

    fn visible_text(&self, _element: &MockElement) -> BrowserResult<String> {
        self.record("visible_text", String::new())?;
        Ok(self.state.lock().unwrap().body.clone())
    }

    fn title(&self) -> BrowserResult<String> {
        self.record("title", String::new())?;
        Ok(self.state.lock().unwrap().title.clone())
    }

    fn url(&self) -> BrowserResult<String> {
        self.record("url", String::new())?;
        Ok(self.state.lock().unwrap().url.clone())
    }

    fn save_screenshot(&self, path: &Path) -> BrowserResult<()> {
        self.record("save_screenshot", path.display().to_string())
    }

    fn scroll_by(&self, dy: i64) -> BrowserResult<()> {
        self.record("scroll_by", dy.to_string())?;
        self.state.lock().unwrap().scroll_y += dy;
        Ok(())
    }

    fn scroll_to(&self, y: i64) -> BrowserResult<()> {
        self.record("scroll_to", y.to_string())?;
        self.state.lock().unwrap().scroll_y = y;
        Ok(())
    }

    fn scroll_height(&self) -> BrowserResult<i64> {
        self.record("scroll_height", String::new())?;
        Ok(4000)
    }

    fn history_back(&self) -> BrowserResult<()> {
        self.record("history_back", String::new())?;
        let mut state = self.state.lock().unwrap();
        if !state.stuck_history {
            state.loads += 1;
        }
        Ok(())
    }

    fn reload(&self) -> BrowserResult<()> {
        self.record("reload", String::new())?;
        self.state.lock().unwrap().loads += 1;
        Ok(())
    }

    fn page_marker(&self) -> BrowserResult<PageMarker> {
        self.record("page_marker", String::new())?;
        let state = self.state.lock().unwrap();
        Ok(PageMarker(format!("{}|{}", state.url, state.loads)))
    }

    fn wait_for_navigation(
        &self,
        from: &PageMarker,
        required: bool,
        timeout: Duration,
    ) -> BrowserResult<()> {
        self.record("wait_for_navigation", format!("required={required}"))?;
        let state = self.state.lock().unwrap();
        let now = PageMarker(format!("{}|{}", state.url, state.loads));
        if required && &now == from {
            return Err(BrowserError::Timeout(format!(
                "page did not change within {timeout:?}"
            )));
        }
        Ok(())
    }
}
