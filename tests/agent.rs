use std::future::Future;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use webpilot::{
    Agent, AgentConfig, AgentError, Browser, BrowserError, ExecutorConfig, Model, ModelError,
    Outcome, PageMarker, PlanError, Query,
};

/// A single static page with a search box and a button.
struct FakePage {
    log: Mutex<Vec<String>>,
}

impl FakePage {
    fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl Browser for FakePage {
    type Element<'a> = &'static str;

    fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.push(format!("navigate {url}"));
        Ok(())
    }

    fn find(&self, query: &Query) -> Result<Option<&'static str>, BrowserError> {
        Ok(match query {
            Query::Css(css) if css == "body" => Some("body"),
            Query::XPath(xpath) if xpath == "//*[@name=\"q\"]" => Some("search box"),
            Query::Css(css) if css == "button[type=submit]" => Some("search button"),
            Query::Css(css) if css == "div >> broken" => {
                return Err(BrowserError::Protocol("invalid selector".into()));
            }
            _ => None,
        })
    }

    fn click(&self, element: &&'static str) -> Result<(), BrowserError> {
        self.push(format!("click {element}"));
        Ok(())
    }

    fn clear_and_type(&self, element: &&'static str, text: &str) -> Result<(), BrowserError> {
        self.push(format!("type {element} {text}"));
        Ok(())
    }

    fn visible_text(&self, _element: &&'static str) -> Result<String, BrowserError> {
        Ok("Search the web".into())
    }

    fn title(&self) -> Result<String, BrowserError> {
        Ok("Search".into())
    }

    fn url(&self) -> Result<String, BrowserError> {
        Ok("https://search.example/".into())
    }

    fn save_screenshot(&self, path: &Path) -> Result<(), BrowserError> {
        self.push(format!("screenshot {}", path.display()));
        Ok(())
    }

    fn scroll_by(&self, dy: i64) -> Result<(), BrowserError> {
        self.push(format!("scroll_by {dy}"));
        Ok(())
    }

    fn scroll_to(&self, y: i64) -> Result<(), BrowserError> {
        self.push(format!("scroll_to {y}"));
        Ok(())
    }

    fn scroll_height(&self) -> Result<i64, BrowserError> {
        Ok(1200)
    }

    fn history_back(&self) -> Result<(), BrowserError> {
        self.push("back".into());
        Ok(())
    }

    fn reload(&self) -> Result<(), BrowserError> {
        self.push("reload".into());
        Ok(())
    }

    fn page_marker(&self) -> Result<PageMarker, BrowserError> {
        Ok(PageMarker(format!("https://search.example/|{}", self.log().len())))
    }

    fn wait_for_navigation(
        &self,
        _from: &PageMarker,
        _required: bool,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        Ok(())
    }
}

struct Reply(&'static str);

impl Model for Reply {
    fn complete(&self, _prompt: &str) -> impl Future<Output = Result<String, ModelError>> + Send {
        let reply = self.0.to_string();
        async move { Ok(reply) }
    }
}

fn agent(reply: &'static str) -> Agent<FakePage, Reply> {
    let config = AgentConfig {
        executor: ExecutorConfig {
            screenshot_dir: "shots".into(),
            ..Default::default()
        },
        request_timeout: Duration::from_secs(5),
    };
    Agent::new(FakePage::new(), Reply(reply), config)
}

#[tokio::test]
async fn search_flow_produces_one_result_per_action() {
    let mut agent = agent(
        r#"Sure, here is the plan:
```json
{"actions": [
  {"tool": "navigate_to", "parameters": {"url": "search.example"}, "reasoning": "open"},
  {"tool": "input_text", "parameters": {"strategy": "name", "value": "q", "text": "rust"}, "reasoning": "query"},
  {"tool": "click_element", "parameters": {"strategy": "css", "value": "button[type=submit]"}, "reasoning": "submit"},
  {"tool": "click_element", "parameters": {"strategy": "css", "value": "div >> broken"}, "reasoning": "bad selector"},
  {"tool": "hover", "parameters": {}, "reasoning": "not a tool"},
  {"tool": "scroll", "parameters": {"direction": "bottom"}, "reasoning": "see more"}
]}
```"#,
    );

    let trace = agent.process_command("search for rust").await.unwrap();
    let outcomes: Vec<_> = trace.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            Outcome::Success,
            Outcome::Success,
            Outcome::Success,
            Outcome::ExecutionError,
            Outcome::UnknownTool,
            Outcome::Success,
        ]
    );
    assert_eq!(
        agent.browser().log(),
        vec![
            "navigate https://search.example",
            "type search box rust",
            "click search button",
            "scroll_to 1200",
        ]
    );
}

#[tokio::test]
async fn unnamed_screenshots_never_collide() {
    let mut agent = agent(
        r#"{"actions": [
            {"tool": "take_screenshot", "parameters": {}},
            {"tool": "take_screenshot", "parameters": {"filename": ""}}
        ]}"#,
    );
    let trace = agent.process_command("two screenshots").await.unwrap();
    assert!(trace.iter().all(|r| r.outcome == Outcome::Success));

    let log = agent.browser().log();
    assert_eq!(log.len(), 2);
    assert_ne!(log[0], log[1]);
    assert!(log.iter().all(|entry| entry.starts_with("screenshot ")));
}

#[tokio::test]
async fn schema_error_carries_the_raw_reply() {
    let raw = "```\nnot json at all\n```";
    let mut agent = agent(raw);
    let err = agent.process_command("anything").await.unwrap_err();
    match err {
        AgentError::Plan(plan_err @ PlanError::Schema { .. }) => {
            assert_eq!(plan_err.raw_response(), Some(raw));
        }
        other => panic!("expected a schema error, got {other}"),
    }
    assert!(agent.browser().log().is_empty());
}
