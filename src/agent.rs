use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use crate::batch;
use crate::brain::Model;
use crate::browser::Browser;
use crate::dom;
use crate::error::AgentError;
use crate::executor::{Executor, ExecutorConfig, ScreenshotNamer};
use crate::planner::Planner;
use crate::registry::ToolRegistry;
use crate::types::{ActionPlan, ActionTrace, Outcome, PageSnapshot};

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub executor: ExecutorConfig,
    /// Upper bound on one planning request to the model.
    pub request_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// True when a command's result shows the browser session is gone, either
/// before planning or part way through the batch. Nothing more can run on it.
pub fn session_lost(result: &Result<ActionTrace, AgentError>) -> bool {
    match result {
        Err(AgentError::SessionFatal(_)) => true,
        Err(_) => false,
        Ok(trace) => trace.iter().any(|r| r.outcome == Outcome::SessionFatal),
    }
}

/// Owns the browser session for its whole life and drives one instruction
/// at a time through planning and execution.
pub struct Agent<B, M> {
    browser: Arc<B>,
    planner: Planner<M>,
    registry: ToolRegistry,
    config: Arc<ExecutorConfig>,
    screenshots: Arc<ScreenshotNamer>,
    interrupt: Arc<AtomicBool>,
}

impl<B, M> Agent<B, M>
where
    B: Browser + 'static,
    M: Model,
{
    pub fn new(browser: B, model: M, config: AgentConfig) -> Self {
        let registry = ToolRegistry::builtin();
        Self {
            browser: Arc::new(browser),
            planner: Planner::new(model, registry, config.request_timeout),
            registry,
            config: Arc::new(config.executor),
            screenshots: Arc::new(ScreenshotNamer::default()),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Raising the returned flag skips every action not yet started.
    /// The flag is cleared when the next instruction begins.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    /// Plan `instruction` against the current page and run the plan.
    ///
    /// Only plan-level failures are errors. Every action, whatever its
    /// outcome, has a line in the returned trace.
    pub async fn process_command(&mut self, instruction: &str) -> Result<ActionTrace, AgentError> {
        self.interrupt.store(false, Ordering::SeqCst);
        info!(instruction, "processing command");

        let snapshot = self.snapshot().await?;
        let plan = self.planner.translate(instruction, &snapshot).await?;
        self.execute(plan).await
    }

    /// Run an already validated plan.
    pub async fn execute(&mut self, plan: ActionPlan) -> Result<ActionTrace, AgentError> {
        let registry = self.registry;
        let config = Arc::clone(&self.config);
        let screenshots = Arc::clone(&self.screenshots);
        let interrupt = Arc::clone(&self.interrupt);

        self.blocking(move |browser| {
            let executor = Executor::new(browser, &config, &screenshots);
            batch::run_plan(&executor, &registry, plan, &interrupt)
        })
        .await
    }

    /// Fresh grounding for the model. A dead session is fatal; any other
    /// failure is reported to the model in place of the page.
    pub async fn snapshot(&self) -> Result<PageSnapshot, AgentError> {
        match self.blocking(|browser| dom::capture_snapshot(browser)).await? {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if e.is_fatal() => Err(AgentError::SessionFatal(e.to_string())),
            Err(e) => {
                warn!(error = %e, "could not capture page snapshot");
                Ok(PageSnapshot {
                    title: "unavailable".to_string(),
                    url: "unknown".to_string(),
                    preview: format!("Error getting page info: {e}"),
                })
            }
        }
    }

    /// Browser calls block, so they run off the async workers.
    async fn blocking<T, F>(&self, f: F) -> Result<T, AgentError>
    where
        F: FnOnce(&B) -> T + Send + 'static,
        T: Send + 'static,
    {
        let browser = Arc::clone(&self.browser);
        tokio::task::spawn_blocking(move || f(browser.as_ref()))
            .await
            .map_err(|e| AgentError::Worker(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BrowserError, ModelError, PlanError};
    use crate::testing::MockBrowser;
    use std::future::Future;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
        reply: String,
    }

    impl Model for Arc<Recorder> {
        fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, ModelError>> + Send {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = self.reply.clone();
            async move { Ok(reply) }
        }
    }

    fn recorder(reply: &str) -> Arc<Recorder> {
        Arc::new(Recorder {
            reply: reply.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn plan_runs_in_order() {
        let model = recorder(
            r#"```json
{"actions": [
  {"tool": "navigate_to", "parameters": {"url": "example.com"}, "reasoning": "open"},
  {"tool": "click_element", "parameters": {"strategy": "text", "value": "More"}, "reasoning": "follow"},
  {"tool": "scroll", "parameters": {"direction": "down"}, "reasoning": "read"}
]}
```"#,
        );
        let mut agent = Agent::new(
            MockBrowser::new().with_body("Example Domain body"),
            Arc::clone(&model),
            AgentConfig::default(),
        );

        let trace = agent.process_command("open example.com and read on").await.unwrap();
        let outcomes: Vec<_> = trace.iter().map(|r| r.outcome).collect();
        assert_eq!(
            outcomes,
            vec![Outcome::Success, Outcome::NotFound, Outcome::Success]
        );

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Page preview: Example Domain body"));
        assert!(agent.browser().calls().contains(&"navigate https://example.com".to_string()));
    }

    #[tokio::test]
    async fn unparseable_reply_surfaces_raw_text() {
        let mut agent = Agent::new(
            MockBrowser::new(),
            recorder("I cannot help with that."),
            AgentConfig::default(),
        );
        let err = agent.process_command("do something").await.unwrap_err();
        match err {
            AgentError::Plan(PlanError::Schema { raw, .. }) => {
                assert_eq!(raw, "I cannot help with that.")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn dead_session_fails_before_planning() {
        let model = recorder(r#"{"actions": []}"#);
        let mut agent = Agent::new(
            MockBrowser::new().failing("title", BrowserError::SessionLost("gone".into())),
            Arc::clone(&model),
            AgentConfig::default(),
        );
        let err = agent.process_command("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionFatal(_)));
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_loss_is_detected_before_and_during_a_batch() {
        let mut before = Agent::new(
            MockBrowser::new().failing("title", BrowserError::SessionLost("gone".into())),
            recorder(r#"{"actions": []}"#),
            AgentConfig::default(),
        );
        assert!(session_lost(&before.process_command("anything").await));

        let mut during = Agent::new(
            MockBrowser::new().failing("reload", BrowserError::SessionLost("crashed".into())),
            recorder(r#"{"actions": [{"tool": "refresh"}, {"tool": "go_back"}]}"#),
            AgentConfig::default(),
        );
        let result = during.process_command("reload").await;
        assert!(session_lost(&result));
        assert_eq!(result.unwrap()[1].outcome, Outcome::Skipped);

        let mut healthy = Agent::new(
            MockBrowser::new(),
            recorder(r#"{"actions": [{"tool": "refresh"}]}"#),
            AgentConfig::default(),
        );
        assert!(!session_lost(&healthy.process_command("reload").await));

        let plan_failure: Result<ActionTrace, AgentError> =
            Err(PlanError::Timeout(Duration::from_secs(1)).into());
        assert!(!session_lost(&plan_failure));
    }

    #[tokio::test]
    async fn snapshot_failure_is_reported_to_the_model() {
        let model = recorder(r#"{"actions": []}"#);
        let mut agent = Agent::new(
            MockBrowser::new().failing("title", BrowserError::Protocol("no target".into())),
            Arc::clone(&model),
            AgentConfig::default(),
        );
        let trace = agent.process_command("anything").await.unwrap();
        assert!(trace.is_empty());
        assert!(model.prompts.lock().unwrap()[0].contains("Error getting page info: no target"));
    }

    #[tokio::test]
    async fn interrupt_is_cleared_for_the_next_command() {
        let model = recorder(r#"{"actions": [{"tool": "refresh", "parameters": {}}]}"#);
        let mut agent = Agent::new(MockBrowser::new(), model, AgentConfig::default());
        agent.interrupt_handle().store(true, Ordering::SeqCst);
        let trace = agent.process_command("reload").await.unwrap();
        assert_eq!(trace[0].outcome, Outcome::Success);
    }
}
