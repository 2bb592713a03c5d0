//! Turns a user instruction into a validated [`ActionPlan`].
//!
//! One model request per instruction: the prompt carries the tool catalogue,
//! a fresh page snapshot and the instruction. The reply is untrusted text and
//! only ever becomes data through the `{"actions": [...]}` schema.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::brain::Model;
use crate::error::PlanError;
use crate::registry::ToolRegistry;
use crate::types::{Action, ActionPlan, PageSnapshot};

const OUTPUT_FORMAT: &str = r#"Respond with a JSON object containing a list of actions to perform. Each action should have:
- "tool": the tool name
- "parameters": a dict of parameters
- "reasoning": why you're using this tool

Example format:
{
    "actions": [
        {
            "tool": "navigate_to",
            "parameters": {"url": "https://example.com"},
            "reasoning": "User wants to visit example.com"
        }
    ]
}

Respond ONLY with the JSON object, no other text."#;

/// Only the envelope is strict. Entries are read one by one so a single bad
/// entry cannot discard the rest of the plan.
#[derive(Deserialize)]
struct PlanPayload {
    actions: Vec<Value>,
}

pub struct Planner<M> {
    model: M,
    registry: ToolRegistry,
    timeout: Duration,
}

impl<M: Model> Planner<M> {
    pub fn new(model: M, registry: ToolRegistry, timeout: Duration) -> Self {
        Self {
            model,
            registry,
            timeout,
        }
    }

    pub fn build_prompt(&self, instruction: &str, snapshot: &PageSnapshot) -> String {
        format!(
            "You are a browser automation assistant. You have access to these tools:\n\n\
             {tools}\n\n\
             Current page info:\n{snapshot}\n\n\
             User command: {instruction}\n\n\
             {OUTPUT_FORMAT}",
            tools = self.registry.render(),
        )
    }

    /// Ask the model for a plan. Never retries; a malformed reply is an error,
    /// not an empty plan.
    pub async fn translate(
        &self,
        instruction: &str,
        snapshot: &PageSnapshot,
    ) -> Result<ActionPlan, PlanError> {
        let prompt = self.build_prompt(instruction, snapshot);
        debug!(chars = prompt.len(), "sending planning prompt");

        let response = tokio::time::timeout(self.timeout, self.model.complete(&prompt))
            .await
            .map_err(|_| PlanError::Timeout(self.timeout))??;

        let plan = parse_plan(&response)?;
        info!(actions = plan.len(), "model produced plan");
        Ok(plan)
    }
}

/// Parse a model reply into a plan, tolerating code fences and prose.
pub fn parse_plan(raw: &str) -> Result<ActionPlan, PlanError> {
    let json = extract_json(raw);
    serde_json::from_str::<PlanPayload>(json)
        .map(|payload| payload.actions.into_iter().map(Action::from_entry).collect())
        .map_err(|source| PlanError::Schema {
            source,
            raw: raw.to_string(),
        })
}

/// Strip a labelled (```` ```json ````) or bare fence, then trim anything
/// outside the outermost braces.
pub fn extract_json(raw: &str) -> &str {
    let text = raw.trim();
    let inner = fenced(text, "```json")
        .or_else(|| fenced(text, "```"))
        .unwrap_or(text)
        .trim();

    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}

fn fenced<'a>(text: &'a str, open: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(&rest[..end])
}
