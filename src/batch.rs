use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use crate::browser::Browser;
use crate::executor::Executor;
use crate::registry::ToolRegistry;
use crate::types::{ActionPlan, ActionResult, ActionTrace, Outcome};

/// Run every action in order and return one result per action.
///
/// NotFound, ExecutionError and UnknownTool are recorded and the batch moves
/// on. A lost session, or `interrupt` being raised, marks the remaining
/// actions as skipped, so the trace length always equals the plan length.
pub fn run_plan<B: Browser>(
    executor: &Executor<'_, B>,
    registry: &ToolRegistry,
    plan: ActionPlan,
    interrupt: &AtomicBool,
) -> ActionTrace {
    let total = plan.len();
    let mut trace = Vec::with_capacity(total);
    let mut abort_reason: Option<&'static str> = None;

    for (index, action) in plan.into_iter().enumerate() {
        if abort_reason.is_none() && interrupt.load(Ordering::SeqCst) {
            abort_reason = Some("interrupted before this action ran");
        }
        if let Some(reason) = abort_reason {
            trace.push(ActionResult::new(&action.tool, Outcome::Skipped, reason));
            continue;
        }

        info!(
            step = index + 1,
            total,
            tool = %action.tool,
            reasoning = %action.reasoning,
            "executing action"
        );

        let result = match registry.lookup(&action.tool) {
            Some(spec) => executor.execute(spec, &action.parameters),
            None => {
                warn!(tool = %action.tool, "model asked for an unknown tool");
                ActionResult::new(
                    &action.tool,
                    Outcome::UnknownTool,
                    format!("Unknown tool: {}", action.tool),
                )
            }
        };

        info!(tool = %result.tool, outcome = result.outcome.label(), "{}", result.message);
        if result.outcome == Outcome::SessionFatal {
            abort_reason = Some("skipped because the browser session was lost");
        }
        trace.push(result);
    }

    trace
}
