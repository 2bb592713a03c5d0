//! Drive a live browser from natural-language instructions.
//!
//! A reasoning model turns an instruction into an [`ActionPlan`] over a fixed
//! set of browser tools; the [`Agent`] runs that plan against one browser
//! session and returns a per-action [`ActionTrace`].

pub mod agent;
pub mod batch;
pub mod brain;
pub mod browser;
pub mod dom;
pub mod error;
pub mod executor;
pub mod hands;
pub mod locator;
pub mod planner;
pub mod registry;
pub mod types;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, session_lost};
pub use brain::{Brain, BrainConfig, Model, Provider};
pub use browser::{Browser, PageMarker, Query};
pub use error::{AgentError, BrowserError, ModelError, PlanError};
pub use executor::ExecutorConfig;
pub use hands::{ChromeSession, LaunchConfig};
pub use types::{Action, ActionPlan, ActionResult, ActionTrace, Outcome, PageSnapshot};
