//! Maps a model-supplied target (strategy + value) onto a page element.
//!
//! Every strategy lowers to a native css or xpath query and takes the first
//! match in document order. Multiple matches are never an error.

use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::browser::{Browser, Query};
use crate::error::BrowserResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Text,
    Id,
    Name,
    Css,
    XPath,
}

impl FromStr for Strategy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Strategy::Text),
            "id" => Ok(Strategy::Id),
            "name" => Ok(Strategy::Name),
            "css" => Ok(Strategy::Css),
            "xpath" => Ok(Strategy::XPath),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Text => "text",
            Strategy::Id => "id",
            Strategy::Name => "name",
            Strategy::Css => "css",
            Strategy::XPath => "xpath",
        };
        f.write_str(name)
    }
}

/// What to locate. Owns no page element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub strategy: Strategy,
    pub value: String,
}

impl TargetDescriptor {
    pub fn new(strategy: Strategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Parse a raw strategy name. Unknown strategies yield `None`.
    pub fn parse(strategy: &str, value: &str) -> Option<Self> {
        strategy
            .parse::<Strategy>()
            .ok()
            .map(|s| Self::new(s, value))
    }

    pub fn to_query(&self) -> Query {
        let value = &self.value;
        match self.strategy {
            Strategy::Text => Query::XPath(format!(
                "//body//*[text()[contains(., {})]]",
                xpath_literal(value)
            )),
            Strategy::Id => Query::XPath(format!("//*[@id={}]", xpath_literal(value))),
            Strategy::Name => Query::XPath(format!("//*[@name={}]", xpath_literal(value))),
            Strategy::Css => Query::Css(value.clone()),
            Strategy::XPath => Query::XPath(value.clone()),
        }
    }
}

/// Resolve `strategy`/`value` against the current page.
///
/// `Ok(None)` covers both "nothing matched" and an unknown strategy; callers
/// must check for absence. `Err` is reserved for browser failures.
pub fn locate<'b, B: Browser>(
    browser: &'b B,
    strategy: &str,
    value: &str,
) -> BrowserResult<Option<B::Element<'b>>> {
    let Some(target) = TargetDescriptor::parse(strategy, value) else {
        debug!(strategy, value, "unknown locator strategy, treating as not found");
        return Ok(None);
    };
    let query = target.to_query();
    debug!(?query, "locating element");
    browser.find(&query)
}

/// Quote `input` as an XPath 1.0 string literal.
fn xpath_literal(input: &str) -> String {
    if !input.contains('"') {
        return format!("\"{input}\"");
    }
    if !input.contains('\'') {
        return format!("'{input}'");
    }

    let parts: Vec<String> = input
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}
