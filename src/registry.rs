//! The fixed catalogue of browser tools shown to the model.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Navigate,
    FindElement,
    Click,
    InputText,
    PageInfo,
    Screenshot,
    Scroll,
    Back,
    Refresh,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub kind: ToolKind,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: &'static [ParamSpec],
}

const fn param(name: &'static str, description: &'static str, required: bool) -> ParamSpec {
    ParamSpec {
        name,
        description,
        required,
    }
}

const STRATEGY: ParamSpec = param(
    "strategy",
    "Search strategy: 'text', 'id', 'name', 'css', 'xpath'",
    true,
);

static TOOLS: &[ToolSpec] = &[
    ToolSpec {
        kind: ToolKind::Navigate,
        name: "navigate_to",
        description: "Navigate to a specific URL",
        parameters: &[param(
            "url",
            "The URL to navigate to (https:// is assumed when no scheme is given)",
            true,
        )],
    },
    ToolSpec {
        kind: ToolKind::FindElement,
        name: "find_element",
        description: "Check whether an element exists, found by text, id, name, CSS selector or XPath",
        parameters: &[STRATEGY, param("value", "The value to search for", true)],
    },
    ToolSpec {
        kind: ToolKind::Click,
        name: "click_element",
        description: "Click on an element found by text, id, name, CSS selector or XPath",
        parameters: &[STRATEGY, param("value", "The value to search for", true)],
    },
    ToolSpec {
        kind: ToolKind::InputText,
        name: "input_text",
        description: "Clear a form field and type text into it",
        parameters: &[
            STRATEGY,
            param("value", "The element identifier", true),
            param("text", "The text to input", true),
        ],
    },
    ToolSpec {
        kind: ToolKind::PageInfo,
        name: "get_page_info",
        description: "Get information about the current page (title, URL, visible text)",
        parameters: &[],
    },
    ToolSpec {
        kind: ToolKind::Screenshot,
        name: "take_screenshot",
        description: "Take a screenshot of the current page",
        parameters: &[param("filename", "Filename to save screenshot (optional)", false)],
    },
    ToolSpec {
        kind: ToolKind::Scroll,
        name: "scroll",
        description: "Scroll the page",
        parameters: &[param(
            "direction",
            "Direction to scroll: 'up', 'down', 'top', 'bottom'",
            false,
        )],
    },
    ToolSpec {
        kind: ToolKind::Back,
        name: "go_back",
        description: "Navigate back in browser history",
        parameters: &[],
    },
    ToolSpec {
        kind: ToolKind::Refresh,
        name: "refresh",
        description: "Refresh the current page",
        parameters: &[],
    },
];

/// Read-only view over the built-in tools.
#[derive(Debug, Clone, Copy)]
pub struct ToolRegistry {
    specs: &'static [ToolSpec],
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ToolRegistry {
    pub fn builtin() -> Self {
        Self { specs: TOOLS }
    }

    pub fn specs(&self) -> &'static [ToolSpec] {
        self.specs
    }

    pub fn lookup(&self, name: &str) -> Option<&'static ToolSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    /// One line per tool, the way the model sees the catalogue.
    pub fn render(&self) -> String {
        self.specs
            .iter()
            .map(|spec| {
                let params = if spec.parameters.is_empty() {
                    "none".to_string()
                } else {
                    spec.parameters
                        .iter()
                        .map(|p| format!("{}: {}", p.name, p.description))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!("- {}: {} | Parameters: {}", spec.name, spec.description, params)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
