//! MCP tool definitions for tabwire
//!
//! Defines the tools exposed through the MCP protocol and the agent request
//! each one turns into.

use serde_json::Value;

use tabwire_protocol::{kinds, Envelope};

use super::protocol::Tool;

/// A required tool argument was absent or empty
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing required argument: {0}")]
pub struct MissingArgument(pub &'static str);

/// Every tool the bridge serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserTool {
    TestConnection,
    GetPageInfo,
    GetElementStyles,
    GetAllStyles,
    InjectCss,
    TakeScreenshot,
}

impl BrowserTool {
    pub const ALL: [BrowserTool; 6] = [
        BrowserTool::TestConnection,
        BrowserTool::GetPageInfo,
        BrowserTool::GetElementStyles,
        BrowserTool::GetAllStyles,
        BrowserTool::InjectCss,
        BrowserTool::TakeScreenshot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BrowserTool::TestConnection => "test_connection",
            BrowserTool::GetPageInfo => "get_page_info",
            BrowserTool::GetElementStyles => "get_element_styles",
            BrowserTool::GetAllStyles => "get_all_styles",
            BrowserTool::InjectCss => "inject_css",
            BrowserTool::TakeScreenshot => "take_screenshot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Build the agent request for this call
    ///
    /// Returns `Ok(None)` for tools answered locally. Required arguments are
    /// checked here, so a missing one never reaches the agent channel.
    pub fn build_request(self, arguments: &Value) -> Result<Option<Envelope>, MissingArgument> {
        let envelope = match self {
            BrowserTool::TestConnection => return Ok(None),
            BrowserTool::GetPageInfo => Envelope::new(kinds::GET_PAGE_INFO),
            BrowserTool::GetElementStyles => Envelope::new(kinds::GET_ELEMENT_STYLES)
                .with_field("selector", required_str(arguments, "selector")?),
            BrowserTool::GetAllStyles => Envelope::new(kinds::GET_ALL_STYLES),
            BrowserTool::InjectCss => {
                Envelope::new(kinds::INJECT_CSS).with_field("css", required_str(arguments, "css")?)
            }
            BrowserTool::TakeScreenshot => Envelope::new(kinds::GET_SCREENSHOT),
        };
        Ok(Some(envelope))
    }

    fn definition(self) -> Tool {
        let (description, input_schema) = match self {
            BrowserTool::TestConnection => (
                "Test if the browser extension is connected",
                no_arguments(),
            ),
            BrowserTool::GetPageInfo => (
                "Get current page HTML and metadata",
                no_arguments(),
            ),
            BrowserTool::GetElementStyles => (
                "Get computed styles for elements matching the selector",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "selector": {
                            "type": "string",
                            "description": "CSS selector"
                        }
                    },
                    "required": ["selector"]
                }),
            ),
            BrowserTool::GetAllStyles => (
                "Get all CSS rules from the current page",
                no_arguments(),
            ),
            BrowserTool::InjectCss => (
                "Inject CSS into the current page for live preview",
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "css": {
                            "type": "string",
                            "description": "CSS text to inject"
                        }
                    },
                    "required": ["css"]
                }),
            ),
            BrowserTool::TakeScreenshot => (
                "Take a screenshot of the current page",
                no_arguments(),
            ),
        };

        Tool {
            name: self.name().into(),
            description: description.into(),
            input_schema,
        }
    }
}

fn no_arguments() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {}
    })
}

fn required_str(arguments: &Value, key: &'static str) -> Result<String, MissingArgument> {
    match arguments.get(key).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(MissingArgument(key)),
    }
}

/// Get all tool definitions for the tabwire MCP server
pub fn get_tool_definitions() -> Vec<Tool> {
    BrowserTool::ALL.into_iter().map(BrowserTool::definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definitions_not_empty() {
        assert_eq!(get_tool_definitions().len(), BrowserTool::ALL.len());
    }

    #[test]
    fn test_all_tools_have_valid_schemas() {
        for tool in get_tool_definitions() {
            assert!(!tool.description.is_empty(), "{} has no description", tool.name);
            assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
            assert!(tool.input_schema["properties"].is_object(), "{}", tool.name);
        }
    }

    #[test]
    fn test_expected_tools_present() {
        let names: Vec<String> = get_tool_definitions().into_iter().map(|t| t.name).collect();
        for expected in [
            "test_connection",
            "get_page_info",
            "get_element_styles",
            "take_screenshot",
            "get_all_styles",
            "inject_css",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_name_lookup_round_trips() {
        for tool in BrowserTool::ALL {
            assert_eq!(BrowserTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(BrowserTool::from_name("open_devtools"), None);
    }

    #[test]
    fn test_selector_required() {
        let tool = BrowserTool::GetElementStyles;
        assert_eq!(
            tool.build_request(&json!({})),
            Err(MissingArgument("selector"))
        );
        assert_eq!(
            tool.build_request(&json!({"selector": ""})),
            Err(MissingArgument("selector"))
        );
        assert_eq!(
            tool.build_request(&Value::Null),
            Err(MissingArgument("selector"))
        );

        let envelope = tool.build_request(&json!({"selector": ".btn"})).unwrap().unwrap();
        assert_eq!(envelope.kind(), kinds::GET_ELEMENT_STYLES);
        assert_eq!(envelope.get("selector"), Some(&json!(".btn")));
        assert_eq!(envelope.request_id(), None);
    }

    #[test]
    fn test_inject_css_carries_css() {
        let envelope = BrowserTool::InjectCss
            .build_request(&json!({"css": "body { color: red }"}))
            .unwrap()
            .unwrap();
        assert_eq!(envelope.kind(), kinds::INJECT_CSS);
        assert_eq!(envelope.get("css"), Some(&json!("body { color: red }")));
    }

    #[test]
    fn test_screenshot_uses_agent_type() {
        let envelope = BrowserTool::TakeScreenshot.build_request(&json!({})).unwrap().unwrap();
        assert_eq!(envelope.kind(), kinds::GET_SCREENSHOT);
    }

    #[test]
    fn test_connection_check_is_local() {
        assert_eq!(BrowserTool::TestConnection.build_request(&json!({})), Ok(None));
    }

    #[test]
    fn test_missing_argument_message() {
        assert_eq!(
            MissingArgument("selector").to_string(),
            "Missing required argument: selector"
        );
    }
}
