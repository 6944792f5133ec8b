//! Browser API commands served by the browser shim.
//!
//! Commands follow the `namespace.method` format of the extension APIs.
//!
//! | Method | Params | Result |
//! |--------|--------|--------|
//! | `tabs.query` | [`TabQuery`] | `TabInfo[]` |
//! | `tabs.get` | `{ tabId }` | `TabInfo` |
//! | `windows.getAll` | `{ windowTypes }` | `WindowInfo[]` |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::browser::{TabQuery, WindowType};
use crate::identifiers::TabId;

// ============================================================================
// BrowserCommand
// ============================================================================

/// A browser API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum BrowserCommand {
    /// Query tabs.
    #[serde(rename = "tabs.query")]
    TabsQuery(TabQuery),

    /// Get one tab.
    #[serde(rename = "tabs.get")]
    TabsGet {
        /// Tab to fetch.
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },

    /// List windows.
    #[serde(rename = "windows.getAll")]
    WindowsGetAll {
        /// Window kinds to include; empty means all.
        #[serde(rename = "windowTypes", default)]
        window_types: Vec<WindowType>,
    },
}

impl BrowserCommand {
    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::TabsQuery(_) => "tabs.query",
            Self::TabsGet { .. } => "tabs.get",
            Self::WindowsGetAll { .. } => "windows.getAll",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::identifiers::WindowId;

    #[test]
    fn test_tabs_query_serialization() {
        let command = BrowserCommand::TabsQuery(TabQuery::active_in_window(WindowId::new(4)));
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(
            json,
            json!({"method": "tabs.query", "params": {"windowId": 4, "active": true}})
        );
        assert_eq!(command.method(), "tabs.query");
    }

    #[test]
    fn test_tabs_get_serialization() {
        let command = BrowserCommand::TabsGet {
            tab_id: TabId::new(9),
        };
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(json, json!({"method": "tabs.get", "params": {"tabId": 9}}));
    }

    #[test]
    fn test_windows_get_all_parse() {
        let command: BrowserCommand = serde_json::from_value(json!({
            "method": "windows.getAll",
            "params": {"windowTypes": ["normal", "popup"]}
        }))
        .expect("parse");
        assert_eq!(
            command,
            BrowserCommand::WindowsGetAll {
                window_types: vec![WindowType::Normal, WindowType::Popup]
            }
        );
    }
}
