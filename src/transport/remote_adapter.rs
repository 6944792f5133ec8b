//! Browser adapter backed by the connected browser shim.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::browser::{BrowserAdapter, TabInfo, TabQuery, WindowInfo, WindowType};
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::protocol::BrowserCommand;

use super::SurfaceServer;
use super::connection::DEFAULT_REQUEST_TIMEOUT;

/// [`BrowserAdapter`] that forwards calls to the browser shim.
#[derive(Clone)]
pub struct RemoteBrowserAdapter {
    server: Arc<SurfaceServer>,
    request_timeout: Duration,
}

impl RemoteBrowserAdapter {
    /// Creates an adapter using the default request timeout.
    #[must_use]
    pub fn new(server: Arc<SurfaceServer>) -> Self {
        Self {
            server,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn call<T: DeserializeOwned>(&self, command: BrowserCommand) -> Result<T> {
        let method = command.method();
        let value = self
            .server
            .send_browser_command(command, self.request_timeout)
            .await?;
        decode(method, value)
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::protocol(format!("Unexpected {method} result: {e}")))
}

#[async_trait]
impl BrowserAdapter for RemoteBrowserAdapter {
    async fn tabs_query(&self, query: TabQuery) -> Result<Vec<TabInfo>> {
        self.call(BrowserCommand::TabsQuery(query)).await
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<TabInfo> {
        let tab: Option<TabInfo> = self.call(BrowserCommand::TabsGet { tab_id }).await?;
        tab.ok_or_else(|| Error::tab_not_found(tab_id))
    }

    async fn get_all_windows(&self, window_types: &[WindowType]) -> Result<Vec<WindowInfo>> {
        self.call(BrowserCommand::WindowsGetAll {
            window_types: window_types.to_vec(),
        })
        .await
    }
}
