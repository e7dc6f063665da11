//! The tab-level browser abstraction the tab controller drives.
//!
//! [`HttpBrowser`] is the production implementation: each "tab" is a
//! background `reqwest` fetch whose body becomes the page document once the
//! request finishes. Tests substitute a scripted implementation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::BrowserError;

pub type TabId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Minimal tab API: open in the background, poll load state, read the
/// rendered document, close.
pub trait Browser: Send + Sync + 'static {
    /// Opens `url` in a new inactive tab and returns its id immediately.
    fn open_tab(&self, url: &str) -> impl Future<Output = Result<TabId, BrowserError>> + Send;

    fn tab_status(&self, tab: TabId)
        -> impl Future<Output = Result<TabStatus, BrowserError>> + Send;

    /// The tab's current document as HTML.
    fn page_html(&self, tab: TabId) -> impl Future<Output = Result<String, BrowserError>> + Send;

    /// Closing an unknown or already-closed tab is not an error.
    fn close_tab(&self, tab: TabId) -> impl Future<Output = Result<(), BrowserError>> + Send;
}

enum Slot {
    Loading(JoinHandle<Result<String, BrowserError>>),
    Loaded(Result<String, BrowserError>),
}

/// A [`Browser`] that loads pages over plain HTTP.
pub struct HttpBrowser {
    client: Client,
    next_id: AtomicU64,
    tabs: Arc<Mutex<HashMap<TabId, Slot>>>,
}

impl HttpBrowser {
    /// # Errors
    ///
    /// Returns [`BrowserError::Backend`] if the HTTP client cannot be built.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| BrowserError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            next_id: AtomicU64::new(1),
            tabs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Number of tabs currently held open.
    pub async fn open_tab_count(&self) -> usize {
        self.tabs.lock().await.len()
    }

    /// `None` while the fetch is in flight, the load result once it is done.
    async fn poll_slot(
        &self,
        tab: TabId,
    ) -> Result<Option<Result<String, BrowserError>>, BrowserError> {
        let mut tabs = self.tabs.lock().await;
        let slot = tabs.get_mut(&tab).ok_or(BrowserError::TabNotFound(tab))?;
        if let Slot::Loading(handle) = slot {
            if !handle.is_finished() {
                return Ok(None);
            }
            let result = handle
                .await
                .unwrap_or_else(|e| Err(BrowserError::Backend(e.to_string())));
            *slot = Slot::Loaded(result);
        }
        match slot {
            Slot::Loaded(result) => Ok(Some(result.clone())),
            Slot::Loading(_) => Ok(None),
        }
    }
}

async fn load_page(client: Client, url: String) -> Result<String, BrowserError> {
    let load_error = |reason: String| BrowserError::Load {
        url: url.clone(),
        reason,
    };

    let response = client
        .get(&url)
        .header(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8",
        )
        .send()
        .await
        .map_err(|e| load_error(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(load_error(format!("HTTP {}", status.as_u16())));
    }
    response.text().await.map_err(|e| load_error(e.to_string()))
}

impl Browser for HttpBrowser {
    async fn open_tab(&self, url: &str) -> Result<TabId, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(load_page(self.client.clone(), url.to_owned()));
        self.tabs.lock().await.insert(id, Slot::Loading(handle));
        tracing::debug!(tab = id, url, "opened background tab");
        Ok(id)
    }

    async fn tab_status(&self, tab: TabId) -> Result<TabStatus, BrowserError> {
        match self.poll_slot(tab).await? {
            None => Ok(TabStatus::Loading),
            Some(Ok(_)) => Ok(TabStatus::Complete),
            Some(Err(e)) => Err(e),
        }
    }

    async fn page_html(&self, tab: TabId) -> Result<String, BrowserError> {
        match self.poll_slot(tab).await? {
            None => Err(BrowserError::Backend(format!("tab {tab} is still loading"))),
            Some(result) => result,
        }
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        if let Some(Slot::Loading(handle)) = self.tabs.lock().await.remove(&tab) {
            handle.abort();
        }
        tracing::debug!(tab, "closed tab");
        Ok(())
    }
}
