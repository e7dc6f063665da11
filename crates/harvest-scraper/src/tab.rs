//! One tab's lifecycle: open, wait for load, settle, extract, close.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use harvest_core::{ExtractionStatus, ProfileRecord};
use tokio::time::Instant;

use crate::browser::{Browser, TabId, TabStatus};
use crate::error::{BrowserError, TabError};
use crate::extract::extract_profile;

/// Ids of tabs opened by a [`TabController`] and not yet closed.
///
/// Cloning shares the same set.
#[derive(Debug, Clone, Default)]
pub struct TrackedTabs(Arc<Mutex<BTreeSet<TabId>>>);

impl TrackedTabs {
    #[must_use]
    pub fn snapshot(&self) -> Vec<TabId> {
        self.lock().iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn insert(&self, tab: TabId) {
        self.lock().insert(tab);
    }

    fn remove(&self, tab: TabId) {
        self.lock().remove(&tab);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<TabId>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TabTiming {
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl Default for TabTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            settle_delay: Duration::from_secs(3),
        }
    }
}

pub struct TabController<B> {
    browser: Arc<B>,
    tracked: TrackedTabs,
    timing: TabTiming,
}

impl<B: Browser> TabController<B> {
    pub fn new(browser: Arc<B>, timing: TabTiming) -> Self {
        Self {
            browser,
            tracked: TrackedTabs::default(),
            timing,
        }
    }

    /// Handle to the tracked-tab set, for crash cleanup and inspection.
    #[must_use]
    pub fn tracked(&self) -> TrackedTabs {
        self.tracked.clone()
    }

    /// Opens `url` in a background tab, extracts the profile once loaded,
    /// and closes the tab on every exit path.
    ///
    /// # Errors
    ///
    /// - [`TabError::Timeout`] if the page is not `complete` within `timeout`.
    /// - [`TabError::NotFound`] if the tab disappears before extraction.
    /// - [`TabError::Extraction`] if the page yields no profile name.
    /// - [`TabError::Browser`] for any other browser failure.
    pub async fn open_and_extract(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<ProfileRecord, TabError> {
        let tab = self.browser.open_tab(url).await?;
        self.tracked.insert(tab);
        tracing::debug!(tab, url, "tab opened");

        let result = self.load_and_extract(tab, url, timeout).await;

        if let Err(e) = self.browser.close_tab(tab).await {
            tracing::warn!(tab, error = %e, "failed to close tab");
        }
        self.tracked.remove(tab);
        result
    }

    async fn load_and_extract(
        &self,
        tab: TabId,
        url: &str,
        timeout: Duration,
    ) -> Result<ProfileRecord, TabError> {
        let not_found = |e: BrowserError| match e {
            BrowserError::TabNotFound(_) => TabError::NotFound {
                url: url.to_string(),
            },
            other => TabError::Browser(other),
        };

        let started = Instant::now();
        loop {
            match self.browser.tab_status(tab).await.map_err(not_found)? {
                TabStatus::Complete => break,
                TabStatus::Loading if started.elapsed() >= timeout => {
                    return Err(TabError::Timeout {
                        url: url.to_string(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                TabStatus::Loading => tokio::time::sleep(self.timing.poll_interval).await,
            }
        }

        tokio::time::sleep(self.timing.settle_delay).await;

        let html = self.browser.page_html(tab).await.map_err(not_found)?;
        let record = extract_profile(&html, url);
        if record.extraction_status == ExtractionStatus::Failed {
            return Err(TabError::Extraction {
                url: url.to_string(),
                message: record
                    .extraction_errors
                    .unwrap_or_else(|| "no usable data".to_string()),
            });
        }
        Ok(record)
    }

    /// Closes every tab still tracked. Used after cancellation or a crash.
    pub async fn close_all_tracked(&self) {
        for tab in self.tracked.snapshot() {
            if let Err(e) = self.browser.close_tab(tab).await {
                tracing::warn!(tab, error = %e, "failed to force-close tab");
            }
            self.tracked.remove(tab);
        }
    }
}
