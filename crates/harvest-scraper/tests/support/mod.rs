//! Scripted browser and in-memory backend shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvest_core::ProfileRecord;
use harvest_scraper::{
    ApiConnection, BatchOptions, Browser, BrowserError, CreateOutcome, Orchestrator,
    ProfileSink, RetryPolicy, TabController, TabId, TabStatus, TabTiming,
};

/// How a scripted URL behaves once opened.
#[derive(Debug, Clone)]
pub enum PageScript {
    /// Reports `loading` for `loading_polls` polls, then serves `html`.
    Ready { html: String, loading_polls: u32 },
    NeverLoads,
    LoadError(String),
    /// The tab disappears while loading.
    Vanishes,
    /// Reading the page panics.
    Panics,
}

pub fn profile_html(name: &str) -> String {
    format!(
        r#"<html><body><main>
            <h1 class="text-heading-xlarge">{name}</h1>
            <div class="text-body-medium break-words">Engineer at Example</div>
            <ul><li>321 connections</li></ul>
        </main></body></html>"#
    )
}

fn default_script(url: &str) -> PageScript {
    let slug = url.rsplit('/').next().unwrap_or("someone");
    PageScript::Ready {
        html: profile_html(&format!("Person {slug}")),
        loading_polls: 1,
    }
}

struct OpenTab {
    script: PageScript,
    polls: u32,
}

#[derive(Default)]
struct BrowserState {
    scripts: HashMap<String, VecDeque<PageScript>>,
    tabs: HashMap<TabId, OpenTab>,
    opened: Vec<String>,
    closed: usize,
    max_open: usize,
}

/// An in-memory [`Browser`] whose pages follow per-URL scripts. URLs with no
/// script serve a valid profile after one `loading` poll.
#[derive(Default)]
pub struct ScriptedBrowser {
    next_id: AtomicU64,
    state: Mutex<BrowserState>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, script: PageScript) -> Self {
        self.with_attempts(url, vec![script])
    }

    /// Each open of `url` takes the next script; the last one repeats.
    pub fn with_attempts(self, url: &str, scripts: Vec<PageScript>) -> Self {
        self.state
            .lock()
            .unwrap()
            .scripts
            .insert(url.to_string(), scripts.into());
        self
    }

    pub fn opened_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().tabs.len()
    }

    pub fn closed_count(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    /// Most tabs ever open at the same time.
    pub fn max_open(&self) -> usize {
        self.state.lock().unwrap().max_open
    }
}

impl Browser for ScriptedBrowser {
    async fn open_tab(&self, url: &str) -> Result<TabId, BrowserError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().unwrap();
        let script = match state.scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
        .unwrap_or_else(|| default_script(url));
        state.tabs.insert(id, OpenTab { script, polls: 0 });
        state.opened.push(url.to_string());
        state.max_open = state.max_open.max(state.tabs.len());
        Ok(id)
    }

    async fn tab_status(&self, tab: TabId) -> Result<TabStatus, BrowserError> {
        let mut state = self.state.lock().unwrap();
        let open = state.tabs.get_mut(&tab).ok_or(BrowserError::TabNotFound(tab))?;
        open.polls += 1;
        match &open.script {
            PageScript::Ready { loading_polls, .. } if open.polls > *loading_polls => {
                Ok(TabStatus::Complete)
            }
            PageScript::Ready { .. } | PageScript::NeverLoads => Ok(TabStatus::Loading),
            PageScript::LoadError(reason) => Err(BrowserError::Load {
                url: format!("tab {tab}"),
                reason: reason.clone(),
            }),
            PageScript::Vanishes => Err(BrowserError::TabNotFound(tab)),
            PageScript::Panics => Ok(TabStatus::Complete),
        }
    }

    async fn page_html(&self, tab: TabId) -> Result<String, BrowserError> {
        let script = {
            let state = self.state.lock().unwrap();
            let open = state.tabs.get(&tab).ok_or(BrowserError::TabNotFound(tab))?;
            open.script.clone()
        };
        match script {
            PageScript::Ready { html, .. } => Ok(html),
            PageScript::Panics => panic!("renderer crashed"),
            _ => Err(BrowserError::Backend("page not ready".to_string())),
        }
    }

    async fn close_tab(&self, tab: TabId) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        if state.tabs.remove(&tab).is_some() {
            state.closed += 1;
        }
        Ok(())
    }
}

/// Backend stand-in enforcing URL uniqueness like the real store.
pub struct MemorySink {
    next_id: AtomicU64,
    by_url: Mutex<HashMap<String, i64>>,
    received: Mutex<Vec<ProfileRecord>>,
    online: bool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            by_url: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
            online: true,
        }
    }
}

impl MemorySink {
    pub fn offline() -> Self {
        Self {
            online: false,
            ..Self::default()
        }
    }

    /// Pretends `url` was stored by an earlier run.
    pub fn seed(&self, url: &str) -> i64 {
        let id = i64::try_from(self.next_id.fetch_add(1, Ordering::SeqCst) + 1).unwrap();
        self.by_url.lock().unwrap().insert(url.to_string(), id);
        id
    }

    pub fn received(&self) -> Vec<ProfileRecord> {
        self.received.lock().unwrap().clone()
    }

    pub fn stored(&self) -> usize {
        self.by_url.lock().unwrap().len()
    }
}

impl ProfileSink for MemorySink {
    async fn create_profile(&self, record: &ProfileRecord) -> CreateOutcome {
        if !self.online {
            return CreateOutcome::Error {
                message: "network error: connection refused".to_string(),
                network: true,
            };
        }
        self.received.lock().unwrap().push(record.clone());
        let mut by_url = self.by_url.lock().unwrap();
        if let Some(existing) = by_url.get(&record.url) {
            return CreateOutcome::Duplicate {
                existing_id: Some(*existing),
                message: "profile already exists".to_string(),
            };
        }
        let id = i64::try_from(self.next_id.fetch_add(1, Ordering::SeqCst) + 1).unwrap();
        by_url.insert(record.url.clone(), id);
        CreateOutcome::Created { id }
    }

    async fn check_connection(&self) -> ApiConnection {
        ApiConnection {
            online: self.online,
            message: if self.online { "ok" } else { "unreachable" }.to_string(),
        }
    }
}

/// Production timings; run these tests with paused time.
pub fn default_options() -> BatchOptions {
    BatchOptions {
        tab_timeout: Duration::from_secs(30),
        inter_request_delay: Duration::from_secs(5),
        retry: RetryPolicy::new(2, Duration::from_secs(2)),
    }
}

pub fn instant_options() -> BatchOptions {
    BatchOptions {
        tab_timeout: Duration::from_secs(5),
        inter_request_delay: Duration::ZERO,
        retry: RetryPolicy::new(2, Duration::ZERO),
    }
}

pub fn instant_timing() -> TabTiming {
    TabTiming {
        poll_interval: Duration::from_millis(1),
        settle_delay: Duration::ZERO,
    }
}

pub fn orchestrator<S: ProfileSink>(
    browser: &Arc<ScriptedBrowser>,
    sink: &Arc<S>,
    options: BatchOptions,
) -> Orchestrator<ScriptedBrowser, S> {
    Orchestrator::new(
        TabController::new(Arc::clone(browser), TabTiming::default()),
        Arc::clone(sink),
        options,
    )
}

pub fn profile_urls(slugs: &[&str]) -> Vec<String> {
    slugs
        .iter()
        .map(|slug| format!("https://linkedin.com/in/{slug}"))
        .collect()
}
