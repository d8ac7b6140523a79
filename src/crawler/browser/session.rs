//! Headless Chromium session for browser-mode runs
//!
//! One session owns one browser process, one tab and a temporary profile
//! directory. All navigation and UI actions of a run go through that tab,
//! strictly one at a time.

use super::detector::{HeuristicStateChangeDetector, StateChangeDetector};
use super::ranker::{ActionRanker, KeywordActionRanker};
use super::scripts;
use crate::config::{BrowserConfig, ExplorationConfig};
use crate::crawler::parser::{parse_html, truncate_chars};
use crate::crawler::PageSnapshot;
use crate::state::UiSignature;
use crate::storage::NetworkRequest;
use crate::StateTrailError;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EnableParams, EventRequestWillBeSent, EventResponseReceived, ResourceType,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::listeners::EventStream;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::{FutureExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

const IDLE_POLL: Duration = Duration::from_millis(250);
const IDLE_STABLE_SAMPLES: u32 = 2;
const LOGIN_SETTLE: Duration = Duration::from_millis(1000);
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A running browser plus the heuristics used to explore it
pub struct BrowserSession {
    pub(super) page: Page,
    browser: Browser,
    handler: JoinHandle<()>,
    user_data: Option<TempDir>,
    pub(super) settings: BrowserConfig,
    pub(super) exploration: ExplorationConfig,
    max_body_chars: usize,
    pub(super) ranker: Box<dyn ActionRanker>,
    pub(super) detector: Box<dyn StateChangeDetector>,
    closed: bool,
}

impl BrowserSession {
    /// Launches Chromium with a throwaway profile and opens one tab
    ///
    /// # Arguments
    ///
    /// * `settings` - Browser launch and load-wait settings
    /// * `exploration` - Action exploration tuning
    /// * `max_body_chars` - HTML snapshot size limit
    ///
    /// # Returns
    ///
    /// * `Ok(BrowserSession)` - Browser is up and the tab is ready
    /// * `Err(StateTrailError)` - Launch failed; nothing is left running
    pub async fn launch(
        settings: &BrowserConfig,
        exploration: &ExplorationConfig,
        max_body_chars: usize,
    ) -> Result<Self, StateTrailError> {
        let user_data = TempDir::new()?;

        let viewport = Viewport {
            width: settings.viewport_width,
            height: settings.viewport_height,
            ..Default::default()
        };

        let mut builder = CdpBrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.viewport_width, settings.viewport_height)
            .viewport(Some(viewport))
            .user_data_dir(user_data.path())
            .request_timeout(Duration::from_millis(settings.navigation_timeout_ms));
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.executable {
            builder = builder.chrome_executable(executable);
        }
        let cdp_config = builder.build().map_err(StateTrailError::Browser)?;

        let (mut browser, mut handler) = Browser::launch(cdp_config).await?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        let page = match open_tab(&browser).await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.kill().await;
                handler_task.abort();
                return Err(e);
            }
        };

        info!(
            "Browser launched ({}x{}, headless={})",
            settings.viewport_width, settings.viewport_height, settings.headless
        );

        Ok(Self {
            page,
            browser,
            handler: handler_task,
            user_data: Some(user_data),
            settings: settings.clone(),
            exploration: exploration.clone(),
            max_body_chars,
            ranker: Box::new(KeywordActionRanker),
            detector: Box::new(HeuristicStateChangeDetector),
            closed: false,
        })
    }

    /// Replaces the default exploration heuristics
    pub fn with_heuristics(
        mut self,
        ranker: Box<dyn ActionRanker>,
        detector: Box<dyn StateChangeDetector>,
    ) -> Self {
        self.ranker = ranker;
        self.detector = detector;
        self
    }

    /// Applies the cookies of a storage-state document to the tab
    ///
    /// Cookies without a domain are scoped to `start_url`.
    ///
    /// # Returns
    ///
    /// Number of cookies applied
    pub async fn apply_storage_state(
        &self,
        json: &str,
        start_url: &Url,
    ) -> Result<usize, StateTrailError> {
        let state: StorageState = serde_json::from_str(json)?;
        let cookies = state
            .cookies
            .into_iter()
            .map(|cookie| cookie.into_param(start_url))
            .collect::<Result<Vec<_>, _>>()?;

        let count = cookies.len();
        if count > 0 {
            self.page.set_cookies(cookies).await?;
        }
        info!("Applied {} cookies from storage state", count);
        Ok(count)
    }

    /// Opens the start page and evaluates a login script on it
    pub async fn run_login_script(&self, start_url: &Url, script: &str) -> Result<(), StateTrailError> {
        self.navigate(start_url, self.navigation_timeout()).await?;
        self.wait_for_load().await;
        self.page.evaluate(script).await?;
        sleep(LOGIN_SETTLE).await;
        info!("Login script executed on {}", start_url);
        Ok(())
    }

    /// Loads a page and captures its snapshot, signature and evidence
    ///
    /// Links come from the rendered `<a href>` elements. Only when there are
    /// none does the session fall back to clicking through the page's UI.
    pub async fn fetch(&self, url: &Url) -> Result<PageSnapshot, StateTrailError> {
        let mut requests = self.page.event_listener::<EventRequestWillBeSent>().await?;
        let mut responses = self.page.event_listener::<EventResponseReceived>().await?;

        self.navigate(url, self.navigation_timeout()).await?;
        self.wait_for_load().await;

        let network_requests = drain_requests(&mut requests);
        let (status, content_type) = document_response(&mut responses);

        let final_url = self.current_url(url).await;
        let html = self.page.content().await?;
        let parsed = parse_html(&html, &final_url);
        let signature = signature_or_default(self.signature().await, &final_url);

        let screenshot = match self
            .page
            .screenshot(ScreenshotParams::builder().full_page(false).build())
            .await
        {
            Ok(png) => Some(png),
            Err(e) => {
                warn!("Screenshot failed for {}: {}", final_url, e);
                None
            }
        };

        let links = if parsed.links.is_empty() {
            self.explore(&final_url, &signature).await
        } else {
            parsed.links
        };

        Ok(PageSnapshot {
            final_url: final_url.to_string(),
            status,
            content_type,
            title: parsed.title.or_else(|| signature.metadata.title.clone()),
            html_snapshot: Some(truncate_chars(&html, self.max_body_chars)),
            links,
            ui_signature: Some(signature),
            network_requests,
            screenshot,
        })
    }

    /// Shuts the browser down and removes its profile directory
    pub async fn close(mut self) {
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let graceful = timeout(CLOSE_TIMEOUT, async {
            self.browser.close().await?;
            self.browser.wait().await?;
            Ok::<_, StateTrailError>(())
        })
        .await;

        match graceful {
            Ok(Ok(())) => debug!("Browser closed"),
            Ok(Err(e)) => {
                warn!("Browser close failed, killing process: {}", e);
                let _ = self.browser.kill().await;
            }
            Err(_) => {
                warn!("Browser did not exit within {:?}, killing process", CLOSE_TIMEOUT);
                let _ = self.browser.kill().await;
            }
        }

        self.handler.abort();
        if let Some(dir) = self.user_data.take() {
            if let Err(e) = dir.close() {
                warn!("Failed to remove browser profile directory: {}", e);
            }
        }
    }

    pub(super) fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.navigation_timeout_ms)
    }

    /// Navigates the tab, failing with a fetch error after `limit`
    pub(super) async fn navigate(&self, url: &Url, limit: Duration) -> Result<(), StateTrailError> {
        match timeout(limit, self.page.goto(url.as_str())).await {
            Ok(result) => {
                result?;
                Ok(())
            }
            Err(_) => Err(StateTrailError::Fetch {
                url: url.to_string(),
                message: format!("Navigation timeout after {}ms", limit.as_millis()),
            }),
        }
    }

    /// DOM ready, hydration wait, best-effort network idle, final wait
    async fn wait_for_load(&self) {
        let ready = async {
            loop {
                let state = self
                    .page
                    .evaluate(scripts::READY_STATE)
                    .await
                    .ok()
                    .and_then(|v| v.into_value::<String>().ok());
                if state.as_deref().is_some_and(|s| s != "loading") {
                    break;
                }
                sleep(IDLE_POLL).await;
            }
        };
        if timeout(self.navigation_timeout(), ready).await.is_err() {
            debug!("DOMContentLoaded not observed before timeout");
        }

        sleep(Duration::from_millis(self.settings.hydration_wait_ms)).await;
        self.wait_for_network_idle(Duration::from_millis(self.settings.network_idle_timeout_ms))
            .await;
        sleep(Duration::from_millis(self.settings.post_idle_wait_ms)).await;
    }

    /// Waits until the resource count stops growing; timing out is fine
    pub(super) async fn wait_for_network_idle(&self, limit: Duration) {
        let quiet = async {
            let mut last: Option<u64> = None;
            let mut stable = 0;
            loop {
                let count = self
                    .page
                    .evaluate(scripts::RESOURCE_COUNT)
                    .await
                    .ok()
                    .and_then(|v| v.into_value::<u64>().ok());
                if count.is_some() && count == last {
                    stable += 1;
                    if stable >= IDLE_STABLE_SAMPLES {
                        break;
                    }
                } else {
                    stable = 0;
                }
                last = count;
                sleep(IDLE_POLL).await;
            }
        };
        if timeout(limit, quiet).await.is_err() {
            debug!("Network idle wait timed out after {:?}", limit);
        }
    }

    /// Samples the UI signature of the current document
    pub(super) async fn signature(&self) -> Result<UiSignature, StateTrailError> {
        let value: serde_json::Value = self.page.evaluate(scripts::SIGNATURE).await?.into_value()?;
        Ok(UiSignature::from_value(value)?)
    }

    pub(super) async fn current_url(&self, fallback: &Url) -> Url {
        match self.page.url().await {
            Ok(Some(current)) => Url::parse(&current).unwrap_or_else(|_| fallback.clone()),
            _ => fallback.clone(),
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if !self.closed {
            // process and profile dir are released by their own drops
            warn!("Browser session dropped without close");
            self.handler.abort();
        }
    }
}

/// A page whose signature script fails still keeps its parsed links
fn signature_or_default(
    result: Result<UiSignature, StateTrailError>,
    url: &Url,
) -> UiSignature {
    result.unwrap_or_else(|e| {
        warn!("UI signature failed for {}: {}", url, e);
        UiSignature::default()
    })
}

async fn open_tab(browser: &Browser) -> Result<Page, StateTrailError> {
    let page = browser.new_page("about:blank").await?;
    page.execute(EnableParams::default()).await?;
    Ok(page)
}

/// Takes every request event buffered so far
fn drain_requests(events: &mut EventStream<EventRequestWillBeSent>) -> Vec<NetworkRequest> {
    let mut requests = Vec::new();
    while let Some(Some(event)) = events.next().now_or_never() {
        requests.push(NetworkRequest {
            url: event.request.url.clone(),
            method: event.request.method.clone(),
            resource_type: event.r#type.as_ref().map(|t| t.as_ref().to_string()),
            headers: event
                .request
                .headers
                .inner()
                .as_object()
                .cloned()
                .unwrap_or_default(),
        });
    }
    requests
}

/// Status and MIME type of the first document response buffered so far
fn document_response(
    events: &mut EventStream<EventResponseReceived>,
) -> (Option<u16>, Option<String>) {
    while let Some(Some(event)) = events.next().now_or_never() {
        if event.r#type == ResourceType::Document {
            return (
                u16::try_from(event.response.status).ok(),
                Some(event.response.mime_type.clone()),
            );
        }
    }
    (None, None)
}

/// Subset of a browser storage-state document that the session applies
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageState {
    cookies: Vec<StoredCookie>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCookie {
    name: String,
    value: String,
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    secure: Option<bool>,
    #[serde(default)]
    http_only: Option<bool>,
}

impl StoredCookie {
    fn into_param(self, start_url: &Url) -> Result<CookieParam, StateTrailError> {
        let mut builder = CookieParam::builder().name(self.name).value(self.value);
        builder = match self.domain {
            Some(domain) => builder
                .domain(domain)
                .path(self.path.unwrap_or_else(|| "/".to_string())),
            None => builder.url(start_url.as_str()),
        };
        if let Some(secure) = self.secure {
            builder = builder.secure(secure);
        }
        if let Some(http_only) = self.http_only {
            builder = builder.http_only(http_only);
        }
        builder.build().map_err(StateTrailError::Browser)
    }
}
