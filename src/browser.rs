//! Renderer session abstraction and the Chromium implementation.
//!
//! The pagination loop and detail fetcher only see the [`Renderer`] trait:
//! one navigable session that can wait for structural markers and hand back
//! rendered markup. [`ChromeRenderer`] drives a headless Chromium over the
//! DevTools protocol with the usual anti-automation launch flags, a
//! realistic user agent, and `navigator.webdriver` suppression. The session
//! is the sole shared mutable resource of a crawl; every method takes
//! `&mut self` so use stays sequential.

use crate::cookies::Cookie;
use crate::error::{HarvestError, OptionExt, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// User agent presented to the site
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Structural marker for render completion
pub const BODY_MARKER: &str = "body";

/// Selector poll interval inside `wait_for`
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Scripts registered on every new document to mask automation signals.
/// Not required for correctness, only to keep the source from serving
/// challenge pages.
const STEALTH_SCRIPTS: &[&str] = &[
    r#"Object.defineProperty(navigator, 'webdriver', { get: () => undefined, configurable: true });"#,
    r#"window.chrome = window.chrome || { runtime: {} };"#,
    r#"Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'], configurable: true });"#,
];

/// Common Chromium executable locations, checked before falling back to PATH
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

/// A navigable rendering session over one browser page.
///
/// Contract: after `open` returns, `current_url`/`html` refer to the opened
/// location until the next navigation. `wait_for` blocks until the selector
/// matches or the timeout expires, returning whether it matched.
#[async_trait]
pub trait Renderer: Send {
    async fn open(&mut self, url: &str) -> Result<()>;
    async fn current_url(&mut self) -> Result<String>;
    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<bool>;
    async fn html(&mut self) -> Result<String>;
    async fn run_script(&mut self, source: &str) -> Result<()>;
    async fn refresh(&mut self) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

/// Session launch options.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Run without a visible window (default)
    pub headless: bool,
    /// Proxy server URL, e.g. `socks5://127.0.0.1:1080`
    pub proxy: Option<String>,
    /// Attach to a running browser's DevTools endpoint instead of launching
    pub remote_url: Option<String>,
    pub window_size: (u32, u32),
    /// Extra Chromium arguments appended after the built-in set
    pub chrome_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            remote_url: None,
            window_size: (1920, 1080),
            chrome_args: Vec::new(),
        }
    }
}

/// Delays and wait bounds pacing session use. The sleeps emulate human
/// browsing and give page scripts time to populate content; the waits are
/// the bounded structural-marker timeouts.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Randomized pre-parse delay per listing page, min..max milliseconds
    pub page_delay_ms: (u64, u64),
    /// Fixed delay after opening a detail page
    pub detail_delay_ms: u64,
    /// Fixed delay after returning from a detail page
    pub return_delay_ms: u64,
    /// Bounded wait for the page body marker
    pub render_wait: Duration,
    /// Extended wait after the one refresh-and-retry attempt
    pub retry_wait: Duration,
    /// Bounded wait for the item-fragment marker
    pub item_wait: Duration,
    /// Bounded wait for the detail page body
    pub detail_wait: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            page_delay_ms: (3000, 6000),
            detail_delay_ms: 2000,
            return_delay_ms: 1000,
            render_wait: Duration::from_secs(10),
            retry_wait: Duration::from_secs(20),
            item_wait: Duration::from_secs(10),
            detail_wait: Duration::from_secs(5),
        }
    }
}

impl Pacing {
    /// Zero delays and waits, for tests.
    pub fn immediate() -> Self {
        Self {
            page_delay_ms: (0, 0),
            detail_delay_ms: 0,
            return_delay_ms: 0,
            render_wait: Duration::ZERO,
            retry_wait: Duration::ZERO,
            item_wait: Duration::ZERO,
            detail_wait: Duration::ZERO,
        }
    }

    /// One randomized page delay drawn from the configured range.
    pub fn page_delay(&self) -> Duration {
        let (min, max) = self.page_delay_ms;
        let span = max.saturating_sub(min).max(1);
        Duration::from_millis(min + rand::random::<u64>() % span)
    }
}

/// Chromium-backed [`Renderer`].
pub struct ChromeRenderer {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeRenderer {
    /// Launch a local browser, or attach to `options.remote_url` when set.
    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        let (browser, handler) = match &options.remote_url {
            Some(remote) => Self::connect_remote(remote).await?,
            None => Self::launch_local(options).await?,
        };

        let page = browser.new_page("about:blank").await?;
        page.execute(SetUserAgentOverrideParams::new(USER_AGENT.to_string()))
            .await?;

        for script in STEALTH_SCRIPTS {
            let params = AddScriptToEvaluateOnNewDocumentParams::builder()
                .source(*script)
                .build()
                .map_err(HarvestError::Browser)?;
            if let Err(e) = page.execute(params).await {
                debug!("Stealth script registration skipped: {e}");
            }
        }

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    async fn launch_local(options: &BrowserOptions) -> Result<(Browser, JoinHandle<()>)> {
        let chrome_path = find_chrome()?;
        info!(path = %chrome_path.display(), headless = options.headless, "Launching browser");

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(proxy) = &options.proxy {
            builder = builder.arg(format!("--proxy-server={proxy}"));
        }
        let (width, height) = options.window_size;
        builder = builder
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg(format!("--window-size={width},{height}"));
        for arg in &options.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| HarvestError::Config(format!("Failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok((browser, handle))
    }

    /// Attach to a running browser via its DevTools `/json/version` endpoint.
    async fn connect_remote(url: &str) -> Result<(Browser, JoinHandle<()>)> {
        info!(url = %url, "Connecting to remote browser");

        let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let version: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await?
            .json()
            .await?;
        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_parse("remote browser reported no webSocketDebuggerUrl")?;

        let (browser, mut handler) = Browser::connect(ws_url).await?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok((browser, handle))
    }

    /// Inject persisted cookies into the session before crawling.
    pub async fn inject_cookies(&mut self, cookies: &[Cookie]) -> Result<()> {
        for cookie in cookies {
            let param = CookieParam::builder()
                .name(&cookie.name)
                .value(&cookie.value)
                .domain(&cookie.domain)
                .path(if cookie.path.is_empty() { "/" } else { cookie.path.as_str() })
                .build();
            match param {
                Ok(param) => {
                    if let Err(e) = self.page.set_cookie(param).await {
                        warn!(name = %cookie.name, "Failed to set cookie: {e}");
                    }
                }
                Err(e) => warn!(name = %cookie.name, "Failed to build cookie: {e}"),
            }
        }
        Ok(())
    }

    /// Cookies accumulated by the session, for persisting across crawls.
    pub async fn session_cookies(&mut self) -> Result<Vec<Cookie>> {
        let cookies = self.page.get_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
                expires: (c.expires >= 0.0).then_some(c.expires),
            })
            .collect())
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn open(&mut self, url: &str) -> Result<()> {
        debug!(url = %url, "Navigating");
        self.page.goto(url).await?;
        // Re-apply on the live document as well; registration at launch can
        // miss pages that rewrite these properties late.
        for script in STEALTH_SCRIPTS {
            if let Err(e) = self.run_script(script).await {
                debug!("Stealth script application skipped: {e}");
            }
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.page
            .url()
            .await?
            .map(|u| u.to_string())
            .ok_or_else(|| HarvestError::Browser("page has no current URL".to_string()))
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(css).await.is_ok() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn html(&mut self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn run_script(&mut self, source: &str) -> Result<()> {
        self.page.evaluate(source.to_string()).await?;
        Ok(())
    }

    async fn refresh(&mut self) -> Result<()> {
        let url = self.current_url().await?;
        self.page.goto(url).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {e}");
        }
        self.handler.abort();
        Ok(())
    }
}

/// Locate a Chromium executable in well-known paths, then in PATH.
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let candidate = std::path::Path::new(path);
        if candidate.exists() {
            return Ok(candidate.to_path_buf());
        }
    }

    for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(HarvestError::Config(
        "Chrome/Chromium not found; install it or pass --remote-url".to_string(),
    ))
}
