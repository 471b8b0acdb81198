use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use super::chrome_scripts::{self, HandleState, LookupResult};
use super::{AutomationSurface, SurfaceConfig};
use crate::{AutomationError, ElementHandle, Selector, TextPattern};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Automation surface backed by a Chrome/Chromium instance driven over the
/// DevTools protocol.
pub struct ChromeSurface {
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    page: Page,
    config: SurfaceConfig,
}

fn cdp_error(context: &str) -> impl Fn(CdpError) -> AutomationError + '_ {
    move |e| match e {
        CdpError::Timeout => AutomationError::Timeout(format!("{context}: protocol request timed out")),
        CdpError::NotFound => AutomationError::ElementDetached(format!("{context}: node not found")),
        CdpError::ScrollingFailed(msg) => {
            AutomationError::ElementNotVisible(format!("{context}: {msg}"))
        }
        other => AutomationError::PlatformError(format!("{context}: {other}")),
    }
}

fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME_BIN") {
        let p = PathBuf::from(path);
        if p.exists() {
            return Some(p);
        }
    }

    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        r"C:\Program Files\Google\Chrome\Application\chrome.exe",
        r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    ];

    candidates.iter().map(PathBuf::from).find(|p| p.exists())
}

impl ChromeSurface {
    #[instrument(skip(config), fields(headless = config.headless))]
    pub async fn launch(config: SurfaceConfig) -> Result<Self, AutomationError> {
        let mut builder = BrowserConfig::builder().request_timeout(config.request_timeout);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = config.executable.clone().or_else(find_chrome_binary) {
            debug!(path = %exe.display(), "using browser executable");
            builder = builder.chrome_executable(exe);
        }
        let browser_config = builder.build().map_err(AutomationError::PlatformError)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(cdp_error("browser launch"))?;

        // The handler drives the websocket; the browser is dead without it.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("browser handler event error: {e}");
                }
            }
            debug!("browser handler loop exited");
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(cdp_error("open page")(e));
            }
        };

        info!("browser session started");
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
            page,
            config,
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String, context: &str) -> Result<T, AutomationError> {
        let result = self.page.evaluate(script).await.map_err(cdp_error(context))?;
        result
            .into_value::<T>()
            .map_err(|e| AutomationError::Internal(format!("{context}: unexpected script result: {e}")))
    }

    async fn eval_on_handle(
        &self,
        element: &ElementHandle,
        script: String,
        context: &str,
    ) -> Result<HandleState, AutomationError> {
        let state: HandleState = self.eval(script, context).await?;
        if !state.attached {
            return Err(AutomationError::ElementDetached(format!("{context}: {element}")));
        }
        Ok(state)
    }
}

#[async_trait::async_trait]
impl AutomationSurface for ChromeSurface {
    #[instrument(skip(self))]
    async fn goto(&self, url: &str) -> Result<(), AutomationError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| AutomationError::NavigationFailed {
                url: url.to_string(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, selector), fields(selector = %selector))]
    async fn find_element(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<ElementHandle, AutomationError> {
        let script = chrome_scripts::lookup_script(selector);
        let deadline = Instant::now() + timeout;
        loop {
            let hit: LookupResult = self.eval(script.clone(), "lookup").await?;
            if let Some(err) = hit.error {
                // A broken css selector can never match; don't spin on it.
                warn!("selector {selector} rejected by page: {err}");
                return Err(AutomationError::ElementNotFound(format!("{selector}: {err}")));
            }
            if hit.found {
                if let (Some(id), Some(tag)) = (hit.id, hit.tag) {
                    return Ok(ElementHandle {
                        id,
                        tag,
                        role: hit.role,
                        name: hit.name,
                        enabled: hit.enabled.unwrap_or(true),
                    });
                }
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::ElementNotFound(format!(
                    "no visible match for {selector} within {timeout:?}"
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    #[instrument(level = "debug", skip(self, element), fields(element = %element))]
    async fn click(&self, element: &ElementHandle, timeout: Duration) -> Result<(), AutomationError> {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self
                .eval_on_handle(element, chrome_scripts::state_script(&element.id), "click")
                .await?;
            if state.enabled {
                break;
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::ElementNotEnabled(format!(
                    "{element} stayed disabled for {timeout:?}"
                )));
            }
            sleep(POLL_INTERVAL).await;
        }

        let node = self
            .page
            .find_element(chrome_scripts::handle_css(&element.id))
            .await
            .map_err(cdp_error("click"))?;
        node.scroll_into_view().await.map_err(cdp_error("click"))?;
        node.click().await.map_err(cdp_error("click"))?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        self.eval_on_handle(element, chrome_scripts::clear_script(&element.id), "clear")
            .await?;
        Ok(())
    }

    async fn type_char(&self, element: &ElementHandle, ch: char) -> Result<(), AutomationError> {
        let state = self
            .eval_on_handle(element, chrome_scripts::focus_script(&element.id), "focus")
            .await?;
        if !state.ok {
            return Err(AutomationError::ElementNotEnabled(format!(
                "{element} does not accept focus"
            )));
        }
        let node = self
            .page
            .find_element(chrome_scripts::handle_css(&element.id))
            .await
            .map_err(cdp_error("type"))?;
        node.type_str(ch.to_string()).await.map_err(cdp_error("type"))?;
        if !self.config.keystroke_delay.is_zero() {
            sleep(self.config.keystroke_delay).await;
        }
        Ok(())
    }

    async fn read_value(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let state = self
            .eval_on_handle(element, chrome_scripts::read_value_script(&element.id), "read value")
            .await?;
        Ok(state.value.unwrap_or_default())
    }

    async fn select_native_option(
        &self,
        element: &ElementHandle,
        label: &TextPattern,
    ) -> Result<(), AutomationError> {
        let state = self
            .eval_on_handle(element, chrome_scripts::select_script(&element.id, label), "select")
            .await?;
        if !state.ok {
            return Err(AutomationError::ElementNotFound(format!(
                "no option matching {label} in {element}"
            )));
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        let url = self.page.url().await.map_err(cdp_error("current url"))?;
        Ok(url.unwrap_or_default())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), AutomationError> {
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), path)
            .await
            .map_err(cdp_error("screenshot"))?;
        Ok(())
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let browser = self.browser.lock().await.take();
        let handler = self.handler.lock().await.take();

        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map_err(cdp_error("close browser"));
                if let Err(e) = browser.wait().await {
                    warn!("browser process did not exit cleanly: {e}");
                }
                closed.map(|_| ())
            }
            None => Ok(()),
        };

        if let Some(handler) = handler {
            handler.abort();
        }
        info!("browser session closed");
        result
    }
}
