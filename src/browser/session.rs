use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tempfile::TempDir;

use super::cdp::CdpPage;
use super::launcher::find_chrome_binary;

/// Manages the CDP browser connection and the page under test.
///
/// One session drives one page; multi-tab orchestration is out of scope for
/// the engine.
pub struct BrowserSession {
    browser: Browser,
    _handler_task: tokio::task::JoinHandle<()>,
    // Throwaway profile; cleaned up when the session drops.
    _profile_dir: TempDir,
    page: Page,
    headless: bool,
}

impl BrowserSession {
    /// Launch a new browser and establish the CDP connection.
    pub async fn launch(headless: bool) -> Result<Self> {
        let profile_dir = tempfile::tempdir().context("Failed to create profile dir")?;

        let mut builder = BrowserConfig::builder();

        if headless {
            builder = builder.arg("--headless=new");
        }
        if let Ok(chrome) = find_chrome_binary() {
            builder = builder.chrome_executable(chrome);
        }

        builder = builder
            .user_data_dir(profile_dir.path())
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-client-side-phishing-detection")
            .arg("--disable-default-apps")
            .arg("--disable-extensions")
            .arg("--disable-hang-monitor")
            .arg("--disable-popup-blocking")
            .arg("--disable-prompt-on-repost")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--safebrowsing-disable-auto-update")
            .window_size(1280, 720);

        let config = builder.build().map_err(|e| anyhow::anyhow!("{}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch Chrome")?;

        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {
                // Process browser events
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create initial page")?;

        tracing::info!("Browser session started (headless: {})", headless);

        Ok(Self {
            browser,
            _handler_task: handler_task,
            _profile_dir: profile_dir,
            page,
            headless,
        })
    }

    /// Navigate the page and wait for the load to settle.
    pub async fn open(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {url}"))?;
        self.page
            .wait_for_navigation()
            .await
            .context("Navigation did not settle")?;
        Ok(())
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Engine-facing provider for the session's page.
    pub fn provider(&self) -> CdpPage {
        CdpPage::new(self.page.clone())
    }

    /// Close the browser.
    pub async fn close(self) -> Result<()> {
        drop(self.browser);
        Ok(())
    }

    pub fn is_headless(&self) -> bool {
        self.headless
    }
}
