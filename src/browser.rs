use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, Tab};

use crate::capture::FrameSource;
use crate::frames::Layer;
use crate::options::Options;

const TEXT_LAYER_SELECTOR: &str = "canvas.xterm-text-layer";
const CURSOR_LAYER_SELECTOR: &str = "canvas.xterm-cursor-layer";
const TERM_READY_TIMEOUT: Duration = Duration::from_secs(10);
const TERM_READY_POLL: Duration = Duration::from_millis(100);

/// The live terminal view inside an already-running browser.
///
/// This is the whole browser-automation surface the recorder needs:
/// navigate, evaluate, wait for readiness, look up the two rendering
/// surfaces, and rasterize them to image bytes.
pub struct TermPage {
    // Held to keep the debugger connection alive for the tab's lifetime.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl TermPage {
    /// Connects to a running browser over its debugger websocket and opens
    /// the terminal page. The browser's lifecycle belongs to whoever
    /// launched it.
    pub fn connect(ws_url: &str, page_url: &str) -> Result<Self> {
        let browser = Browser::connect(ws_url.to_owned())
            .context("failed to connect to running browser instance")?;
        let tab = browser.new_tab().context("failed to open terminal tab")?;
        tab.navigate_to(page_url)
            .context("failed to navigate to terminal host")?;
        tab.wait_until_navigated()
            .context("terminal page never finished loading")?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.tab
            .set_bounds(Bounds::Normal {
                left: None,
                top: None,
                width: Some(f64::from(width)),
                height: Some(f64::from(height)),
            })
            .context("failed to size terminal viewport")?;
        Ok(())
    }

    /// Polls until `window.term` exists. Recording must not start before
    /// this returns.
    pub fn wait_term_ready(&self) -> Result<()> {
        let deadline = Instant::now() + TERM_READY_TIMEOUT;
        loop {
            let ready = self
                .tab
                .evaluate("window.term != undefined", false)
                .ok()
                .and_then(|object| object.value)
                .map(|value| value == serde_json::Value::Bool(true))
                .unwrap_or(false);
            if ready {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("terminal view never became ready"));
            }
            thread::sleep(TERM_READY_POLL);
        }
    }

    /// Confirms both rendering surfaces are present before any capture.
    pub fn locate_layers(&self) -> Result<()> {
        self.tab
            .wait_for_element(TEXT_LAYER_SELECTOR)
            .context("text rendering surface not found")?;
        self.tab
            .wait_for_element(CURSOR_LAYER_SELECTOR)
            .context("cursor rendering surface not found")?;
        Ok(())
    }

    /// Replaces the shell prompt in the live terminal and clears the
    /// scrollback so recording starts on a clean screen.
    pub fn install_prompt(&self, prompt: &str) -> Result<()> {
        let set_prompt = format!(
            r#" set +o history; unset PROMPT_COMMAND; export PS1="{prompt}"; clear;"#
        );
        self.tab
            .find_element("textarea")
            .context("terminal input element not found")?
            .click()
            .context("failed to focus terminal input")?;
        self.tab
            .type_str(&set_prompt)
            .context("failed to type prompt setup")?
            .press_key("Enter")
            .context("failed to submit prompt setup")?;
        Ok(())
    }

    /// Pushes the display options into the emulator and refits it to the
    /// window.
    pub fn apply_term_options(&self, options: &Options) -> Result<()> {
        let theme =
            serde_json::to_string(&options.theme).context("failed to encode terminal theme")?;
        let script = format!(
            "term.options = {{ fontSize: {}, fontFamily: '{}', letterSpacing: {}, lineHeight: {}, theme: {} }}",
            options.font_size,
            options.font_family,
            options.letter_spacing,
            options.line_height,
            theme,
        );
        self.tab
            .evaluate(&script, false)
            .context("failed to apply terminal options")?;
        self.tab
            .evaluate("term.fit()", false)
            .context("failed to fit terminal")?;
        Ok(())
    }

    /// Closes the terminal tab. Best-effort: the session discards this
    /// error during teardown.
    pub fn close(&self) -> Result<()> {
        self.tab
            .close(true)
            .context("failed to close terminal tab")?;
        Ok(())
    }

    fn layer_selector(layer: Layer) -> &'static str {
        match layer {
            Layer::Text => TEXT_LAYER_SELECTOR,
            Layer::Cursor => CURSOR_LAYER_SELECTOR,
        }
    }
}

impl FrameSource for TermPage {
    fn capture(&self, layer: Layer) -> Result<Vec<u8>> {
        let element = self
            .tab
            .find_element(Self::layer_selector(layer))
            .with_context(|| format!("{} rendering surface went away", layer.as_str()))?;
        element
            .capture_screenshot(CaptureScreenshotFormatOption::Png)
            .with_context(|| format!("failed to capture {} layer", layer.as_str()))
    }
}
