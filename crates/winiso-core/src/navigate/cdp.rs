//! [`BrowserSession`] over the Chrome DevTools protocol (chromiumoxide).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::session::{BrowserError, BrowserSession};

const CONNECT_RETRY: Duration = Duration::from_millis(500);

/// A single page in a remote headless browser.
pub struct CdpSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl CdpSession {
    /// Connect to the DevTools endpoint at `endpoint` (`http://host:port`),
    /// retrying until `timeout` while the browser is still starting up.
    pub async fn connect(endpoint: &str, timeout: Duration) -> Result<Self, BrowserError> {
        let http = pin_host(endpoint).await?;
        let deadline = Instant::now() + timeout;
        let ws_url = loop {
            let version_url = http.clone();
            let lookup = tokio::task::spawn_blocking(move || fetch_debugger_url(&version_url))
                .await
                .map_err(|e| BrowserError::Endpoint(e.to_string()))?;
            match lookup {
                Ok(ws) => break ws,
                Err(e) if Instant::now() + CONNECT_RETRY < deadline => {
                    tracing::debug!("devtools endpoint not ready: {}", e);
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
                Err(e) => return Err(e),
            }
        };

        tracing::debug!(%ws_url, "connecting to browser");
        let (browser, mut handler) = Browser::connect(ws_url).await?;
        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e.into());
            }
        };
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser connection and stop the protocol handler.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!("browser close: {}", e);
        }
        self.handler.abort();
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

/// Chrome only accepts DevTools connections whose Host header is an IP
/// address or `localhost`, so a container hostname is resolved up front.
async fn pin_host(endpoint: &str) -> Result<String, BrowserError> {
    let mut url = url::Url::parse(endpoint).map_err(|e| BrowserError::Endpoint(e.to_string()))?;
    let domain = match url.host() {
        Some(url::Host::Domain(d)) if d != "localhost" => d.to_string(),
        Some(_) => return Ok(url.as_str().trim_end_matches('/').to_string()),
        None => return Err(BrowserError::Endpoint(format!("no host in {endpoint}"))),
    };
    let port = url.port_or_known_default().unwrap_or(9222);
    let addr = tokio::net::lookup_host((domain.as_str(), port))
        .await?
        .next()
        .ok_or_else(|| BrowserError::Endpoint(format!("{domain} did not resolve")))?;
    url.set_ip_host(addr.ip())
        .map_err(|()| BrowserError::Endpoint(format!("cannot use {} as host", addr.ip())))?;
    tracing::debug!("pinned {} to {}", domain, addr.ip());
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Read `webSocketDebuggerUrl` from `<http>/json/version`.
fn fetch_debugger_url(http: &str) -> Result<String, BrowserError> {
    let endpoint_err = |e: curl::Error| BrowserError::Endpoint(e.to_string());
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(&format!("{http}/json/version")).map_err(endpoint_err)?;
    easy.timeout(Duration::from_secs(5)).map_err(endpoint_err)?;
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(endpoint_err)?;
        transfer.perform().map_err(endpoint_err)?;
    }
    let code = easy.response_code().map_err(endpoint_err)?;
    if code != 200 {
        return Err(BrowserError::Endpoint(format!("/json/version returned HTTP {code}")));
    }
    let version: serde_json::Value =
        serde_json::from_slice(&body).map_err(|e| BrowserError::Endpoint(e.to_string()))?;
    version
        .get("webSocketDebuggerUrl")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Endpoint("no webSocketDebuggerUrl in /json/version".into()))
}

/// Quote `s` as a JavaScript string literal.
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn interactable_script(selector: &str) -> String {
    format!(
        r#"(() => Array.from(document.querySelectorAll({sel})).some(el => {{
    const style = window.getComputedStyle(el);
    const rect = el.getBoundingClientRect();
    return !el.disabled && style.display !== 'none' && style.visibility !== 'hidden'
        && rect.width > 0 && rect.height > 0;
}}))()"#,
        sel = js_str(selector)
    )
}

fn options_script(select: &str) -> String {
    format!(
        r#"(() => {{
    const s = document.querySelector({sel});
    return s ? Array.from(s.options).map(o => o.value) : [];
}})()"#,
        sel = js_str(select)
    )
}

fn select_script(select: &str, value: &str) -> String {
    format!(
        r#"(() => {{
    const s = document.querySelector({sel});
    if (!s) return false;
    s.value = {val};
    s.dispatchEvent(new Event('input', {{ bubbles: true }}));
    s.dispatchEvent(new Event('change', {{ bubbles: true }}));
    return s.value === {val};
}})()"#,
        sel = js_str(select),
        val = js_str(value)
    )
}

/// Evaluates to the chosen href, or `""` when there is none (`null` does not
/// deserialize into a string).
fn href_script(marker: &str, link_text: Option<&str>) -> String {
    format!(
        r#"(() => {{
    const marker = {marker};
    const wanted = {text};
    const anchors = Array.from(document.querySelectorAll('a')).filter(
        a => a.matches(marker) || a.querySelector(marker) !== null);
    const exact = wanted === null ? undefined
        : anchors.find(a => a.innerText.trim() === wanted);
    const pick = exact || anchors[0];
    return pick && pick.href ? pick.href : '';
}})()"#,
        marker = js_str(marker),
        text = link_text.map(js_str).unwrap_or_else(|| "null".to_string())
    )
}

#[async_trait]
impl BrowserSession for CdpSession {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page.goto(url).await?;
        Ok(())
    }

    async fn is_interactable(&mut self, selector: &str) -> Result<bool, BrowserError> {
        self.eval(interactable_script(selector)).await
    }

    async fn option_values(&mut self, select: &str) -> Result<Vec<String>, BrowserError> {
        self.eval(options_script(select)).await
    }

    async fn select_option(&mut self, select: &str, value: &str) -> Result<(), BrowserError> {
        let applied: bool = self.eval(select_script(select, value)).await?;
        if applied {
            Ok(())
        } else {
            Err(BrowserError::Script(format!("could not select {value:?} in {select}")))
        }
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.page.find_element(selector).await?.click().await?;
        Ok(())
    }

    async fn download_href(
        &mut self,
        marker: &str,
        link_text: Option<&str>,
    ) -> Result<Option<String>, BrowserError> {
        let href: String = self.eval(href_script(marker, link_text)).await?;
        Ok(Some(href).filter(|h| !h.is_empty()))
    }

    async fn capture(&mut self, dir: &Path, label: &str) -> Result<(), BrowserError> {
        tokio::fs::create_dir_all(dir).await?;
        let png = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await?;
        tokio::fs::write(dir.join(format!("{label}-screenshot.png")), png).await?;
        let html = self.page.content().await?;
        tokio::fs::write(dir.join(format!("{label}-index.html")), html).await?;
        Ok(())
    }
}
