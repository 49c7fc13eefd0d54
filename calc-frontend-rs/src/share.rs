//! Sharing the session link and downloading the history file.

use serde::{Deserialize, Serialize};

pub const COPIED_NOTICE: &str = "Link copied to clipboard!";

#[derive(Clone, Debug, PartialEq, Eq, tsify::Tsify, Serialize, Deserialize)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct ShareResult {
    pub url: String,
    pub copied: bool,
    /// What to show the user. When the clipboard can't be used this carries the link itself.
    pub message: String,
}

impl ShareResult {
    pub fn copied(url: String) -> Self {
        Self {
            url,
            copied: true,
            message: COPIED_NOTICE.to_string(),
        }
    }

    pub fn fallback(url: String) -> Self {
        let message = format!("Share this link: {url}");
        Self {
            url,
            copied: false,
            message,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("no browser window")]
    NoWindow,

    #[error("{0}")]
    Js(String),
}

#[cfg(target_arch = "wasm32")]
impl From<wasm_bindgen::JsValue> for BrowserError {
    fn from(e: wasm_bindgen::JsValue) -> Self {
        BrowserError::Js(e.as_string().unwrap_or_else(|| format!("{e:?}")))
    }
}

pub async fn share(url: String) -> ShareResult {
    match copy_to_clipboard(&url).await {
        Ok(()) => {
            log::info!("Copied share link {url}");
            ShareResult::copied(url)
        }
        Err(e) => {
            log::warn!("Could not copy share link: {e}");
            ShareResult::fallback(url)
        }
    }
}

#[cfg(target_arch = "wasm32")]
async fn copy_to_clipboard(text: &str) -> Result<(), BrowserError> {
    let window = web_sys::window().ok_or(BrowserError::NoWindow)?;
    let promise = window.navigator().clipboard().write_text(text);
    wasm_bindgen_futures::JsFuture::from(promise).await?;
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
async fn copy_to_clipboard(_text: &str) -> Result<(), BrowserError> {
    Err(BrowserError::NoWindow)
}

/// Offer `contents` to the user as a file download.
#[cfg(target_arch = "wasm32")]
pub fn download(file_name: &str, contents: &str) -> Result<(), BrowserError> {
    use wasm_bindgen::{JsCast, JsValue};

    let window = web_sys::window().ok_or(BrowserError::NoWindow)?;
    let document = window.document().ok_or(BrowserError::NoWindow)?;

    let parts = js_sys::Array::of1(&JsValue::from_str(contents));
    let options = web_sys::BlobPropertyBag::new();
    options.set_type("application/json");
    let blob = web_sys::Blob::new_with_str_sequence_and_options(&parts, &options)?;
    let url = web_sys::Url::create_object_url_with_blob(&blob)?;

    let anchor = document
        .create_element("a")?
        .dyn_into::<web_sys::HtmlAnchorElement>()
        .map_err(JsValue::from)?;
    anchor.set_href(&url);
    anchor.set_download(file_name);
    anchor.click();

    web_sys::Url::revoke_object_url(&url)?;
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
pub fn download(file_name: &str, _contents: &str) -> Result<(), BrowserError> {
    log::warn!("Can't download {file_name} outside a browser");
    Err(BrowserError::NoWindow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_message_carries_the_link() {
        let result = ShareResult::fallback("https://calc.example/?session=calc_a_b".to_string());
        assert!(!result.copied);
        assert_eq!(
            result.message,
            "Share this link: https://calc.example/?session=calc_a_b"
        );
    }

    #[test]
    fn share_without_a_clipboard_falls_back() {
        let url = "https://calc.example/?bin=b-65f1".to_string();
        let result = futures::executor::block_on(share(url.clone()));
        assert_eq!(result, ShareResult::fallback(url));
    }
}
