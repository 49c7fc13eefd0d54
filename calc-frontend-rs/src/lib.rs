mod share;
mod utils;

pub use share::ShareResult;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::LazyLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use slotmap::{Key as _, KeyData};
use tally::data_model::format_number;
use tally::export::{export_file_name, export_json, import_json};
use tally::{
    CalculatorEngine, HistoryEntry, HistorySyncEngine, IdentityProvider, ImportError, Intensity,
    ListenerKey, LocalCache, Operator, RemoteBackend, RemoteConfig, RemoteStore as _,
    Subscription, SyncConfig, SyncStatus, UsageTracker, WriteOutcome,
};
use wasm_bindgen::prelude::*;

use crate::share::BrowserError;
use crate::utils::DeviceStorage;

const USAGE_WINDOW_DAYS: u32 = 30;

#[wasm_bindgen]
pub struct Calculator {
    // we never hold a borrow across an .await
    keypad: RefCell<CalculatorEngine>,
    history: Rc<HistorySyncEngine<RemoteBackend, DeviceStorage>>,
    _remote_changes: Option<Subscription>,
}

// putting this inside LOGGER prevents us from accidentally initializing the logger more than once
#[allow(clippy::declare_interior_mutable_const)]
const LOGGER: LazyLock<()> = LazyLock::new(|| {
    utils::set_panic_hook();

    wasm_logger::init(wasm_logger::Config::default());
    log::info!("Logging initialized");
});

#[derive(Debug, thiserror::Error)]
enum ActionError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("could not encode history: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Browser(#[from] BrowserError),
}

impl From<ActionError> for JsValue {
    fn from(e: ActionError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

#[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
impl Calculator {
    /// `remote_config` is a `RemoteConfig` object such as `{ backend: "realtime", database_url: "..." }`. Anything
    /// missing or unreadable means history is only kept on this device.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen(constructor))]
    pub async fn new(remote_config: JsValue) -> Calculator {
        // used to only initialize the logger once
        #[allow(clippy::borrow_interior_mutable_const)]
        *LOGGER;

        let config: RemoteConfig = if remote_config.is_undefined() || remote_config.is_null() {
            RemoteConfig::default()
        } else {
            serde_wasm_bindgen::from_value(remote_config)
                .inspect_err(|e| log::error!("Invalid remote config, saving locally only: {e}"))
                .unwrap_or_default()
        };

        let remote = RemoteBackend::from_config(&config);
        let sync_config = SyncConfig::for_backend(remote.kind());
        let cache = LocalCache::new(utils::device_storage(), sync_config.keys);
        let query = utils::page_query();
        let provider = IdentityProvider::new(sync_config.link_parameter, query.as_deref());

        let history = HistorySyncEngine::initialize(remote, cache, provider, Utc::now()).await;
        let remote_changes = history.watch_remote();

        Calculator {
            keypad: RefCell::new(CalculatorEngine::new()),
            history,
            _remote_changes: remote_changes,
        }
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn display(&self) -> String {
        self.keypad.borrow().display().to_string()
    }

    /// e.g. `"12 ×"` while waiting for the second operand.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn pending_expression(&self) -> Option<String> {
        self.keypad.borrow().pending_expression()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn input_digit(&self, digit: char) {
        self.keypad.borrow_mut().input_digit(digit);
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn input_decimal(&self) {
        self.keypad.borrow_mut().input_decimal();
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn toggle_sign(&self) {
        self.keypad.borrow_mut().toggle_sign();
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn backspace(&self) {
        self.keypad.borrow_mut().backspace();
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn clear(&self) {
        self.keypad.borrow_mut().clear();
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn clear_entry(&self) {
        self.keypad.borrow_mut().clear_entry();
    }

    /// `+ - * / %`, or their display symbols. Returns `false` for anything else.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn apply_operator(&self, key: String) -> bool {
        self.apply_operator_key(&key)
    }

    /// `=`. A completed calculation is added to the history, saved, and counted towards today's usage.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn evaluate(&self) -> Option<HistoryEntryView> {
        let entry = self.keypad.borrow_mut().evaluate(utils::time_of_day())?;
        let view = HistoryEntryView::from(&entry);

        utils::spawn_write(self.history.append(entry));
        UsageTracker::new(self.history.cache()).record_usage();
        Some(view)
    }

    /// Handle a `KeyboardEvent.key`. Returns the completed calculation if the key finished one.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn press_key(&self, key: String) -> Option<HistoryEntryView> {
        match key.as_str() {
            "Enter" | "=" => return self.evaluate(),
            "." | "," => self.input_decimal(),
            "Backspace" => self.backspace(),
            "Escape" => self.clear(),
            "Delete" => self.clear_entry(),
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(digit), None) if digit.is_ascii_digit() => self.input_digit(digit),
                    _ => {
                        self.apply_operator_key(&key);
                    }
                }
            }
        }
        None
    }

    /// Newest first.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn history(&self) -> Vec<HistoryEntryView> {
        self.history
            .history()
            .iter()
            .map(HistoryEntryView::from)
            .collect()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn clear_history(&self) {
        self.history.clear();
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn sync_state(&self) -> SyncState {
        SyncState {
            syncing: self.history.sync_status() == SyncStatus::Syncing,
            last_write: self.history.last_outcome().map(describe_outcome),
        }
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn session_id(&self) -> String {
        self.history.identity().to_string()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn share_url(&self) -> String {
        self.history.shareable_url(&utils::page_address())
    }

    /// Copy the share link to the clipboard. If that's not possible the result's message carries the link instead.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub async fn share(&self) -> ShareResult {
        share::share(self.share_url()).await
    }

    /// The history as an export file's contents.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn export_json(&self) -> Result<String, JsValue> {
        Ok(export_json(&self.history.history(), Utc::now()).map_err(ActionError::from)?)
    }

    /// Download the history as `calculator-history-<date>.json`.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn export_history(&self) -> Result<(), JsValue> {
        self.export_history_inner()
            .inspect_err(|e| log::error!("Error exporting history: {e}"))?;
        Ok(())
    }

    /// Replace the history with the contents of an export file. Returns the number of entries imported.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn import_history(&self, contents: String) -> Result<usize, JsValue> {
        let imported = import_json(&contents)
            .map_err(ActionError::from)
            .inspect_err(|e| log::error!("Error importing history: {e}"))?;
        let count = imported.len();
        utils::spawn_write(self.history.replace_history(imported));
        Ok(count)
    }

    /// The last `days` days of usage (30 by default), oldest first.
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn usage_window(&self, days: Option<u32>) -> UsageWindowView {
        let usage = UsageTracker::new(self.history.cache()).usage();
        let window = tally::usage_window(
            &usage,
            Utc::now().date_naive(),
            days.unwrap_or(USAGE_WINDOW_DAYS),
        );

        UsageWindowView {
            days: window
                .days
                .iter()
                .map(|day| UsageDayView {
                    date: day.date.to_string(),
                    count: day.count,
                    intensity: intensity_class(window.intensity(day)).to_string(),
                })
                .collect(),
            total: window.total,
            peak: window.peak,
        }
    }

    /// Call `callback` whenever the history changes. Returns a key for [`Calculator::unsubscribe`].
    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn subscribe(&self, callback: js_sys::Function) -> u64 {
        let key = self.history.register_listener(move |_| {
            let this = JsValue::null();
            let _ = callback.call0(&this);
        });
        key.data().as_ffi()
    }

    #[cfg_attr(target_arch = "wasm32", wasm_bindgen)]
    pub fn unsubscribe(&self, key: u64) {
        let key: ListenerKey = KeyData::from_ffi(key).into();
        self.history.unregister_listener(key);
    }
}

impl Calculator {
    fn apply_operator_key(&self, key: &str) -> bool {
        let Some(operator) = Operator::from_key(key) else {
            return false;
        };
        self.keypad.borrow_mut().apply_operator(operator);
        true
    }

    fn export_history_inner(&self) -> Result<(), ActionError> {
        let now = Utc::now();
        let contents = export_json(&self.history.history(), now)?;
        share::download(&export_file_name(now), &contents)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, tsify::Tsify, Serialize, Deserialize)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct HistoryEntryView {
    pub expression: String,
    pub result: f64,
    /// `result` as the display shows it, e.g. `Infinity`.
    pub display: String,
    pub timestamp: String,
}

impl From<&HistoryEntry> for HistoryEntryView {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            expression: entry.expression.clone(),
            result: entry.result,
            display: format_number(entry.result),
            timestamp: entry.timestamp.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, tsify::Tsify, Serialize, Deserialize)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct SyncState {
    pub syncing: bool,
    pub last_write: Option<String>,
}

fn describe_outcome(outcome: WriteOutcome) -> String {
    match outcome {
        WriteOutcome::Stored => "Synced".to_string(),
        WriteOutcome::Created(identity) => format!("Synced as {identity}"),
        WriteOutcome::Skipped => "Saved on this device".to_string(),
        WriteOutcome::Failed(reason) => format!("Saved on this device, sync failed: {reason}"),
    }
}

#[derive(Clone, Debug, PartialEq, Eq, tsify::Tsify, Serialize, Deserialize)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct UsageDayView {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: u32,
    /// `empty`, `low`, `medium`, `high` or `very-high`
    pub intensity: String,
}

#[derive(Clone, Debug, PartialEq, Eq, tsify::Tsify, Serialize, Deserialize)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub struct UsageWindowView {
    pub days: Vec<UsageDayView>,
    pub total: u64,
    pub peak: u32,
}

fn intensity_class(intensity: Intensity) -> &'static str {
    match intensity {
        Intensity::Empty => "empty",
        Intensity::Low => "low",
        Intensity::Medium => "medium",
        Intensity::High => "high",
        Intensity::VeryHigh => "very-high",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_view_spells_out_non_finite_results() {
        let view = HistoryEntryView::from(&HistoryEntry::new("5 ÷ 0", f64::INFINITY, "9:00:00 AM"));
        assert_eq!(view.display, "Infinity");
        assert_eq!(view.expression, "5 ÷ 0");
    }

    #[test]
    fn outcomes_read_naturally() {
        assert_eq!(describe_outcome(WriteOutcome::Stored), "Synced");
        assert_eq!(
            describe_outcome(WriteOutcome::Failed("timeout".to_string())),
            "Saved on this device, sync failed: timeout"
        );
    }

    #[test]
    fn intensity_classes() {
        assert_eq!(intensity_class(Intensity::VeryHigh), "very-high");
        assert_eq!(intensity_class(Intensity::Empty), "empty");
    }
}
