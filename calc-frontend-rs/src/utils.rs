use futures::future::LocalBoxFuture;
use tally::WriteOutcome;

pub fn set_panic_hook() {
    // When the `console_error_panic_hook` feature is enabled, we can call the
    // `set_panic_hook` function at least once during initialization, and then
    // we will get better error messages if our code ever panics.
    //
    // For more details see
    // https://github.com/rustwasm/console_error_panic_hook#readme
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

#[cfg(target_arch = "wasm32")]
pub(crate) type DeviceStorage = tally::WebStorage;
#[cfg(not(target_arch = "wasm32"))]
pub(crate) type DeviceStorage = tally::MemoryStorage;

pub(crate) fn device_storage() -> DeviceStorage {
    #[cfg(target_arch = "wasm32")]
    {
        tally::WebStorage::local()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        tally::MemoryStorage::new()
    }
}

/// Run a remote write in the background. Its outcome is recorded by the engine.
pub(crate) fn spawn_write(write: LocalBoxFuture<'static, WriteOutcome>) {
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(async move {
        write.await;
    });
    #[cfg(not(target_arch = "wasm32"))]
    {
        futures::executor::block_on(write);
    }
}

/// The page's query string, e.g. `?session=calc_k3j2h1g0f_lx9a2b`.
pub(crate) fn page_query() -> Option<String> {
    #[cfg(target_arch = "wasm32")]
    {
        web_sys::window()?
            .location()
            .search()
            .inspect_err(|e| log::warn!("Could not read the page's query string: {e:?}"))
            .ok()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        None
    }
}

/// Origin and path of the current page, without the query string.
pub(crate) fn page_address() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        let address = web_sys::window().and_then(|window| {
            let location = window.location();
            Some(format!("{}{}", location.origin().ok()?, location.pathname().ok()?))
        });
        address.unwrap_or_default()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        String::new()
    }
}

/// The local time of day, the way history entries are stamped.
pub(crate) fn time_of_day() -> String {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::new_0()
            .to_locale_time_string("en-US")
            .into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        chrono::Local::now().format("%-I:%M:%S %p").to_string()
    }
}
