#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// Routes `log` records to the browser console. Safe to call more than once.
#[cfg(feature = "console_log")]
pub fn init_logging() {
    if console_log::init_with_level(log::Level::Debug).is_err() {
        web_sys::console::warn_1(&"logger already initialised".into());
    }
}

#[cfg(not(feature = "console_log"))]
pub fn init_logging() {}
