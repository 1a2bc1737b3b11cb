//! Small helpers shared by the bindings.

use web_sys::DomStringList;

/// Installs the panic hook, when the `console_error_panic_hook` feature is on.
///
/// Called from the module start function, so Rust panics show up in the
/// browser console.
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Collects a `DOMStringList`, sorted.
pub(crate) fn sorted_names(list: &DomStringList) -> Vec<String> {
    let mut names: Vec<String> = (0..list.length()).filter_map(|i| list.item(i)).collect();
    names.sort();
    names
}

/// Writes a warning to the browser console.
pub(crate) fn console_warn(message: &str) {
    web_sys::console::warn_1(&message.into());
}
