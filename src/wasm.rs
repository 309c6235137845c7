//! Browser-only helpers. Panics in WASM otherwise end in an opaque `unreachable` trap; the hook
//! forwards the panic message to the browser console.

pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}
