use crate::WebError;
use cadence_scheduler::FinallyHost;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Window;

/// Runs finally commands as microtasks, after the current task returns.
pub struct MicrotaskFinally {
    window: Window,
}

impl MicrotaskFinally {
    pub fn new() -> Result<Self, WebError> {
        let window = web_sys::window().ok_or(WebError::NoWindow)?;
        Ok(Self { window })
    }
}

impl FinallyHost for MicrotaskFinally {
    fn schedule_finally(&self, command: Box<dyn FnOnce()>) {
        let callback = Closure::once_into_js(move || command());
        self.window
            .queue_microtask(callback.unchecked_ref::<js_sys::Function>());
    }
}
