//! Browser host for `cadence-scheduler`: `setTimeout` drives the slices,
//! `performance.now()` is the clock and microtasks run finally commands.

mod finally;
mod timer;

pub use finally::MicrotaskFinally;
pub use timer::{WindowTimer, WindowTimerFactory};

use cadence_scheduler::{BrowserBackedScheduler, NoopController, SchedulerConfig};
use std::rc::Rc;
use thiserror::Error;
use wasm_bindgen::prelude::*;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("no global `window` exists")]
    NoWindow,

    #[error("`window.performance` is unavailable")]
    NoPerformance,
}

/// A scheduler bound to the current window's timers.
pub fn browser_scheduler(config: SchedulerConfig) -> Result<Rc<BrowserBackedScheduler>, WebError> {
    let timers = WindowTimerFactory::new()?;
    Ok(BrowserBackedScheduler::with_config(
        &timers,
        config,
        Rc::new(NoopController),
    ))
}

/// Forwards Rust panics to the browser console.
#[wasm_bindgen]
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}
