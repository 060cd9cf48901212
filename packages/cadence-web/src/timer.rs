use crate::WebError;
use cadence_scheduler::{HostTimer, HostTimerFactory, Millis, SliceCallback};
use std::cell::Cell;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Performance, Window};

#[derive(Default)]
struct Registration {
    handle: Cell<Option<i32>>,
    fire_time: Cell<Option<Millis>>,
}

/// Creates `setTimeout`-backed timers for the current window.
pub struct WindowTimerFactory {
    window: Window,
    performance: Performance,
}

impl WindowTimerFactory {
    pub fn new() -> Result<Self, WebError> {
        let window = web_sys::window().ok_or(WebError::NoWindow)?;
        let performance = window.performance().ok_or(WebError::NoPerformance)?;
        Ok(Self {
            window,
            performance,
        })
    }
}

impl HostTimerFactory for WindowTimerFactory {
    fn create(&self, mut callback: SliceCallback) -> Box<dyn HostTimer> {
        let registration = Rc::new(Registration::default());
        let fired = registration.clone();
        let closure = Closure::wrap(Box::new(move || {
            fired.handle.set(None);
            fired.fire_time.set(None);
            // Nobody up the JS stack can take the error, so it ends here.
            if let Err(err) = callback() {
                tracing::error!(error = %err, "scheduler slice failed");
            }
        }) as Box<dyn FnMut()>);

        Box::new(WindowTimer {
            window: self.window.clone(),
            performance: self.performance.clone(),
            registration,
            closure,
        })
    }
}

/// One `setTimeout` registration at a time.
pub struct WindowTimer {
    window: Window,
    performance: Performance,
    registration: Rc<Registration>,
    closure: Closure<dyn FnMut()>,
}

impl HostTimer for WindowTimer {
    fn now(&self) -> Millis {
        self.performance.now() as Millis
    }

    fn schedule(&self) {
        self.schedule_at(self.now());
    }

    fn schedule_at(&self, when: Millis) {
        self.cancel();
        let delay = i32::try_from(when.saturating_sub(self.now())).unwrap_or(i32::MAX);
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                self.closure.as_ref().unchecked_ref(),
                delay,
            ) {
            Ok(handle) => {
                self.registration.handle.set(Some(handle));
                self.registration.fire_time.set(Some(when));
            }
            Err(err) => tracing::error!(error = ?err, when, "setTimeout failed"),
        }
    }

    fn cancel(&self) {
        if let Some(handle) = self.registration.handle.take() {
            self.window.clear_timeout_with_handle(handle);
        }
        self.registration.fire_time.set(None);
    }

    fn scheduled_fire_time(&self) -> Option<Millis> {
        self.registration.fire_time.get()
    }
}

impl Drop for WindowTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
