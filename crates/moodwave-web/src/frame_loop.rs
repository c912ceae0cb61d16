//! `requestAnimationFrame` driver with explicit cancellation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type FrameClosure = Closure<dyn FnMut(f64)>;

pub struct FrameLoop {
    pending: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<FrameClosure>>>,
}

impl FrameLoop {
    /// Calls `on_frame` with the frame timestamp in milliseconds until stopped.
    pub fn start(mut on_frame: impl FnMut(f64) + 'static) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or("No window")?;
        let pending = Rc::new(Cell::new(None));
        let callback: Rc<RefCell<Option<FrameClosure>>> = Rc::new(RefCell::new(None));

        let slot = Rc::downgrade(&callback);
        let next_frame = Rc::clone(&pending);
        let frame_window = window.clone();
        let closure = Closure::<dyn FnMut(f64)>::new(move |timestamp: f64| {
            next_frame.set(None);
            on_frame(timestamp);
            // `on_frame` may have stopped the loop, which empties the slot.
            let Some(slot) = slot.upgrade() else { return };
            let guard = slot.borrow();
            if let Some(closure) = guard.as_ref() {
                next_frame.set(request_frame(&frame_window, closure).ok());
            }
        });
        pending.set(Some(request_frame(&window, &closure)?));
        *callback.borrow_mut() = Some(closure);

        Ok(Self { pending, callback })
    }

    pub fn is_running(&self) -> bool {
        self.callback.borrow().is_some()
    }

    pub fn stop(&self) {
        if let Some(handle) = self.pending.take() {
            if let Some(window) = web_sys::window() {
                window.cancel_animation_frame(handle).ok();
            }
        }
        // The closure may be the one currently executing; release it after this task.
        if let Some(closure) = self.callback.borrow_mut().take() {
            wasm_bindgen_futures::spawn_local(async move { drop(closure) });
        }
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn request_frame(window: &web_sys::Window, closure: &FrameClosure) -> Result<i32, JsValue> {
    window.request_animation_frame(closure.as_ref().unchecked_ref())
}
