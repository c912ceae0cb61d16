//! Browser bindings for the moodwave audio session.
//!
//! Implements the core's platform seams with `web-sys` and exposes
//! [`MoodPlayer`] to JavaScript.

use wasm_bindgen::prelude::*;

mod element;
mod frame_loop;
pub mod logger;
mod platform;
mod player;

pub use crate::element::{EventSink, WebMediaElement};
pub use crate::frame_loop::FrameLoop;
pub use crate::platform::{WebAnalyser, WebAudioPlatform, WebContext};
pub use crate::player::{MoodPlayer, VisualizerHandle};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    logger::init(log::LevelFilter::Info);
}
