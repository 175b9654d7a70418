//! Browser front end for vidgpu
//!
//! Builds the control panel, starts a session once a video source is chosen and drives it
//! from `requestAnimationFrame`. Control changes go through the session's settings inbox and
//! take effect between frame cycles.

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
mod frame_callback;
#[cfg(target_arch = "wasm32")]
mod player;
#[cfg(target_arch = "wasm32")]
mod web;
