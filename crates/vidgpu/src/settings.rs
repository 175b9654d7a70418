//! User settings and change detection
//!
//! [`Settings`] mirrors the control panel state one-to-one and (de)serializes with the
//! same camelCase keys the UI layer uses. [`SettingsChange`] classifies what a new
//! settings value requires from the session: a pipeline rebuild, an in-place uniform
//! write, or nothing.

use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};
use vidgpu_effects::EffectParams;

/// How the frame source signals that a new frame should be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FrameRequestMode {
    /// Once per unique decoded frame presented by the player
    #[default]
    #[serde(rename = "requestVideoFrameCallback")]
    VideoFrameCallback,
    /// On every display refresh while registered
    #[serde(rename = "requestAnimationFrame")]
    AnimationFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub request_frame: FrameRequestMode,
    /// Effect identifier; unknown names fall back to `Original`
    pub effect: String,
    pub deblur_coef: f32,
    pub denoise_coef: f32,
    pub denoise_coef2: f32,
    pub compare_on: bool,
    /// Comparison split position in percent of the output width
    pub split_ratio: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            request_frame: FrameRequestMode::default(),
            effect: "Original".to_string(),
            deblur_coef: 2.0,
            denoise_coef: 0.2,
            denoise_coef2: 2.0,
            compare_on: false,
            split_ratio: 50.0,
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Split position in [0, 1]
    pub fn split_fraction(&self) -> f32 {
        if self.split_ratio.is_nan() {
            return 0.5;
        }
        self.split_ratio.clamp(0.0, 100.0) / 100.0
    }

    pub fn effect_params(&self) -> EffectParams {
        EffectParams {
            deblur_strength: self.deblur_coef,
            denoise_intensity_sigma: self.denoise_coef,
            denoise_spatial_sigma: self.denoise_coef2,
        }
    }
}

/// What a transition between two settings values requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SettingsChange {
    /// Effect changed or comparison toggled: rebuild pipeline and bindings
    pub rebuild: bool,
    /// Comparison flag or split moved: rewrite comparison uniforms
    pub comparison: bool,
    /// Tuning coefficients changed: rewrite effect parameter buffers
    pub params: bool,
    /// Frame notification mode changed
    pub frame_request: bool,
}

impl SettingsChange {
    pub fn between(old: &Settings, new: &Settings) -> Self {
        Self {
            rebuild: old.effect != new.effect || old.compare_on != new.compare_on,
            comparison: old.compare_on != new.compare_on || old.split_fraction() != new.split_fraction(),
            params: old.effect_params() != new.effect_params(),
            frame_request: old.request_frame != new.request_frame,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the displayed image may differ, so one frame must be rendered even while paused
    pub fn needs_immediate_frame(&self) -> bool {
        self.rebuild || self.comparison || self.params
    }
}

/// Latest-wins mailbox for settings submitted while a frame cycle may be running
///
/// The session drains it between cycles, so a cycle always sees one consistent settings value.
#[derive(Debug, Clone, Default)]
pub struct SettingsInbox {
    pending: Rc<RefCell<Option<Settings>>>,
}

impl SettingsInbox {
    pub fn submit(&self, settings: Settings) {
        *self.pending.borrow_mut() = Some(settings);
    }

    pub fn take(&self) -> Option<Settings> {
        self.pending.borrow_mut().take()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}
