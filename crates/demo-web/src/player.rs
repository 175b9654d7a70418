//! [`MediaPlayer`] backed by an HTML video element

use std::{cell::Cell, rc::Rc};

use vidgpu::{FrameError, FrameSourceError, MediaPlayer, PlaybackState, SourceRef};
use wasm_bindgen::{JsCast, prelude::*};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, HtmlVideoElement};

use crate::frame_callback::CallbackSlot;

/// `HTMLMediaElement.HAVE_CURRENT_DATA`
const HAVE_CURRENT_DATA: u16 = 2;

type FrameCallback = Closure<dyn FnMut(JsValue, JsValue)>;

pub struct HtmlVideoPlayer {
    video: HtmlVideoElement,
    object_url: Option<String>,
    /// Frames reported by `requestVideoFrameCallback`
    presented: Rc<Cell<u64>>,
    /// The self-rearming frame callback and its pending registration
    frame_callback: Option<CallbackSlot<FrameCallback>>,
}

impl HtmlVideoPlayer {
    /// Creates a video element inside `#video-container`
    pub fn new(document: &Document) -> Result<Self, JsValue> {
        let video = document.create_element("video")?.dyn_into::<HtmlVideoElement>()?;
        video.set_cross_origin(Some("anonymous"));
        video.set_controls(true);
        video.set_plays_inline(true);

        let container = match document.get_element_by_id("video-container") {
            Some(container) => container,
            None => {
                let container = document.create_element("div")?;
                container.set_id("video-container");
                document.body().ok_or("document has no body")?.append_child(&container)?;
                container
            }
        };
        container.set_inner_html("");
        container.append_child(&video)?;

        let presented = Rc::new(Cell::new(0));
        let frame_callback = Self::watch_presented_frames(&video, presented.clone())?;
        if frame_callback.is_none() {
            tracing::warn!("requestVideoFrameCallback is unavailable, counting frames per refresh");
        }

        Ok(Self {
            video,
            object_url: None,
            presented,
            frame_callback,
        })
    }

    /// Counts presented frames through `requestVideoFrameCallback`, if the browser has it
    fn watch_presented_frames(video: &HtmlVideoElement, presented: Rc<Cell<u64>>) -> Result<Option<CallbackSlot<FrameCallback>>, JsValue> {
        let Some(request) = video_method(video, "requestVideoFrameCallback")? else {
            return Ok(None);
        };

        let slot = CallbackSlot::new();
        let rearm = slot.rearm_handle();
        let target = video.clone();
        let rearm_request = request.clone();
        slot.install(Closure::wrap(Box::new(move |_now: JsValue, _metadata: JsValue| {
            presented.set(presented.get() + 1);
            rearm.rearm(|closure| match rearm_request.call1(&target, closure.as_ref().unchecked_ref()) {
                Ok(id) => callback_id(&id),
                Err(e) => {
                    tracing::error!(error = ?e, "failed to re-register video frame callback");
                    None
                }
            });
        }) as Box<dyn FnMut(JsValue, JsValue)>));

        slot.register(|closure| request.call1(video, closure.as_ref().unchecked_ref()).map(|id| callback_id(&id)))?;
        Ok(Some(slot))
    }

    /// Cancels the pending frame callback and frees it
    fn stop_watching_frames(&mut self) {
        let Some(slot) = self.frame_callback.take() else {
            return;
        };
        if let Some(id) = slot.take_pending() {
            match video_method(&self.video, "cancelVideoFrameCallback") {
                Ok(Some(cancel)) => {
                    if let Err(e) = cancel.call1(&self.video, &JsValue::from(id)) {
                        tracing::warn!(error = ?e, "failed to cancel video frame callback");
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = ?e, "failed to look up cancelVideoFrameCallback"),
            }
        }
        slot.clear();
    }

    fn revoke_object_url(&mut self) {
        if let Some(url) = self.object_url.take() {
            let _ = web_sys::Url::revoke_object_url(&url);
        }
    }
}

fn video_method(video: &HtmlVideoElement, name: &str) -> Result<Option<js_sys::Function>, JsValue> {
    let method = js_sys::Reflect::get(video, &JsValue::from_str(name))?;
    Ok(method.dyn_ref::<js_sys::Function>().cloned())
}

fn callback_id(id: &JsValue) -> Option<u32> {
    id.as_f64().map(|id| id as u32)
}

fn rejection_message(error: &JsValue) -> String {
    error
        .dyn_ref::<js_sys::Error>()
        .map(|error| String::from(error.message()))
        .unwrap_or_else(|| format!("{error:?}"))
}

impl MediaPlayer for HtmlVideoPlayer {
    type File = web_sys::File;

    fn load(&mut self, source: &SourceRef<web_sys::File>) -> Result<(), FrameSourceError> {
        self.revoke_object_url();
        match source {
            SourceRef::Url(url) => self.video.set_src(url),
            SourceRef::File(file) => {
                let url = web_sys::Url::create_object_url_with_blob(file).map_err(|e| FrameSourceError::Decode(rejection_message(&e)))?;
                self.video.set_src(&url);
                self.object_url = Some(url);
            }
        }
        self.video.load();
        self.presented.set(0);
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) {
        self.video.set_muted(muted);
    }

    fn set_looping(&mut self, looping: bool) {
        self.video.set_loop(looping);
    }

    async fn play(&mut self) -> Result<(), FrameSourceError> {
        let promise = self.video.play().map_err(|e| FrameSourceError::Decode(rejection_message(&e)))?;
        match JsFuture::from(promise).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let name = js_sys::Reflect::get(&e, &JsValue::from_str("name")).ok().and_then(|name| name.as_string());
                match name.as_deref() {
                    Some("NotAllowedError") => Err(FrameSourceError::PlaybackRejected(rejection_message(&e))),
                    _ => Err(FrameSourceError::Decode(rejection_message(&e))),
                }
            }
        }
    }

    fn pause(&mut self) {
        if let Err(e) = self.video.pause() {
            tracing::warn!(error = ?e, "failed to pause video");
        }
    }

    fn state(&self) -> PlaybackState {
        if self.video.ended() {
            PlaybackState::Ended
        } else if self.video.paused() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    fn video_dimensions(&self) -> Option<(u32, u32)> {
        match (self.video.video_width(), self.video.video_height()) {
            (0, _) | (_, 0) => None,
            size => Some(size),
        }
    }

    fn presented_frames(&mut self) -> u64 {
        if self.frame_callback.is_none() && self.state() == PlaybackState::Playing {
            self.presented.set(self.presented.get() + 1);
        }
        self.presented.get()
    }

    fn copy_current_frame(&mut self, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Result<(), FrameError> {
        if self.video.ready_state() < HAVE_CURRENT_DATA {
            return Err(FrameError::Ingest("video has no current frame".to_string()));
        }

        queue.copy_external_image_to_texture(
            &wgpu::CopyExternalImageSourceInfo {
                source: wgpu::ExternalImageSource::HTMLVideoElement(self.video.clone()),
                origin: wgpu::Origin2d::ZERO,
                flip_y: false,
            },
            wgpu::CopyExternalImageDestInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
                color_space: wgpu::PredefinedColorSpace::Srgb,
                premultiplied_alpha: false,
            },
            wgpu::Extent3d {
                width: texture.width(),
                height: texture.height(),
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn close(&mut self) {
        self.stop_watching_frames();
        self.pause();
        self.video.remove_attribute("src").ok();
        self.video.load();
        self.revoke_object_url();
    }
}

impl Drop for HtmlVideoPlayer {
    fn drop(&mut self) {
        self.stop_watching_frames();
        self.revoke_object_url();
    }
}
