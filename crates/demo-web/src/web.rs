//! DOM controls, session startup and the animation frame loop

use std::{cell::RefCell, rc::Rc};

use vidgpu::{Effect, FrameRequestMode, Session, SessionToken, Settings, SettingsInbox, SourceSelection, SurfaceRequest};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{Document, Element, HtmlCanvasElement, HtmlElement, HtmlInputElement, HtmlOptionElement, HtmlSelectElement};

use crate::player::HtmlVideoPlayer;

const DEFAULT_VIDEO_URL: &str = "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

#[derive(Default)]
struct App {
    canvas: Option<HtmlCanvasElement>,
    status: Option<Element>,
    settings: Settings,
    selection: SourceSelection<web_sys::File>,
    session: Option<Session<HtmlVideoPlayer>>,
    inbox: Option<SettingsInbox>,
    /// Token of the session currently initializing
    pending: Option<SessionToken>,
    /// Set while an async operation has the session checked out
    busy: bool,
}

type SharedApp = Rc<RefCell<App>>;

impl App {
    fn report(&self, message: &str) {
        if let Some(status) = self.status.as_ref() {
            status.set_text_content(Some(message));
        }
    }

    fn fit_canvas(&self) {
        if let (Some(canvas), Some((width, height))) = (&self.canvas, self.session.as_ref().and_then(|session| session.output_dimensions())) {
            canvas.set_width(width);
            canvas.set_height(height);
        }
    }

    fn update_settings(&mut self, update: impl FnOnce(&mut Settings)) {
        update(&mut self.settings);
        if let Some(inbox) = self.inbox.as_ref() {
            inbox.submit(self.settings.clone());
        }
    }
}

#[wasm_bindgen(start)]
pub fn run() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    tracing_wasm::set_as_global_default();

    if let Err(e) = run_app() {
        tracing::error!(error = ?e, "failed to start demo");
    }
}

fn run_app() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;

    let canvas = document.create_element("canvas")?.dyn_into::<HtmlCanvasElement>()?;
    canvas.style().set_property("display", "block")?;
    canvas.style().set_property("margin", "auto")?;
    let container = get_or_create(&document, "canvas-container")?;
    container.set_inner_html("");
    container.append_child(&canvas)?;

    let controls = get_or_create(&document, "controls")?;
    controls.set_inner_html("");
    let status = document.create_element("div")?;
    status.set_id("status");

    let app: SharedApp = Rc::new(RefCell::new(App {
        canvas: Some(canvas),
        status: Some(status.clone()),
        ..Default::default()
    }));

    setup_source_controls(&document, &controls, app.clone())?;
    setup_playback_controls(&document, &controls, app.clone())?;
    setup_effect_controls(&document, &controls, app.clone())?;
    setup_comparison_controls(&document, &controls, app.clone())?;
    controls.append_child(&status)?;

    start_render_loop(app);
    Ok(())
}

fn get_or_create(document: &Document, id: &str) -> Result<Element, JsValue> {
    if let Some(element) = document.get_element_by_id(id) {
        return Ok(element);
    }
    let element = document.create_element("div")?;
    element.set_id(id);
    if let Some(html) = element.dyn_ref::<HtmlElement>() {
        html.style().set_property("text-align", "center")?;
        html.style().set_property("margin", "20px")?;
    }
    document.body().ok_or("document has no body")?.append_child(&element)?;
    Ok(element)
}

fn append_label(document: &Document, parent: &Element, text: &str) -> Result<(), JsValue> {
    let label = document.create_element("label")?;
    label.set_text_content(Some(text));
    parent.append_child(&label)?;
    Ok(())
}

fn on_event(element: &Element, event: &str, handler: impl FnMut(web_sys::Event) + 'static) -> Result<(), JsValue> {
    let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web_sys::Event)>);
    element.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
    closure.forget();
    Ok(())
}

fn event_target<T: JsCast>(event: &web_sys::Event) -> Option<T> {
    event.target()?.dyn_into::<T>().ok()
}

fn setup_source_controls(document: &Document, controls: &Element, app: SharedApp) -> Result<(), JsValue> {
    let row = document.create_element("div")?;

    append_label(document, &row, "Video URL: ")?;
    let url_input = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
    url_input.set_type("url");
    url_input.set_size(60);
    url_input.set_value(DEFAULT_VIDEO_URL);
    row.append_child(&url_input)?;

    let load_button = document.create_element("button")?;
    load_button.set_text_content(Some("Load"));
    row.append_child(&load_button)?;
    let load_app = app.clone();
    on_event(&load_button, "click", move |_| {
        load_app.borrow_mut().selection.select_url(url_input.value());
        start_or_replace(load_app.clone());
    })?;

    append_label(document, &row, " or file: ")?;
    let file_input = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
    file_input.set_type("file");
    file_input.set_accept("video/*");
    row.append_child(&file_input)?;
    on_event(&file_input, "change", move |event| {
        let Some(file) = event_target::<HtmlInputElement>(&event).and_then(|input| input.files()).and_then(|files| files.get(0)) else {
            return;
        };
        app.borrow_mut().selection.select_file(file);
        start_or_replace(app.clone());
    })?;

    controls.append_child(&row)?;
    Ok(())
}

fn setup_playback_controls(document: &Document, controls: &Element, app: SharedApp) -> Result<(), JsValue> {
    let row = document.create_element("div")?;

    let play_button = document.create_element("button")?;
    play_button.set_text_content(Some("Play"));
    row.append_child(&play_button)?;
    let play_app = app.clone();
    on_event(&play_button, "click", move |_| {
        let app = play_app.clone();
        spawn_local(async move {
            let Some(mut session) = checkout(&app) else {
                return;
            };
            let result = session.play().await;
            checkin(&app, session);
            if let Err(e) = result {
                app.borrow().report(&format!("Playback failed: {e}"));
            }
        });
    })?;

    let pause_button = document.create_element("button")?;
    pause_button.set_text_content(Some("Pause"));
    row.append_child(&pause_button)?;
    let pause_app = app.clone();
    on_event(&pause_button, "click", move |_| {
        if let Some(session) = pause_app.borrow_mut().session.as_mut() {
            if let Err(e) = session.pause() {
                tracing::warn!(error = %e, "pause failed");
            }
        }
    })?;

    append_label(document, &row, " Frame request: ")?;
    let mode_select = document.create_element("select")?.dyn_into::<HtmlSelectElement>()?;
    for (value, text) in [("requestVideoFrameCallback", "Per video frame"), ("requestAnimationFrame", "Per display refresh")] {
        let option = HtmlOptionElement::new_with_text_and_value(text, value)?;
        mode_select.add_with_html_option_element(&option)?;
    }
    row.append_child(&mode_select)?;
    on_event(&mode_select, "change", move |event| {
        let Some(select) = event_target::<HtmlSelectElement>(&event) else {
            return;
        };
        let mode = match select.value().as_str() {
            "requestAnimationFrame" => FrameRequestMode::AnimationFrame,
            _ => FrameRequestMode::VideoFrameCallback,
        };
        app.borrow_mut().update_settings(|settings| settings.request_frame = mode);
    })?;

    controls.append_child(&row)?;
    Ok(())
}

fn setup_effect_controls(document: &Document, controls: &Element, app: SharedApp) -> Result<(), JsValue> {
    let row = document.create_element("div")?;

    append_label(document, &row, "Effect: ")?;
    let effect_select = document.create_element("select")?.dyn_into::<HtmlSelectElement>()?;
    for effect in Effect::ALL {
        let option = HtmlOptionElement::new_with_text_and_value(effect.name(), effect.name())?;
        effect_select.add_with_html_option_element(&option)?;
    }
    row.append_child(&effect_select)?;
    let effect_app = app.clone();
    on_event(&effect_select, "change", move |event| {
        if let Some(select) = event_target::<HtmlSelectElement>(&event) {
            effect_app.borrow_mut().update_settings(|settings| settings.effect = select.value());
        }
    })?;

    let coefficients: [(&str, &str, f32, fn(&mut Settings, f32)); 3] = [
        (" Deblur: ", "0.1", 2.0, |settings, value| settings.deblur_coef = value),
        (" Denoise intensity: ", "0.01", 0.2, |settings, value| settings.denoise_coef = value),
        (" Denoise spatial: ", "0.1", 2.0, |settings, value| settings.denoise_coef2 = value),
    ];
    for (label, step, initial, apply) in coefficients {
        append_label(document, &row, label)?;
        let input = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
        input.set_type("number");
        input.set_step(step);
        input.set_value_as_number(initial as f64);
        row.append_child(&input)?;
        let input_app = app.clone();
        on_event(&input, "change", move |event| {
            let Some(input) = event_target::<HtmlInputElement>(&event) else {
                return;
            };
            let value = input.value_as_number();
            if value.is_finite() {
                input_app.borrow_mut().update_settings(|settings| apply(settings, value as f32));
            }
        })?;
    }

    controls.append_child(&row)?;
    Ok(())
}

fn setup_comparison_controls(document: &Document, controls: &Element, app: SharedApp) -> Result<(), JsValue> {
    let row = document.create_element("div")?;

    let compare = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
    compare.set_type("checkbox");
    compare.set_id("compare");
    row.append_child(&compare)?;
    let label = document.create_element("label")?;
    label.set_text_content(Some("Compare with original "));
    label.set_attribute("for", "compare")?;
    row.append_child(&label)?;
    let compare_app = app.clone();
    on_event(&compare, "change", move |event| {
        if let Some(input) = event_target::<HtmlInputElement>(&event) {
            let checked = input.checked();
            compare_app.borrow_mut().update_settings(|settings| settings.compare_on = checked);
        }
    })?;

    let split = document.create_element("input")?.dyn_into::<HtmlInputElement>()?;
    split.set_type("range");
    split.set_min("0");
    split.set_max("100");
    split.set_value("50");
    row.append_child(&split)?;
    on_event(&split, "input", move |event| {
        if let Some(input) = event_target::<HtmlInputElement>(&event) {
            let ratio = input.value_as_number() as f32;
            app.borrow_mut().update_settings(|settings| settings.split_ratio = ratio);
        }
    })?;

    controls.append_child(&row)?;
    Ok(())
}

/// Takes the session out of the app for an async operation
fn checkout(app: &SharedApp) -> Option<Session<HtmlVideoPlayer>> {
    let mut app = app.borrow_mut();
    if app.busy {
        return None;
    }
    let session = app.session.take()?;
    app.busy = true;
    Some(session)
}

fn checkin(app: &SharedApp, session: Session<HtmlVideoPlayer>) {
    let mut app = app.borrow_mut();
    app.session = Some(session);
    app.busy = false;
    app.fit_canvas();
}

/// Starts a session for the current selection, or swaps the source of the running one
fn start_or_replace(app: SharedApp) {
    spawn_local(async move {
        if let Some(mut session) = checkout(&app) {
            let selection = app.borrow().selection.clone();
            let result = session.replace_source(&selection).await;
            checkin(&app, session);
            match result {
                Ok(()) => app.borrow().report(""),
                Err(e) => app.borrow().report(&format!("Failed to load video: {e}")),
            }
            return;
        }
        if app.borrow().busy {
            return;
        }

        // A newer selection supersedes an initialization still in flight
        let (canvas, selection, settings, token) = {
            let mut state = app.borrow_mut();
            if let Some(previous) = state.pending.take() {
                previous.cancel();
            }
            let token = SessionToken::new();
            state.pending = Some(token.clone());
            (state.canvas.clone(), state.selection.clone(), state.settings.clone(), token)
        };
        let Some(canvas) = canvas else {
            return;
        };

        let document = match web_sys::window().and_then(|window| window.document()) {
            Some(document) => document,
            None => return,
        };
        let player = match HtmlVideoPlayer::new(&document) {
            Ok(player) => player,
            Err(e) => {
                app.borrow().report(&format!("Failed to create video element: {e:?}"));
                return;
            }
        };

        let size = (canvas.width(), canvas.height());
        let request = SurfaceRequest::Window {
            target: wgpu::SurfaceTarget::Canvas(canvas),
            size,
        };
        match Session::init(request, player, &selection, settings, &token).await {
            Ok(session) => {
                let mut state = app.borrow_mut();
                state.pending = None;
                state.inbox = Some(session.settings_inbox());
                state.session = Some(session);
                state.fit_canvas();
                state.report("");
            }
            Err(vidgpu::SessionError::Cancelled) => tracing::info!("superseded session initialization cancelled"),
            Err(e) => app.borrow().report(&format!("Failed to start: {e}")),
        }
    });
}

fn start_render_loop(app: SharedApp) {
    fn request_animation_frame(f: &Closure<dyn FnMut()>) {
        if let Some(window) = web_sys::window() {
            if let Err(e) = window.request_animation_frame(f.as_ref().unchecked_ref()) {
                tracing::error!(error = ?e, "failed to request animation frame");
            }
        }
    }

    let f: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
    let g = f.clone();

    *g.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        {
            let mut state = app.borrow_mut();
            let result = state.session.as_mut().map(|session| session.on_display_refresh());
            match result {
                Some(Ok(_)) => {
                    let canvas_size = state.canvas.as_ref().map(|canvas| (canvas.width(), canvas.height()));
                    let output = state.session.as_ref().and_then(|session| session.output_dimensions());
                    if output.is_some() && canvas_size != output {
                        state.fit_canvas();
                    }
                }
                Some(Err(e)) => {
                    state.report(&format!("Session stopped: {e}"));
                    if let Some(mut session) = state.session.take() {
                        session.teardown();
                    }
                    state.inbox = None;
                }
                None => {}
            }
        }
        if let Some(closure) = f.borrow().as_ref() {
            request_animation_frame(closure);
        }
    }) as Box<dyn FnMut()>));

    if let Some(closure) = g.borrow().as_ref() {
        request_animation_frame(closure);
    }
}
