//! Browser host backed by `web-sys`.
//!
//! `BrowserPage` implements every platform trait on the live `window` and
//! `document`. Event listeners registered here stay attached for the page
//! lifetime; interval closures are owned until their timer is cleared.

use crate::platform::{
    Clock, Document, DrawSurface, ErrorEvents, ErrorHandler, FrameCallback, FrameScheduler,
    HeapUsage, KeyboardEvents, MediaQueries, MemoryProbe, PageError, TimerId, TimerScheduler,
};
use crate::result::{VigiaError, VigiaResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Element, ErrorEvent, HtmlCanvasElement, HtmlImageElement,
    KeyboardEvent, MediaQueryListEvent, PromiseRejectionEvent,
};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(method, catch, js_name = fillRect)]
    fn try_fill_rect(
        this: &CanvasRenderingContext2d,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    ) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = clearRect)]
    fn try_clear_rect(
        this: &CanvasRenderingContext2d,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
    ) -> Result<(), JsValue>;
}

/// Best-effort text for a thrown JS value
fn js_message(value: &JsValue) -> String {
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn js_stack(value: &JsValue) -> Option<String> {
    js_sys::Reflect::get(value, &JsValue::from_str("stack"))
        .ok()
        .and_then(|stack| stack.as_string())
}

fn page_error(value: &JsValue, fallback: String) -> PageError {
    let message = if value.is_undefined() || value.is_null() {
        fallback
    } else {
        js_message(value)
    };
    let error = PageError::new(message);
    match js_stack(value) {
        Some(stack) => error.with_stack(stack),
        None => error,
    }
}

fn dom_error(value: &JsValue) -> VigiaError {
    VigiaError::dom(js_message(value))
}

fn scheduler_error(value: &JsValue) -> VigiaError {
    VigiaError::Scheduler {
        message: js_message(value),
    }
}

/// The live browser page
pub struct BrowserPage {
    window: web_sys::Window,
    document: web_sys::Document,
    intervals: RefCell<HashMap<i32, Closure<dyn FnMut()>>>,
}

impl fmt::Debug for BrowserPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserPage")
            .field("intervals", &self.intervals.borrow().len())
            .finish_non_exhaustive()
    }
}

impl BrowserPage {
    /// Attach to the current `window` and `document`
    pub fn new() -> VigiaResult<Self> {
        let window = web_sys::window().ok_or_else(|| VigiaError::dom("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| VigiaError::dom("no document"))?;
        Ok(Self {
            window,
            document,
            intervals: RefCell::new(HashMap::new()),
        })
    }

    /// The 2D context of the canvas with `id`
    pub fn canvas_surface(&self, id: &str) -> VigiaResult<CanvasSurface> {
        let canvas = self
            .document
            .get_element_by_id(id)
            .ok_or_else(|| VigiaError::dom(format!("no element #{id}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| VigiaError::dom(format!("#{id} is not a canvas")))?;
        CanvasSurface::new(canvas)
    }

    fn memory_object(&self) -> Option<JsValue> {
        let performance = self.window.performance()?;
        let memory = js_sys::Reflect::get(&performance, &JsValue::from_str("memory")).ok()?;
        if memory.is_undefined() || memory.is_null() {
            None
        } else {
            Some(memory)
        }
    }
}

/// Attach `callback` for the page lifetime; JS owns the closure
fn listen(target: &web_sys::EventTarget, event: &str, callback: JsValue) {
    if let Err(error) = target.add_event_listener_with_callback(event, callback.unchecked_ref()) {
        tracing::warn!(event, error = %js_message(&error), "listener not attached");
    }
}

impl Clock for BrowserPage {
    fn now_ms(&self) -> f64 {
        self.window.performance().map_or(0.0, |p| p.now())
    }
}

impl FrameScheduler for BrowserPage {
    fn request_animation_frame(&self, callback: FrameCallback) -> VigiaResult<()> {
        let closure = Closure::once_into_js(move |timestamp: f64| callback(timestamp));
        self.window
            .request_animation_frame(closure.unchecked_ref())
            .map(|_| ())
            .map_err(|e| scheduler_error(&e))
    }
}

impl TimerScheduler for BrowserPage {
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> VigiaResult<TimerId> {
        let closure = Closure::wrap(callback);
        let id = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                i32::try_from(period_ms).unwrap_or(i32::MAX),
            )
            .map_err(|e| scheduler_error(&e))?;
        self.intervals.borrow_mut().insert(id, closure);
        Ok(TimerId(id))
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> VigiaResult<TimerId> {
        let closure = Closure::once_into_js(move || callback());
        self.window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.unchecked_ref(),
                i32::try_from(delay_ms).unwrap_or(i32::MAX),
            )
            .map(TimerId)
            .map_err(|e| scheduler_error(&e))
    }

    fn clear_timer(&self, id: TimerId) {
        self.window.clear_interval_with_handle(id.0);
        self.window.clear_timeout_with_handle(id.0);
        let released = self.intervals.borrow_mut().remove(&id.0);
        if let Some(closure) = released {
            // An interval may clear itself; free its closure after the current task.
            let release = Closure::once_into_js(move || drop(closure));
            if let Err(error) = self
                .window
                .set_timeout_with_callback(release.unchecked_ref())
            {
                tracing::debug!(error = %js_message(&error), "interval closure leaked");
            }
        }
    }
}

impl MemoryProbe for BrowserPage {
    fn supports_memory(&self) -> bool {
        self.memory_object().is_some()
    }

    fn read_memory(&self) -> VigiaResult<HeapUsage> {
        let memory = self.memory_object().ok_or(VigiaError::MemoryUnavailable)?;
        let field = |name: &str| -> VigiaResult<u64> {
            js_sys::Reflect::get(&memory, &JsValue::from_str(name))
                .ok()
                .and_then(|v| v.as_f64())
                .map(|v| v as u64)
                .ok_or_else(|| VigiaError::MemoryRead {
                    message: format!("performance.memory.{name} unavailable"),
                })
        };
        Ok(HeapUsage::new(
            field("usedJSHeapSize")?,
            field("totalJSHeapSize")?,
            field("jsHeapSizeLimit")?,
        ))
    }
}

impl ErrorEvents for BrowserPage {
    fn on_error(&self, mut handler: ErrorHandler) {
        let closure = Closure::<dyn FnMut(ErrorEvent)>::new(move |event: ErrorEvent| {
            handler(page_error(&event.error(), event.message()));
        });
        listen(&self.window, "error", closure.into_js_value());
    }

    fn on_unhandled_rejection(&self, mut handler: ErrorHandler) {
        let closure =
            Closure::<dyn FnMut(PromiseRejectionEvent)>::new(move |event: PromiseRejectionEvent| {
                handler(page_error(&event.reason(), "Unhandled promise rejection".to_string()));
            });
        listen(&self.window, "unhandledrejection", closure.into_js_value());
    }
}

impl KeyboardEvents for BrowserPage {
    fn on_key_down(&self, mut handler: Box<dyn FnMut(&str) -> bool>) {
        let closure = Closure::<dyn FnMut(KeyboardEvent)>::new(move |event: KeyboardEvent| {
            if handler(&event.key()) {
                event.prevent_default();
            }
        });
        listen(&self.document, "keydown", closure.into_js_value());
    }
}

impl MediaQueries for BrowserPage {
    fn watch_media(&self, query: &str, mut on_change: Box<dyn FnMut(bool)>) -> VigiaResult<bool> {
        let list = self
            .window
            .match_media(query)
            .map_err(|e| dom_error(&e))?
            .ok_or_else(|| VigiaError::dom(format!("matchMedia unsupported for {query}")))?;
        let closure =
            Closure::<dyn FnMut(MediaQueryListEvent)>::new(move |event: MediaQueryListEvent| {
                on_change(event.matches());
            });
        listen(&list, "change", closure.into_js_value());
        Ok(list.matches())
    }
}

impl Document for BrowserPage {
    type Element = Element;

    fn query_all(&self, selector: &str) -> VigiaResult<Vec<Element>> {
        let list = self
            .document
            .query_selector_all(selector)
            .map_err(|e| dom_error(&e))?;
        Ok((0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect())
    }

    fn element_by_id(&self, id: &str) -> Option<Element> {
        self.document.get_element_by_id(id)
    }

    fn root_element(&self) -> Option<Element> {
        self.document.document_element()
    }

    fn create_element(&self, tag: &str) -> VigiaResult<Element> {
        self.document.create_element(tag).map_err(|e| dom_error(&e))
    }

    fn append_to_head(&self, element: &Element) -> VigiaResult<()> {
        let head = self
            .document
            .head()
            .ok_or_else(|| VigiaError::dom("document has no <head>"))?;
        head.append_child(element)
            .map(|_| ())
            .map_err(|e| dom_error(&e))
    }

    fn append_to_body(&self, element: &Element) -> VigiaResult<()> {
        let body = self
            .document
            .body()
            .ok_or_else(|| VigiaError::dom("document has no <body>"))?;
        body.append_child(element)
            .map(|_| ())
            .map_err(|e| dom_error(&e))
    }

    fn append_child(&self, parent: &Element, child: &Element) -> VigiaResult<()> {
        parent
            .append_child(child)
            .map(|_| ())
            .map_err(|e| dom_error(&e))
    }

    fn remove(&self, element: &Element) {
        element.remove();
    }

    fn tag_name(&self, element: &Element) -> String {
        element.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) -> VigiaResult<()> {
        element
            .set_attribute(name, value)
            .map_err(|e| dom_error(&e))
    }

    fn remove_attribute(&self, element: &Element, name: &str) -> VigiaResult<()> {
        element.remove_attribute(name).map_err(|e| dom_error(&e))
    }

    fn text_content(&self, element: &Element) -> String {
        element.text_content().unwrap_or_default()
    }

    fn set_text_content(&self, element: &Element, text: &str) {
        element.set_text_content(Some(text));
    }

    fn add_class(&self, element: &Element, class: &str) -> VigiaResult<()> {
        element.class_list().add_1(class).map_err(|e| dom_error(&e))
    }

    fn remove_class(&self, element: &Element, class: &str) -> VigiaResult<()> {
        element
            .class_list()
            .remove_1(class)
            .map_err(|e| dom_error(&e))
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }
}

/// A `<canvas>` 2D context whose drawing calls report exceptions
#[derive(Debug, Clone)]
pub struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl CanvasSurface {
    /// Acquire the 2D context of `canvas`
    pub fn new(canvas: HtmlCanvasElement) -> VigiaResult<Self> {
        let context = canvas
            .get_context("2d")
            .map_err(|e| VigiaError::surface("getContext", js_message(&e)))?
            .ok_or_else(|| VigiaError::surface("getContext", "2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| VigiaError::surface("getContext", "unexpected context type"))?;
        Ok(Self { canvas, context })
    }

    /// The underlying context
    #[must_use]
    pub const fn context(&self) -> &CanvasRenderingContext2d {
        &self.context
    }
}

impl DrawSurface for CanvasSurface {
    type Image = HtmlImageElement;

    fn width(&self) -> f64 {
        f64::from(self.canvas.width())
    }

    fn height(&self) -> f64 {
        f64::from(self.canvas.height())
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()> {
        self.context
            .try_fill_rect(x, y, w, h)
            .map_err(|e| VigiaError::surface("fillRect", js_message(&e)))
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()> {
        self.context
            .try_clear_rect(x, y, w, h)
            .map_err(|e| VigiaError::surface("clearRect", js_message(&e)))
    }

    fn draw_image(&mut self, image: &HtmlImageElement, dx: f64, dy: f64) -> VigiaResult<()> {
        self.context
            .draw_image_with_html_image_element(image, dx, dy)
            .map_err(|e| VigiaError::surface("drawImage", js_message(&e)))
    }
}
