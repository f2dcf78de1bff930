//! Deterministic page host.
//!
//! `MockPage` implements every platform trait against manual time: frames
//! run only when the test calls [`MockPage::run_frame`], timers fire only
//! inside [`MockPage::advance_time`]. Callbacks are taken out of their
//! queues before they run, so they may freely schedule, clear, or touch the
//! page again.

use super::dom::{MockDom, NodeId};
use crate::platform::{
    Clock, Document, ErrorEvents, ErrorHandler, FrameCallback, FrameScheduler, HeapUsage,
    KeyboardEvents, MediaQueries, MemoryProbe, PageError, TimerId, TimerScheduler,
};
use crate::result::{VigiaError, VigiaResult};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;

enum TimerCallback {
    Once(Box<dyn FnOnce()>),
    Repeat(Box<dyn FnMut()>),
}

struct PendingTimer {
    id: TimerId,
    due_ms: f64,
    period_ms: Option<f64>,
    callback: TimerCallback,
}

#[derive(Debug, Clone, PartialEq)]
enum MemoryState {
    Unsupported,
    Reading(HeapUsage),
    Failing(String),
}

#[derive(Default)]
struct MediaState {
    matches: bool,
    listeners: Vec<Box<dyn FnMut(bool)>>,
}

type KeyHandler = Box<dyn FnMut(&str) -> bool>;

/// In-memory page implementing every platform trait
pub struct MockPage {
    now_ms: Cell<f64>,
    frames: RefCell<Vec<FrameCallback>>,
    frames_run: Cell<u64>,
    timers: RefCell<Vec<PendingTimer>>,
    next_timer: Cell<i32>,
    firing: Cell<Option<TimerId>>,
    firing_cleared: Cell<bool>,
    memory: RefCell<MemoryState>,
    memory_reads: Cell<u64>,
    error_handlers: RefCell<Vec<ErrorHandler>>,
    rejection_handlers: RefCell<Vec<ErrorHandler>>,
    key_handlers: RefCell<Vec<KeyHandler>>,
    media: RefCell<BTreeMap<String, MediaState>>,
    media_unsupported: Cell<bool>,
    dom: MockDom,
}

impl fmt::Debug for MockPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockPage")
            .field("now_ms", &self.now_ms.get())
            .field("pending_frames", &self.frames.borrow().len())
            .field("pending_timers", &self.timers.borrow().len())
            .field("memory", &self.memory.borrow())
            .field("dom", &self.dom)
            .finish()
    }
}

impl Default for MockPage {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPage {
    /// Create a page at time zero with no memory API
    #[must_use]
    pub fn new() -> Self {
        Self {
            now_ms: Cell::new(0.0),
            frames: RefCell::new(Vec::new()),
            frames_run: Cell::new(0),
            timers: RefCell::new(Vec::new()),
            next_timer: Cell::new(1),
            firing: Cell::new(None),
            firing_cleared: Cell::new(false),
            memory: RefCell::new(MemoryState::Unsupported),
            memory_reads: Cell::new(0),
            error_handlers: RefCell::new(Vec::new()),
            rejection_handlers: RefCell::new(Vec::new()),
            key_handlers: RefCell::new(Vec::new()),
            media: RefCell::new(BTreeMap::new()),
            media_unsupported: Cell::new(false),
            dom: MockDom::new(),
        }
    }

    /// Expose a memory API reporting `usage`
    #[must_use]
    pub fn with_memory(self, usage: HeapUsage) -> Self {
        self.set_memory(usage);
        self
    }

    /// The document
    #[must_use]
    pub const fn dom(&self) -> &MockDom {
        &self.dom
    }

    // ------------------------------------------------------------------
    // Time and frames
    // ------------------------------------------------------------------

    /// Set the clock without firing timers
    pub fn set_time(&self, now_ms: f64) {
        self.now_ms.set(now_ms);
    }

    /// Number of frame callbacks waiting for the next frame
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.frames.borrow().len()
    }

    /// Total frames delivered so far
    #[must_use]
    pub fn frames_run(&self) -> u64 {
        self.frames_run.get()
    }

    /// Deliver one animation frame at `timestamp_ms`
    ///
    /// Callbacks requested while this frame runs wait for the next one.
    /// Returns the number of callbacks run.
    pub fn run_frame(&self, timestamp_ms: f64) -> usize {
        self.now_ms.set(timestamp_ms);
        let callbacks = std::mem::take(&mut *self.frames.borrow_mut());
        let count = callbacks.len();
        for callback in callbacks {
            callback(timestamp_ms);
        }
        self.frames_run.set(self.frames_run.get() + 1);
        count
    }

    /// Deliver `count` frames spaced uniformly over `duration_ms`
    ///
    /// The last frame lands exactly at `now + duration_ms`.
    pub fn drive_frames(&self, count: u32, duration_ms: f64) {
        let start = self.now_ms.get();
        for i in 1..=count {
            let t = start + duration_ms * f64::from(i) / f64::from(count);
            self.run_frame(t);
        }
    }

    /// Number of scheduled timeouts and intervals
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Move the clock forward, firing due timers in order
    pub fn advance_time(&self, delta_ms: f64) {
        let target = self.now_ms.get() + delta_ms;
        while let Some(mut timer) = self.take_next_due(target) {
            self.now_ms.set(timer.due_ms);
            self.firing.set(Some(timer.id));
            self.firing_cleared.set(false);
            match timer.callback {
                TimerCallback::Once(callback) => callback(),
                TimerCallback::Repeat(mut callback) => {
                    callback();
                    if !self.firing_cleared.get() {
                        if let Some(period) = timer.period_ms {
                            timer.due_ms += period;
                            timer.callback = TimerCallback::Repeat(callback);
                            self.timers.borrow_mut().push(timer);
                        }
                    }
                }
            }
            self.firing.set(None);
        }
        self.now_ms.set(target);
    }

    fn take_next_due(&self, target: f64) -> Option<PendingTimer> {
        let mut timers = self.timers.borrow_mut();
        let index = timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_ms <= target)
            .min_by(|(_, a), (_, b)| {
                a.due_ms
                    .partial_cmp(&b.due_ms)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            })
            .map(|(i, _)| i)?;
        Some(timers.remove(index))
    }

    fn push_timer(&self, delay_ms: u32, period_ms: Option<f64>, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_timer.get());
        self.next_timer.set(id.0 + 1);
        self.timers.borrow_mut().push(PendingTimer {
            id,
            due_ms: self.now_ms.get() + f64::from(delay_ms),
            period_ms,
            callback,
        });
        id
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    /// Report `usage` from now on
    pub fn set_memory(&self, usage: HeapUsage) {
        *self.memory.borrow_mut() = MemoryState::Reading(usage);
    }

    /// Make memory reads fail with `message`
    pub fn fail_memory(&self, message: &str) {
        *self.memory.borrow_mut() = MemoryState::Failing(message.to_string());
    }

    /// Number of `read_memory` calls so far
    #[must_use]
    pub fn memory_reads(&self) -> u64 {
        self.memory_reads.get()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Fire a window `error` event
    pub fn dispatch_error(&self, error: impl Into<PageError>) {
        dispatch(&self.error_handlers, &error.into());
    }

    /// Fire an `unhandledrejection` event
    pub fn dispatch_rejection(&self, reason: impl Into<PageError>) {
        dispatch(&self.rejection_handlers, &reason.into());
    }

    /// Press a key; returns whether any handler consumed it
    pub fn press_key(&self, key: &str) -> bool {
        let mut handlers = std::mem::take(&mut *self.key_handlers.borrow_mut());
        let mut consumed = false;
        for handler in &mut handlers {
            consumed |= handler(key);
        }
        restore(&self.key_handlers, handlers);
        consumed
    }

    /// Flip a media query, notifying listeners when the result changes
    pub fn set_media(&self, query: &str, matches: bool) {
        let mut listeners = {
            let mut media = self.media.borrow_mut();
            let state = media.entry(query.to_string()).or_default();
            if state.matches == matches {
                return;
            }
            state.matches = matches;
            std::mem::take(&mut state.listeners)
        };
        for listener in &mut listeners {
            listener(matches);
        }
        let mut media = self.media.borrow_mut();
        let state = media.entry(query.to_string()).or_default();
        listeners.append(&mut state.listeners);
        state.listeners = listeners;
    }

    /// Make `watch_media` fail, as on a page without `matchMedia`
    pub fn disable_media_queries(&self) {
        self.media_unsupported.set(true);
    }

    /// Listeners subscribed to `query`
    #[must_use]
    pub fn media_listeners(&self, query: &str) -> usize {
        self.media
            .borrow()
            .get(query)
            .map_or(0, |state| state.listeners.len())
    }
}

fn dispatch(handlers: &RefCell<Vec<ErrorHandler>>, error: &PageError) {
    let mut taken = std::mem::take(&mut *handlers.borrow_mut());
    for handler in &mut taken {
        handler(error.clone());
    }
    restore(handlers, taken);
}

/// Put taken handlers back ahead of any registered while they ran
fn restore<T>(slot: &RefCell<Vec<T>>, mut taken: Vec<T>) {
    let mut current = slot.borrow_mut();
    taken.append(&mut current);
    *current = taken;
}

impl Clock for MockPage {
    fn now_ms(&self) -> f64 {
        self.now_ms.get()
    }
}

impl FrameScheduler for MockPage {
    fn request_animation_frame(&self, callback: FrameCallback) -> VigiaResult<()> {
        self.frames.borrow_mut().push(callback);
        Ok(())
    }
}

impl TimerScheduler for MockPage {
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> VigiaResult<TimerId> {
        if period_ms == 0 {
            return Err(VigiaError::Scheduler {
                message: "interval period must be positive".to_string(),
            });
        }
        Ok(self.push_timer(
            period_ms,
            Some(f64::from(period_ms)),
            TimerCallback::Repeat(callback),
        ))
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> VigiaResult<TimerId> {
        Ok(self.push_timer(delay_ms, None, TimerCallback::Once(callback)))
    }

    fn clear_timer(&self, id: TimerId) {
        if self.firing.get() == Some(id) {
            self.firing_cleared.set(true);
        }
        self.timers.borrow_mut().retain(|t| t.id != id);
    }
}

impl MemoryProbe for MockPage {
    fn supports_memory(&self) -> bool {
        *self.memory.borrow() != MemoryState::Unsupported
    }

    fn read_memory(&self) -> VigiaResult<HeapUsage> {
        self.memory_reads.set(self.memory_reads.get() + 1);
        match &*self.memory.borrow() {
            MemoryState::Unsupported => Err(VigiaError::MemoryUnavailable),
            MemoryState::Reading(usage) => Ok(*usage),
            MemoryState::Failing(message) => Err(VigiaError::MemoryRead {
                message: message.clone(),
            }),
        }
    }
}

impl ErrorEvents for MockPage {
    fn on_error(&self, handler: ErrorHandler) {
        self.error_handlers.borrow_mut().push(handler);
    }

    fn on_unhandled_rejection(&self, handler: ErrorHandler) {
        self.rejection_handlers.borrow_mut().push(handler);
    }
}

impl KeyboardEvents for MockPage {
    fn on_key_down(&self, handler: Box<dyn FnMut(&str) -> bool>) {
        self.key_handlers.borrow_mut().push(handler);
    }
}

impl MediaQueries for MockPage {
    fn watch_media(&self, query: &str, on_change: Box<dyn FnMut(bool)>) -> VigiaResult<bool> {
        if self.media_unsupported.get() {
            return Err(VigiaError::dom(format!("matchMedia unsupported for {query}")));
        }
        let mut media = self.media.borrow_mut();
        let state = media.entry(query.to_string()).or_default();
        state.listeners.push(on_change);
        Ok(state.matches)
    }
}

impl Document for MockPage {
    type Element = NodeId;

    fn query_all(&self, selector: &str) -> VigiaResult<Vec<NodeId>> {
        self.dom.query_all(selector)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.dom.by_id(id)
    }

    fn root_element(&self) -> Option<NodeId> {
        Some(self.dom.root())
    }

    fn create_element(&self, tag: &str) -> VigiaResult<NodeId> {
        Ok(self.dom.create(tag))
    }

    fn append_to_head(&self, element: &NodeId) -> VigiaResult<()> {
        self.dom.append(self.dom.head(), *element);
        Ok(())
    }

    fn append_to_body(&self, element: &NodeId) -> VigiaResult<()> {
        self.dom.append(self.dom.body(), *element);
        Ok(())
    }

    fn append_child(&self, parent: &NodeId, child: &NodeId) -> VigiaResult<()> {
        self.dom.append(*parent, *child);
        Ok(())
    }

    fn remove(&self, element: &NodeId) {
        self.dom.detach(*element);
    }

    fn tag_name(&self, element: &NodeId) -> String {
        self.dom.tag(*element).to_ascii_lowercase()
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.dom.attr(*element, name)
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) -> VigiaResult<()> {
        self.dom.set_attr(*element, name, value);
        Ok(())
    }

    fn remove_attribute(&self, element: &NodeId, name: &str) -> VigiaResult<()> {
        self.dom.remove_attr(*element, name);
        Ok(())
    }

    fn text_content(&self, element: &NodeId) -> String {
        self.dom.text(*element)
    }

    fn set_text_content(&self, element: &NodeId, text: &str) {
        self.dom.set_text(*element, text);
    }

    fn add_class(&self, element: &NodeId, class: &str) -> VigiaResult<()> {
        self.dom.add_class(*element, class);
        Ok(())
    }

    fn remove_class(&self, element: &NodeId, class: &str) -> VigiaResult<()> {
        self.dom.remove_class(*element, class);
        Ok(())
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.dom.has_class(*element, class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    mod frame_tests {
        use super::*;

        #[test]
        fn test_run_frame_delivers_timestamp() {
            let page = MockPage::new();
            let seen = Rc::new(Cell::new(0.0));
            let sink = Rc::clone(&seen);
            page.request_animation_frame(Box::new(move |t| sink.set(t)))
                .unwrap();
            assert_eq!(page.run_frame(16.0), 1);
            assert!((seen.get() - 16.0).abs() < f64::EPSILON);
            assert!((page.now_ms() - 16.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_rearm_waits_for_next_frame() {
            let page = Rc::new(MockPage::new());
            let count = Rc::new(Cell::new(0));
            fn arm(page: &Rc<MockPage>, count: &Rc<Cell<u32>>) {
                let (p, c) = (Rc::clone(page), Rc::clone(count));
                page.request_animation_frame(Box::new(move |_| {
                    c.set(c.get() + 1);
                    arm(&p, &c);
                }))
                .unwrap();
            }
            arm(&page, &count);
            page.drive_frames(5, 100.0);
            assert_eq!(count.get(), 5);
            assert_eq!(page.pending_frames(), 1);
            assert_eq!(page.frames_run(), 5);
            assert!((page.now_ms() - 100.0).abs() < 1e-9);
        }
    }

    mod timer_tests {
        use super::*;

        #[test]
        fn test_timeout_fires_once() {
            let page = MockPage::new();
            let fired = Rc::new(Cell::new(0));
            let f = Rc::clone(&fired);
            page.set_timeout(1000, Box::new(move || f.set(f.get() + 1)))
                .unwrap();
            page.advance_time(999.0);
            assert_eq!(fired.get(), 0);
            page.advance_time(1.0);
            assert_eq!(fired.get(), 1);
            page.advance_time(5000.0);
            assert_eq!(fired.get(), 1);
            assert_eq!(page.pending_timers(), 0);
        }

        #[test]
        fn test_interval_repeats_with_clock() {
            let page = Rc::new(MockPage::new());
            let stamps = Rc::new(RefCell::new(Vec::new()));
            let (p, s) = (Rc::clone(&page), Rc::clone(&stamps));
            page.set_interval(5000, Box::new(move || s.borrow_mut().push(p.now_ms())))
                .unwrap();
            page.advance_time(16_000.0);
            assert_eq!(*stamps.borrow(), vec![5000.0, 10_000.0, 15_000.0]);
            assert!((page.now_ms() - 16_000.0).abs() < f64::EPSILON);
        }

        #[test]
        fn test_clear_interval_from_inside() {
            let page = Rc::new(MockPage::new());
            let fired = Rc::new(Cell::new(0));
            let id_slot = Rc::new(Cell::new(None));
            let (p, f, slot) = (Rc::clone(&page), Rc::clone(&fired), Rc::clone(&id_slot));
            let id = page
                .set_interval(
                    10,
                    Box::new(move || {
                        f.set(f.get() + 1);
                        if f.get() == 2 {
                            if let Some(id) = slot.get() {
                                p.clear_timer(id);
                            }
                        }
                    }),
                )
                .unwrap();
            id_slot.set(Some(id));
            page.advance_time(100.0);
            assert_eq!(fired.get(), 2);
            assert_eq!(page.pending_timers(), 0);
        }

        #[test]
        fn test_zero_interval_rejected() {
            let page = MockPage::new();
            assert!(page.set_interval(0, Box::new(|| {})).is_err());
        }

        #[test]
        fn test_ordering_by_due_time() {
            let page = MockPage::new();
            let order = Rc::new(RefCell::new(Vec::new()));
            for (delay, tag) in [(30, "c"), (10, "a"), (20, "b")] {
                let o = Rc::clone(&order);
                page.set_timeout(delay, Box::new(move || o.borrow_mut().push(tag)))
                    .unwrap();
            }
            page.advance_time(30.0);
            assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
        }
    }

    mod memory_tests {
        use super::*;

        #[test]
        fn test_unsupported_by_default() {
            let page = MockPage::new();
            assert!(!page.supports_memory());
            assert!(matches!(
                page.read_memory(),
                Err(VigiaError::MemoryUnavailable)
            ));
        }

        #[test]
        fn test_reading_and_failing() {
            let page = MockPage::new().with_memory(HeapUsage::new(1, 2, 3));
            assert!(page.supports_memory());
            assert_eq!(page.read_memory().unwrap(), HeapUsage::new(1, 2, 3));
            page.fail_memory("detached");
            assert!(page.supports_memory());
            assert!(page.read_memory().is_err());
            assert_eq!(page.memory_reads(), 2);
        }
    }

    mod event_tests {
        use super::*;

        #[test]
        fn test_error_dispatch() {
            let page = MockPage::new();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let s = Rc::clone(&seen);
            page.on_error(Box::new(move |e| s.borrow_mut().push(e.message)));
            page.dispatch_error("boom");
            page.dispatch_rejection("ignored");
            assert_eq!(*seen.borrow(), vec!["boom".to_string()]);
        }

        #[test]
        fn test_press_key() {
            let page = MockPage::new();
            page.on_key_down(Box::new(|key: &str| key == "F1"));
            assert!(page.press_key("F1"));
            assert!(!page.press_key("Enter"));
        }

        #[test]
        fn test_media_change_notifies_once() {
            let page = MockPage::new();
            let seen = Rc::new(RefCell::new(Vec::new()));
            let s = Rc::clone(&seen);
            let initial = page
                .watch_media("(forced-colors: active)", Box::new(move |m| s.borrow_mut().push(m)))
                .unwrap();
            assert!(!initial);
            page.set_media("(forced-colors: active)", true);
            page.set_media("(forced-colors: active)", true);
            page.set_media("(forced-colors: active)", false);
            assert_eq!(*seen.borrow(), vec![true, false]);
            assert_eq!(page.media_listeners("(forced-colors: active)"), 1);
        }

        #[test]
        fn test_disabled_media_queries() {
            let page = MockPage::new();
            page.disable_media_queries();
            let result = page.watch_media("(forced-colors: active)", Box::new(|_| {}));
            assert!(matches!(result, Err(VigiaError::Dom { .. })));
            assert_eq!(page.media_listeners("(forced-colors: active)"), 0);
        }
    }
}
