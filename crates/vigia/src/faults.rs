//! Fault Reporter
//!
//! Captures uncaught page errors, unhandled rejections, drawing-surface
//! failures and failing frame callbacks into a bounded history.
//!
//! Nothing is patched globally. Surfaces and frame schedulers are guarded
//! by wrapping them explicitly:
//!
//! ```rust
//! use std::rc::Rc;
//! use vigia::mock::{MockPage, MockSurface};
//! use vigia::platform::DrawSurface;
//! use vigia::FaultReporter;
//!
//! let page = Rc::new(MockPage::new());
//! let reporter = FaultReporter::new().with_game_name("Snake");
//! reporter.init(&page);
//!
//! let mut canvas = reporter.guard_surface(MockSurface::new(320.0, 240.0).failing("fillRect"));
//! canvas.fill_rect(0.0, 0.0, 10.0, 10.0).unwrap(); // swallowed, recorded
//! page.dispatch_error("ReferenceError: player is not defined");
//!
//! assert_eq!(reporter.error_stats().total, 2);
//! ```

use crate::cancel::CancelToken;
use crate::config::{FaultConfig, DEFAULT_GAME_NAME};
use crate::platform::{
    Clock, DrawSurface, ErrorEvents, FrameCallback, FrameScheduler, PageError, PerformanceClock,
};
use crate::result::VigiaResult;
use crate::ring::RingBuffer;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Source tag for window `error` events
pub const SOURCE_WINDOW_ERROR: &str = "window.error";
/// Source tag for `unhandledrejection` events
pub const SOURCE_UNHANDLED_REJECTION: &str = "unhandledrejection";
/// Source tag for failing frame callbacks
pub const SOURCE_ANIMATION_FRAME: &str = "requestAnimationFrame";
/// Source tag for `fillRect` failures
pub const SOURCE_FILL_RECT: &str = "canvas.fillRect";
/// Source tag for `clearRect` failures
pub const SOURCE_CLEAR_RECT: &str = "canvas.clearRect";
/// Source tag for `drawImage` failures
pub const SOURCE_DRAW_IMAGE: &str = "canvas.drawImage";

/// Result returned by guarded frame callbacks
pub type FrameResult = Result<(), Box<dyn std::error::Error>>;

/// A captured fault
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultRecord {
    /// Page clock time of capture (ms)
    pub timestamp_ms: f64,
    /// Where the fault came from (e.g. `window.error`)
    pub source: String,
    /// Error message
    pub message: String,
    /// Stack trace, if known
    pub stack: Option<String>,
}

/// Summary returned by [`FaultReporter::error_stats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    /// Records currently retained
    pub total: usize,
    /// Newest records, oldest first
    pub recent: Vec<FaultRecord>,
    /// Retained record count per source tag
    pub by_source: BTreeMap<String, usize>,
}

impl FaultRecord {
    /// Serialize one record
    pub fn to_json(&self) -> VigiaResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl ErrorStats {
    /// Serialize for a debug overlay or log shipper
    pub fn to_json(&self) -> VigiaResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

struct FaultState {
    game_name: String,
    config: FaultConfig,
    clock: Rc<dyn Clock>,
    records: RingBuffer<FaultRecord>,
    initialized: bool,
}

impl FaultState {
    fn record(&mut self, error: PageError, source: &str) -> FaultRecord {
        let record = FaultRecord {
            timestamp_ms: self.clock.now_ms(),
            source: source.to_string(),
            message: error.message,
            stack: error.stack,
        };
        tracing::error!(
            game = %self.game_name,
            source = %record.source,
            stack = record.stack.as_deref().unwrap_or(""),
            "{}",
            record.message
        );
        self.records.push(record.clone());
        record
    }
}

/// Bounded fault history plus the listeners and guards that feed it
///
/// Cloning yields another handle to the same history.
#[derive(Clone)]
pub struct FaultReporter {
    state: Rc<RefCell<FaultState>>,
}

impl fmt::Debug for FaultReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("FaultReporter")
            .field("game_name", &state.game_name)
            .field("records", &state.records.len())
            .field("initialized", &state.initialized)
            .finish()
    }
}

impl Default for FaultReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultReporter {
    /// Create a reporter with default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FaultConfig::default())
    }

    /// Create a reporter with explicit settings
    #[must_use]
    pub fn with_config(config: FaultConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(FaultState {
                game_name: DEFAULT_GAME_NAME.to_string(),
                records: RingBuffer::new(config.capacity),
                config,
                clock: Rc::new(PerformanceClock::new()),
                initialized: false,
            })),
        }
    }

    /// Set the display name used in diagnostics
    #[must_use]
    pub fn with_game_name(self, name: impl Into<String>) -> Self {
        self.state.borrow_mut().game_name = name.into();
        self
    }

    /// Subscribe to page error and rejection events
    ///
    /// Record timestamps come from the page clock from here on. Calling
    /// this again is a no-op.
    pub fn init<P>(&self, page: &Rc<P>)
    where
        P: ErrorEvents + Clock + 'static,
    {
        {
            let mut state = self.state.borrow_mut();
            if state.initialized {
                tracing::debug!(game = %state.game_name, "fault reporter already initialized");
                return;
            }
            state.initialized = true;
            state.clock = Rc::clone(page) as Rc<dyn Clock>;
        }

        page.on_error(self.handler(SOURCE_WINDOW_ERROR));
        page.on_unhandled_rejection(self.handler(SOURCE_UNHANDLED_REJECTION));

        tracing::info!(game = %self.game_name(), "fault reporter initialized");
    }

    fn handler(&self, source: &'static str) -> Box<dyn FnMut(PageError)> {
        let state = Rc::downgrade(&self.state);
        Box::new(move |error| {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().record(error, source);
            }
        })
    }

    /// Whether [`FaultReporter::init`] has run
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.borrow().initialized
    }

    /// Display name
    #[must_use]
    pub fn game_name(&self) -> String {
        self.state.borrow().game_name.clone()
    }

    /// Record a fault, evicting the oldest beyond capacity
    pub fn handle_error(&self, error: impl Into<PageError>, source: &str) -> FaultRecord {
        self.state.borrow_mut().record(error.into(), source)
    }

    /// Total retained, newest few, and per-source counts
    #[must_use]
    pub fn error_stats(&self) -> ErrorStats {
        let state = self.state.borrow();
        let mut by_source = BTreeMap::new();
        for record in state.records.iter() {
            *by_source.entry(record.source.clone()).or_insert(0) += 1;
        }
        ErrorStats {
            total: state.records.len(),
            recent: state
                .records
                .newest(state.config.recent_count)
                .cloned()
                .collect(),
            by_source,
        }
    }

    /// Every retained record, oldest first
    #[must_use]
    pub fn records(&self) -> Vec<FaultRecord> {
        self.state.borrow().records.to_vec()
    }

    /// Drop the history
    pub fn clear_errors(&self) {
        self.state.borrow_mut().records.clear();
        tracing::debug!("fault history cleared");
    }

    /// Wrap a drawing surface so its failures are recorded, not returned
    #[must_use]
    pub fn guard_surface<S: DrawSurface>(&self, surface: S) -> GuardedSurface<S> {
        GuardedSurface {
            inner: surface,
            reporter: self.clone(),
        }
    }

    /// Wrap a frame scheduler so failing callbacks are recorded
    #[must_use]
    pub fn guard_frames<F: FrameScheduler>(&self, scheduler: Rc<F>) -> GuardedFrames<F> {
        GuardedFrames {
            inner: scheduler,
            reporter: self.clone(),
        }
    }

    /// Turn a fallible frame callback into one that reports its error
    pub fn guard_frame_callback<C>(&self, callback: C) -> FrameCallback
    where
        C: FnOnce(f64) -> FrameResult + 'static,
    {
        let state = Rc::downgrade(&self.state);
        Box::new(move |timestamp| {
            if let Err(error) = callback(timestamp) {
                report_weak(&state, PageError::from_error(&*error), SOURCE_ANIMATION_FRAME);
            }
        })
    }
}

fn report_weak(state: &Weak<RefCell<FaultState>>, error: PageError, source: &str) {
    if let Some(state) = state.upgrade() {
        state.borrow_mut().record(error, source);
    }
}

/// Drawing surface whose failures are recorded and swallowed
///
/// A failed `fill_rect` is followed by a best-effort clear of the whole
/// surface; a failure of that clear is dropped silently.
pub struct GuardedSurface<S> {
    inner: S,
    reporter: FaultReporter,
}

impl<S: fmt::Debug> fmt::Debug for GuardedSurface<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedSurface")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<S> GuardedSurface<S> {
    /// The wrapped surface
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    /// The wrapped surface, mutably
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Unwrap
    #[must_use]
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn report(&self, error: &crate::result::VigiaError, source: &str) {
        self.reporter.handle_error(PageError::from_error(error), source);
    }
}

impl<S: DrawSurface> DrawSurface for GuardedSurface<S> {
    type Image = S::Image;

    fn width(&self) -> f64 {
        self.inner.width()
    }

    fn height(&self) -> f64 {
        self.inner.height()
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()> {
        if let Err(error) = self.inner.fill_rect(x, y, w, h) {
            self.report(&error, SOURCE_FILL_RECT);
            // recovery failures are not reported
            let _ = self.inner.clear_all();
        }
        Ok(())
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()> {
        if let Err(error) = self.inner.clear_rect(x, y, w, h) {
            self.report(&error, SOURCE_CLEAR_RECT);
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &Self::Image, dx: f64, dy: f64) -> VigiaResult<()> {
        if let Err(error) = self.inner.draw_image(image, dx, dy) {
            self.report(&error, SOURCE_DRAW_IMAGE);
        }
        Ok(())
    }
}

/// Frame scheduler whose callbacks report errors instead of propagating
pub struct GuardedFrames<F> {
    inner: Rc<F>,
    reporter: FaultReporter,
}

impl<F> Clone for GuardedFrames<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            reporter: self.reporter.clone(),
        }
    }
}

impl<F> fmt::Debug for GuardedFrames<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedFrames")
            .field("reporter", &self.reporter)
            .finish()
    }
}

impl<F: FrameScheduler + 'static> GuardedFrames<F> {
    /// Schedule a fallible callback for the next frame
    pub fn request_animation_frame<C>(&self, callback: C) -> VigiaResult<()>
    where
        C: FnOnce(f64) -> FrameResult + 'static,
    {
        self.inner
            .request_animation_frame(self.reporter.guard_frame_callback(callback))
    }

    /// Run `callback` every frame until `token` is cancelled
    ///
    /// The loop re-arms before reporting, so a failing frame never ends it.
    pub fn run_loop<C>(&self, callback: C, token: CancelToken) -> VigiaResult<()>
    where
        C: FnMut(f64) -> FrameResult + 'static,
    {
        arm_loop(
            Rc::downgrade(&self.inner),
            Rc::downgrade(&self.reporter.state),
            Rc::new(RefCell::new(callback)),
            token,
        )
    }
}

fn arm_loop<F, C>(
    scheduler: Weak<F>,
    state: Weak<RefCell<FaultState>>,
    callback: Rc<RefCell<C>>,
    token: CancelToken,
) -> VigiaResult<()>
where
    F: FrameScheduler + 'static,
    C: FnMut(f64) -> FrameResult + 'static,
{
    let Some(target) = scheduler.upgrade() else {
        return Ok(());
    };
    target.request_animation_frame(Box::new(move |timestamp| {
        if token.is_cancelled() {
            return;
        }
        let outcome = {
            let mut callback = callback.borrow_mut();
            (*callback)(timestamp)
        };
        if let Err(error) = arm_loop(scheduler, state.clone(), callback, token) {
            report_weak(&state, PageError::from_error(&error), SOURCE_ANIMATION_FRAME);
        }
        if let Err(error) = outcome {
            report_weak(&state, PageError::from_error(&*error), SOURCE_ANIMATION_FRAME);
        }
    }))
}
