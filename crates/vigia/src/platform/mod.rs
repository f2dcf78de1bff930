//! Host Page Abstraction
//!
//! The browser primitives Vigia consumes, each behind a narrow trait so the
//! components run unchanged against a real page (`web::BrowserPage`) or the
//! deterministic in-memory page (`mock::MockPage`).
//!
//! Everything here is single-threaded: callbacks are `'static` boxed
//! closures delivered serially by the host event loop.

pub mod dom;
pub mod surface;

pub use dom::{Document, KeyboardEvents, MediaQueries};
pub use surface::DrawSurface;

use crate::result::VigiaResult;
use serde::{Deserialize, Serialize};

/// Monotonic millisecond clock (`performance.now()`)
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin
    fn now_ms(&self) -> f64;
}

/// One-shot animation frame callback receiving the frame timestamp
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// `requestAnimationFrame`
pub trait FrameScheduler {
    /// Run `callback` before the next repaint
    fn request_animation_frame(&self, callback: FrameCallback) -> VigiaResult<()>;
}

/// Handle returned by [`TimerScheduler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub i32);

/// `setInterval` / `setTimeout`
pub trait TimerScheduler {
    /// Run `callback` every `period_ms` until cleared
    fn set_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> VigiaResult<TimerId>;

    /// Run `callback` once after `delay_ms`
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> VigiaResult<TimerId>;

    /// Cancel a pending timeout or interval; unknown ids are ignored
    fn clear_timer(&self, id: TimerId);
}

/// Heap usage as reported by `performance.memory`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeapUsage {
    /// `usedJSHeapSize`
    pub used_bytes: u64,
    /// `totalJSHeapSize`
    pub total_bytes: u64,
    /// `jsHeapSizeLimit`
    pub limit_bytes: u64,
}

impl HeapUsage {
    /// Create a usage reading
    #[must_use]
    pub const fn new(used_bytes: u64, total_bytes: u64, limit_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            limit_bytes,
        }
    }

    /// Fraction of the heap limit in use; 0 when the limit is unknown
    #[must_use]
    pub fn pressure(&self) -> f64 {
        if self.limit_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.limit_bytes as f64
        }
    }
}

/// Optional heap introspection
pub trait MemoryProbe {
    /// Whether the page exposes heap usage at all
    fn supports_memory(&self) -> bool;

    /// Read the current heap usage
    fn read_memory(&self) -> VigiaResult<HeapUsage>;
}

/// An uncaught error or rejection reason delivered by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageError {
    /// Error message
    pub message: String,
    /// Stack trace, when the host provides one
    pub stack: Option<String>,
}

impl PageError {
    /// Create an error with no stack
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    /// Attach a stack trace
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Capture a Rust error, using its source chain as the "stack"
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {cause}"));
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            stack: if chain.is_empty() {
                None
            } else {
                Some(chain.join("\n"))
            },
        }
    }
}

impl From<&str> for PageError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for PageError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Handler for uncaught page errors
pub type ErrorHandler = Box<dyn FnMut(PageError)>;

/// Window `error` and `unhandledrejection` events
pub trait ErrorEvents {
    /// Subscribe to uncaught synchronous errors
    fn on_error(&self, handler: ErrorHandler);

    /// Subscribe to unhandled promise rejections
    fn on_unhandled_rejection(&self, handler: ErrorHandler);
}

/// A page offering every primitive the three components use
pub trait Host:
    Clock
    + FrameScheduler
    + TimerScheduler
    + MemoryProbe
    + ErrorEvents
    + Document
    + KeyboardEvents
    + MediaQueries
{
}

impl<T> Host for T where
    T: Clock
        + FrameScheduler
        + TimerScheduler
        + MemoryProbe
        + ErrorEvents
        + Document
        + KeyboardEvents
        + MediaQueries
{
}

/// High-resolution page clock
///
/// `performance.now()` in the browser; a process-relative `Instant` natively.
#[derive(Debug, Clone, Copy)]
pub struct PerformanceClock {
    #[cfg(not(target_arch = "wasm32"))]
    origin: std::time::Instant,
}

impl PerformanceClock {
    /// Create a clock anchored at the current instant
    #[must_use]
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_arch = "wasm32"))]
            origin: std::time::Instant::now(),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    #[cfg(target_arch = "wasm32")]
    fn now_ms(&self) -> f64 {
        web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or(0.0)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}
