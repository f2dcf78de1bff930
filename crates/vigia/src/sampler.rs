//! Frame-rate and Memory Sampler
//!
//! Derives a frames-per-second sample once per second from the animation
//! frame loop and, where the page exposes `performance.memory`, a heap
//! snapshot every few seconds. Both series are rolling windows.
//!
//! Each series cycles Idle → Accumulating → Reporting: frames (or ticks)
//! accumulate until the reporting condition holds, a sample is appended,
//! and accumulation restarts.
//!
//! Unlike a bare `requestAnimationFrame` loop, [`Sampler::init`] hands back
//! a [`SamplerHandle`] whose `stop()` ends both loops cooperatively.

use crate::cancel::CancelToken;
use crate::config::{SamplerConfig, DEFAULT_GAME_NAME, MIB};
use crate::platform::{Clock, FrameScheduler, HeapUsage, MemoryProbe, TimerId, TimerScheduler};
use crate::result::VigiaResult;
use crate::ring::RingBuffer;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Heap usage at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Bytes in use
    pub used_bytes: u64,
    /// Bytes allocated
    pub total_bytes: u64,
    /// Heap size limit
    pub limit_bytes: u64,
    /// Page clock time of the reading (ms)
    pub timestamp_ms: f64,
}

impl MemorySnapshot {
    /// Stamp a usage reading
    #[must_use]
    pub const fn new(usage: HeapUsage, timestamp_ms: f64) -> Self {
        Self {
            used_bytes: usage.used_bytes,
            total_bytes: usage.total_bytes,
            limit_bytes: usage.limit_bytes,
            timestamp_ms,
        }
    }

    /// Used heap in MiB
    #[must_use]
    pub fn used_mib(&self) -> f64 {
        self.used_bytes as f64 / MIB as f64
    }
}

/// Summary returned by [`Sampler::performance_report`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Display name
    pub game: String,
    /// Page clock time at `init` (ms)
    pub load_time_ms: Option<f64>,
    /// Most recent FPS sample
    pub current_fps: Option<u32>,
    /// Mean over the window, rounded
    pub average_fps: Option<u32>,
    /// Lowest sample in the window
    pub min_fps: Option<u32>,
    /// Highest sample in the window
    pub max_fps: Option<u32>,
    /// FPS samples retained
    pub fps_samples: usize,
    /// Memory samples retained
    pub memory_samples: usize,
    /// Most recent heap snapshot
    pub latest_memory: Option<MemorySnapshot>,
}

impl PerformanceReport {
    /// Serialize for a debug overlay or telemetry beacon
    pub fn to_json(&self) -> VigiaResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Advisory derived from the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformanceSuggestion {
    /// Mean FPS below the quality threshold
    ReduceQuality,
    /// Mean FPS below the critical threshold
    CriticalFrameRate,
    /// Heap usage above the restart threshold
    RestartForMemory,
}

impl PerformanceSuggestion {
    /// Player-facing text
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ReduceQuality => {
                "Consider lowering graphics quality or disabling visual effects"
            }
            Self::CriticalFrameRate => {
                "Frame rate is very low; close other tabs or applications"
            }
            Self::RestartForMemory => "High memory usage detected; consider restarting the game",
        }
    }
}

impl fmt::Display for PerformanceSuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Stops the sampling loops started by [`Sampler::init`]
#[derive(Debug, Clone)]
pub struct SamplerHandle {
    token: CancelToken,
}

impl SamplerHandle {
    /// End both loops; takes effect at their next iteration
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            tracing::debug!("sampler stop requested");
        }
        self.token.cancel();
    }

    /// Whether `stop` was called
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

struct SamplerState {
    game_name: String,
    config: SamplerConfig,
    load_time_ms: Option<f64>,
    frame_count: u32,
    last_report_ms: f64,
    fps: RingBuffer<u32>,
    memory: RingBuffer<MemorySnapshot>,
    handle: Option<SamplerHandle>,
}

impl SamplerState {
    fn on_frame(&mut self, now_ms: f64) -> Option<u32> {
        self.frame_count += 1;
        let elapsed = now_ms - self.last_report_ms;
        if elapsed < self.config.fps_report_interval_ms {
            return None;
        }

        let fps = (f64::from(self.frame_count) * 1000.0 / elapsed).round() as u32;
        self.fps.push(fps);
        self.frame_count = 0;
        self.last_report_ms = now_ms;

        if fps < self.config.low_fps_warning {
            tracing::warn!(game = %self.game_name, fps, "low frame rate");
        } else {
            tracing::trace!(game = %self.game_name, fps, "fps sample");
        }
        Some(fps)
    }

    fn on_memory(&mut self, usage: HeapUsage, now_ms: f64) -> MemorySnapshot {
        let snapshot = MemorySnapshot::new(usage, now_ms);
        self.memory.push(snapshot);

        let pressure = usage.pressure();
        if pressure > self.config.memory_pressure_ratio {
            tracing::warn!(
                game = %self.game_name,
                used_mib = snapshot.used_mib(),
                pressure,
                "high memory usage"
            );
        }
        snapshot
    }

    fn report(&self) -> PerformanceReport {
        let count = self.fps.len();
        let average_fps = if count == 0 {
            None
        } else {
            let sum: u64 = self.fps.iter().map(|&v| u64::from(v)).sum();
            Some((sum as f64 / count as f64).round() as u32)
        };
        PerformanceReport {
            game: self.game_name.clone(),
            load_time_ms: self.load_time_ms,
            current_fps: self.fps.latest().copied(),
            average_fps,
            min_fps: self.fps.iter().min().copied(),
            max_fps: self.fps.iter().max().copied(),
            fps_samples: count,
            memory_samples: self.memory.len(),
            latest_memory: self.memory.latest().copied(),
        }
    }
}

/// Rolling FPS and heap statistics for one page
///
/// Cloning yields another handle to the same series.
#[derive(Clone)]
pub struct Sampler {
    state: Rc<RefCell<SamplerState>>,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Sampler")
            .field("game_name", &state.game_name)
            .field("fps_samples", &state.fps.len())
            .field("memory_samples", &state.memory.len())
            .field("running", &state.handle.as_ref().is_some_and(|h| !h.is_stopped()))
            .finish()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler {
    /// Create a sampler with default windows and thresholds
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SamplerConfig::default())
    }

    /// Create a sampler with explicit settings
    #[must_use]
    pub fn with_config(config: SamplerConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(SamplerState {
                game_name: DEFAULT_GAME_NAME.to_string(),
                fps: RingBuffer::new(config.series_capacity),
                memory: RingBuffer::new(config.series_capacity),
                config,
                load_time_ms: None,
                frame_count: 0,
                last_report_ms: 0.0,
                handle: None,
            })),
        }
    }

    /// Set the display name used in reports
    #[must_use]
    pub fn with_game_name(self, name: impl Into<String>) -> Self {
        self.state.borrow_mut().game_name = name.into();
        self
    }

    /// Record the load time and start the frame and memory loops
    ///
    /// A second call starts nothing and returns the existing handle.
    pub fn init<P>(&self, page: Rc<P>) -> VigiaResult<SamplerHandle>
    where
        P: Clock + FrameScheduler + TimerScheduler + MemoryProbe + 'static,
    {
        let (memory_interval, game_name) = {
            let mut state = self.state.borrow_mut();
            if let Some(handle) = &state.handle {
                tracing::debug!(game = %state.game_name, "sampler already initialized");
                return Ok(handle.clone());
            }
            let now = page.now_ms();
            state.load_time_ms = Some(now);
            state.last_report_ms = now;
            state.frame_count = 0;
            (state.config.memory_interval_ms, state.game_name.clone())
        };

        let handle = SamplerHandle {
            token: CancelToken::new(),
        };
        let weak_state = Rc::downgrade(&self.state);

        schedule_frame(
            Rc::downgrade(&page),
            weak_state.clone(),
            handle.token.clone(),
        )?;

        if page.supports_memory() {
            start_memory_polling(&page, weak_state, handle.token.clone(), memory_interval)?;
        } else {
            tracing::debug!(game = %game_name, "memory introspection unavailable");
        }

        self.state.borrow_mut().handle = Some(handle.clone());
        tracing::info!(game = %game_name, "sampler initialized");
        Ok(handle)
    }

    /// Whether loops were started and not stopped
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state
            .borrow()
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_stopped())
    }

    /// Count one frame at `now_ms`; returns the FPS sample if one was taken
    pub fn record_frame(&self, now_ms: f64) -> Option<u32> {
        self.state.borrow_mut().on_frame(now_ms)
    }

    /// Append a heap reading taken at `now_ms`
    pub fn record_memory(&self, usage: HeapUsage, now_ms: f64) -> MemorySnapshot {
        self.state.borrow_mut().on_memory(usage, now_ms)
    }

    /// FPS samples, oldest first
    #[must_use]
    pub fn fps_history(&self) -> Vec<u32> {
        self.state.borrow().fps.to_vec()
    }

    /// Heap snapshots, oldest first
    #[must_use]
    pub fn memory_history(&self) -> Vec<MemorySnapshot> {
        self.state.borrow().memory.to_vec()
    }

    /// Current window summary
    #[must_use]
    pub fn performance_report(&self) -> PerformanceReport {
        self.state.borrow().report()
    }

    /// Advisories derived from fixed thresholds, computed on demand
    #[must_use]
    pub fn performance_suggestions(&self) -> Vec<PerformanceSuggestion> {
        let state = self.state.borrow();
        let report = state.report();
        let config = &state.config;
        let mut suggestions = Vec::new();

        if let Some(average) = report.average_fps {
            if average < config.suggest_quality_below_fps {
                suggestions.push(PerformanceSuggestion::ReduceQuality);
            }
            if average < config.suggest_critical_below_fps {
                suggestions.push(PerformanceSuggestion::CriticalFrameRate);
            }
        }
        if let Some(memory) = report.latest_memory {
            if memory.used_bytes > config.suggest_restart_above_bytes {
                suggestions.push(PerformanceSuggestion::RestartForMemory);
            }
        }
        suggestions
    }
}

fn schedule_frame<P>(
    page: Weak<P>,
    state: Weak<RefCell<SamplerState>>,
    token: CancelToken,
) -> VigiaResult<()>
where
    P: FrameScheduler + 'static,
{
    let Some(target) = page.upgrade() else {
        return Ok(());
    };
    target.request_animation_frame(Box::new(move |timestamp| {
        if token.is_cancelled() {
            return;
        }
        let Some(shared) = state.upgrade() else {
            return;
        };
        shared.borrow_mut().on_frame(timestamp);
        drop(shared);
        if let Err(error) = schedule_frame(page, state, token) {
            tracing::warn!(%error, "frame sampling stopped");
        }
    }))
}

fn start_memory_polling<P>(
    page: &Rc<P>,
    state: Weak<RefCell<SamplerState>>,
    token: CancelToken,
    period_ms: u32,
) -> VigiaResult<()>
where
    P: Clock + TimerScheduler + MemoryProbe + 'static,
{
    let weak_page = Rc::downgrade(page);
    let timer: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));
    let own_timer = Rc::clone(&timer);

    let id = page.set_interval(
        period_ms,
        Box::new(move || {
            let Some(page) = weak_page.upgrade() else {
                return;
            };
            let shared = match state.upgrade() {
                Some(shared) if !token.is_cancelled() => shared,
                _ => {
                    if let Some(id) = own_timer.get() {
                        page.clear_timer(id);
                    }
                    return;
                }
            };
            match page.read_memory() {
                Ok(usage) => {
                    shared.borrow_mut().on_memory(usage, page.now_ms());
                }
                Err(error) => tracing::debug!(%error, "memory reading discarded"),
            }
        }),
    )?;
    timer.set(Some(id));
    Ok(())
}
