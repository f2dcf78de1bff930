//! Vigia: Runtime Lookout for Browser Games
//!
//! Vigia (Spanish: "lookout") is a set of page helpers for HTML5 and WASM
//! games:
//!
//! - [`FaultReporter`] keeps a bounded history of uncaught errors,
//!   unhandled rejections, canvas failures and failing frame callbacks.
//! - [`AccessibilityAnnotator`] names unlabelled controls, makes the game
//!   area keyboard reachable and speaks through a live region.
//! - [`Sampler`] derives FPS and heap-usage series with advisories.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │   FaultReporter   AccessibilityAnnotator        Sampler      │
//! │        │                   │                       │         │
//! │        └──────────── platform traits ──────────────┘         │
//! │                 │                        │                   │
//! │        web::BrowserPage          mock::MockPage              │
//! │        (web-sys, wasm32)         (manual clock, tests)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use vigia::mock::MockPage;
//!
//! let page = Rc::new(MockPage::new());
//! let vigia = vigia::init_all(Rc::clone(&page), "Asteroids").unwrap();
//!
//! page.drive_frames(58, 1000.0);
//! assert_eq!(vigia.sampler.performance_report().current_fps, Some(58));
//! assert!(vigia.sampler.performance_suggestions().is_empty());
//! ```

#![warn(missing_docs)]

mod accessibility;
mod cancel;
mod config;
mod faults;
pub mod logging;
pub mod mock;
pub mod platform;
mod result;
mod ring;
mod sampler;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use accessibility::{
    fallback_label, AccessibilityAnnotator, AnnotationSummary, AnnouncePriority,
    BUTTON_SELECTOR, DEFAULT_BUTTON_LABEL, DEFAULT_IMAGE_ALT, FOCUS_CLASS, FOCUS_STYLE_MARKER,
    GAME_AREA_SELECTOR, HELP_OVERLAY_ID, HIGH_CONTRAST_CLASS, KEYBOARD_SHORTCUTS, LIVE_REGION_ID,
};
pub use cancel::CancelToken;
pub use config::{
    AccessibilityConfig, FaultConfig, SamplerConfig, VigiaConfig, DEFAULT_GAME_NAME, MIB,
};
pub use faults::{
    ErrorStats, FaultRecord, FaultReporter, FrameResult, GuardedFrames, GuardedSurface,
    SOURCE_ANIMATION_FRAME, SOURCE_CLEAR_RECT, SOURCE_DRAW_IMAGE, SOURCE_FILL_RECT,
    SOURCE_UNHANDLED_REJECTION, SOURCE_WINDOW_ERROR,
};
pub use platform::Host;
pub use result::{VigiaError, VigiaResult};
pub use ring::RingBuffer;
pub use sampler::{
    MemorySnapshot, PerformanceReport, PerformanceSuggestion, Sampler, SamplerHandle,
};

use std::fmt;
use std::rc::Rc;

/// The three components, initialized against one page
pub struct Vigia<P: platform::Document> {
    /// Fault history
    pub fault_reporter: FaultReporter,
    /// Accessibility annotations and announcements
    pub accessibility: AccessibilityAnnotator<P>,
    /// FPS and memory series
    pub sampler: Sampler,
    /// Stops the sampler loops
    pub sampler_handle: SamplerHandle,
    /// What the accessibility sweep changed
    pub annotations: AnnotationSummary,
}

impl<P: platform::Document> fmt::Debug for Vigia<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vigia")
            .field("fault_reporter", &self.fault_reporter)
            .field("accessibility", &self.accessibility)
            .field("sampler", &self.sampler)
            .field("sampler_handle", &self.sampler_handle)
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// Construct and initialize all three components with default settings
pub fn init_all<P>(page: Rc<P>, game_name: &str) -> VigiaResult<Vigia<P>>
where
    P: Host + 'static,
{
    init_with_config(page, VigiaConfig::new().with_game_name(game_name))
}

/// Construct and initialize all three components from `config`
///
/// The configuration is validated first.
pub fn init_with_config<P>(page: Rc<P>, config: VigiaConfig) -> VigiaResult<Vigia<P>>
where
    P: Host + 'static,
{
    config.validate()?;
    let VigiaConfig {
        game_name,
        faults,
        sampler,
        accessibility,
    } = config;

    let fault_reporter = FaultReporter::with_config(faults).with_game_name(game_name.as_str());
    fault_reporter.init(&page);

    let annotator = AccessibilityAnnotator::new(Rc::clone(&page))
        .with_config(accessibility)
        .with_game_name(game_name.as_str());
    let annotations = annotator.init()?;

    let sampler = Sampler::with_config(sampler).with_game_name(game_name.as_str());
    let sampler_handle = sampler.init(page)?;

    tracing::info!(game = %game_name, "vigia initialized");
    Ok(Vigia {
        fault_reporter,
        accessibility: annotator,
        sampler,
        sampler_handle,
        annotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPage;

    #[test]
    fn test_init_all_wires_every_component() {
        let page = Rc::new(MockPage::new());
        let vigia = init_all(Rc::clone(&page), "Tetris").unwrap();
        assert!(vigia.fault_reporter.is_initialized());
        assert_eq!(vigia.fault_reporter.game_name(), "Tetris");
        assert!(vigia.accessibility.is_initialized());
        assert!(vigia.sampler.is_running());
        assert_eq!(vigia.sampler.performance_report().game, "Tetris");
    }

    #[test]
    fn test_browser_bindings_enabled() {
        let manifest = include_str!("../Cargo.toml");
        for feature in [
            "\"Document\"",
            "\"HtmlElement\"",
            "\"HtmlHeadElement\"",
            "\"MediaQueryList\"",
            "\"KeyboardEvent\"",
            "\"CanvasRenderingContext2d\"",
        ] {
            assert!(manifest.contains(feature), "missing web-sys feature {feature}");
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let page = Rc::new(MockPage::new());
        let mut config = VigiaConfig::new();
        config.sampler.series_capacity = 0;
        let err = init_with_config(page, config).unwrap_err();
        assert!(matches!(err, VigiaError::Config { .. }));
    }
}
