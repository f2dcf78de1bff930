//! Mock Page Host
//!
//! Run the fault reporter, annotator and sampler without a browser. The
//! mock page owns manual time, so frame-rate and timer behaviour are exact
//! and repeatable.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use vigia::mock::MockPage;
//! use vigia::Sampler;
//!
//! let page = Rc::new(MockPage::new());
//! let sampler = Sampler::new().with_game_name("Pong");
//! let _handle = sampler.init(Rc::clone(&page)).unwrap();
//!
//! page.drive_frames(60, 1000.0);
//! assert_eq!(sampler.performance_report().current_fps, Some(60));
//! ```

pub mod dom;
pub mod page;
pub mod surface;

pub use dom::{MockDom, NodeId};
pub use page::MockPage;
pub use surface::{MockSurface, SurfaceOp};
