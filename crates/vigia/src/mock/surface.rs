//! Recording drawing surface with injectable failures.

use crate::platform::DrawSurface;
use crate::result::{VigiaError, VigiaResult};
use std::collections::HashSet;

/// A drawing call that reached the surface
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    /// `fillRect`
    Fill {
        /// Rectangle `(x, y, w, h)`
        rect: (f64, f64, f64, f64),
    },
    /// `clearRect`
    Clear {
        /// Rectangle `(x, y, w, h)`
        rect: (f64, f64, f64, f64),
    },
    /// `drawImage`
    Draw {
        /// Image name
        image: String,
        /// Destination point
        at: (f64, f64),
    },
}

/// Surface that records successful calls and fails on demand
#[derive(Debug, Clone)]
pub struct MockSurface {
    width: f64,
    height: f64,
    failing: HashSet<&'static str>,
    ops: Vec<SurfaceOp>,
}

impl MockSurface {
    /// Create a surface of the given size
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            failing: HashSet::new(),
            ops: Vec::new(),
        }
    }

    /// Make an operation (`fillRect`, `clearRect`, `drawImage`) fail
    #[must_use]
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Successful calls so far
    #[must_use]
    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    fn attempt(&mut self, operation: &'static str, op: SurfaceOp) -> VigiaResult<()> {
        if self.failing.contains(operation) {
            return Err(VigiaError::surface(operation, "context lost"));
        }
        self.ops.push(op);
        Ok(())
    }
}

impl DrawSurface for MockSurface {
    type Image = str;

    fn width(&self) -> f64 {
        self.width
    }

    fn height(&self) -> f64 {
        self.height
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()> {
        self.attempt("fillRect", SurfaceOp::Fill { rect: (x, y, w, h) })
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()> {
        self.attempt("clearRect", SurfaceOp::Clear { rect: (x, y, w, h) })
    }

    fn draw_image(&mut self, image: &str, dx: f64, dy: f64) -> VigiaResult<()> {
        self.attempt(
            "drawImage",
            SurfaceOp::Draw {
                image: image.to_string(),
                at: (dx, dy),
            },
        )
    }
}
