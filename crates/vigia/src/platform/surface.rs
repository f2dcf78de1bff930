//! 2D drawing surface (`CanvasRenderingContext2d` subset).

use crate::result::VigiaResult;

/// The drawing operations the fault reporter knows how to guard
pub trait DrawSurface {
    /// Image source accepted by [`DrawSurface::draw_image`]
    type Image: ?Sized;

    /// Surface width in pixels
    fn width(&self) -> f64;

    /// Surface height in pixels
    fn height(&self) -> f64;

    /// `fillRect`
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()>;

    /// `clearRect`
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) -> VigiaResult<()>;

    /// `drawImage` at a destination point
    fn draw_image(&mut self, image: &Self::Image, dx: f64, dy: f64) -> VigiaResult<()>;

    /// Clear the full surface
    fn clear_all(&mut self) -> VigiaResult<()> {
        let (w, h) = (self.width(), self.height());
        self.clear_rect(0.0, 0.0, w, h)
    }
}
