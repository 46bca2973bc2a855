pub mod post;
pub mod pre;

/// Maps between original image pixels and the letterboxed model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    pub orig_width: u32,
    pub orig_height: u32,
    pub input_width: u32,
    pub input_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl TransformParams {
    /// Map a point from model input space back onto the original image,
    /// clamped to its bounds.
    pub fn to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let x = ((x - self.offset_x) / self.scale).clamp(0.0, self.orig_width as f32);
        let y = ((y - self.offset_y) / self.scale).clamp(0.0, self.orig_height as f32);
        (x, y)
    }
}
