// ============================================================================
// CLIPBOARD OPERATIONS: internal copy / cut / paste buffer
// ============================================================================

use image::RgbaImage;

use crate::canvas::Rect;
use crate::ops::canvas_ops;

/// In-app clipboard storing an RGBA image with full transparency.
///
/// Owned by the canvas manager rather than held in a global, so several
/// engines in one process never share pasted content.
#[derive(Clone, Debug, Default)]
pub struct Clipboard {
    image: Option<RgbaImage>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Dimensions of the stored image without cloning it.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.image.as_ref().map(|img| img.dimensions())
    }

    pub fn set_image(&mut self, image: RgbaImage) {
        self.image = Some(image);
    }

    pub fn clear(&mut self) {
        self.image = None;
    }

    /// Copy `region` of `source` into the clipboard. Returns `false` when the
    /// region misses the image.
    pub fn copy_region(&mut self, source: &RgbaImage, region: Rect) -> bool {
        match canvas_ops::crop(source, region) {
            Some(img) => {
                tracing::debug!("copied {}x{} to clipboard", img.width(), img.height());
                self.image = Some(img);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn copy_region_stores_a_crop() {
        let mut img = RgbaImage::new(6, 6);
        img.put_pixel(3, 3, Rgba([1, 2, 3, 255]));
        let mut cb = Clipboard::new();
        assert!(!cb.has_image());
        assert!(cb.copy_region(&img, Rect::new(2, 2, 3, 3)));
        assert_eq!(cb.dimensions(), Some((3, 3)));
        assert_eq!(*cb.image().unwrap().get_pixel(1, 1), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn copy_outside_image_keeps_previous_content() {
        let img = RgbaImage::new(4, 4);
        let mut cb = Clipboard::new();
        cb.set_image(RgbaImage::new(1, 1));
        assert!(!cb.copy_region(&img, Rect::new(10, 10, 2, 2)));
        assert_eq!(cb.dimensions(), Some((1, 1)));
    }
}
