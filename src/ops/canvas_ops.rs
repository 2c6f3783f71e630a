// ============================================================================
// CANVAS-LEVEL OPERATIONS: new image, resize with anchor, crop, clear
// ============================================================================

use image::{imageops, Rgba, RgbaImage};

use crate::canvas::{Rect, TRANSPARENT};

/// Largest width or height accepted for a canvas.
pub const MAX_CANVAS_DIM: u32 = 32_768;

/// Clamp a requested dimension to `0..=MAX_CANVAS_DIM`.
pub fn clamp_dim(v: u32) -> u32 {
    if v > MAX_CANVAS_DIM {
        tracing::warn!("canvas dimension {} clamped to {}", v, MAX_CANVAS_DIM);
    }
    v.min(MAX_CANVAS_DIM)
}

/// Where the old content sits inside a resized canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    /// (column, row), each 0 = start, 1 = centre, 2 = end.
    pub fn grid(&self) -> (u32, u32) {
        match self {
            Anchor::TopLeft => (0, 0),
            Anchor::Top => (1, 0),
            Anchor::TopRight => (2, 0),
            Anchor::Left => (0, 1),
            Anchor::Center => (1, 1),
            Anchor::Right => (2, 1),
            Anchor::BottomLeft => (0, 2),
            Anchor::Bottom => (1, 2),
            Anchor::BottomRight => (2, 2),
        }
    }

    /// Offset of an `old` sized image inside a `new` sized one.
    pub fn offset(&self, old_w: u32, old_h: u32, new_w: u32, new_h: u32) -> (i32, i32) {
        let (col, row) = self.grid();
        let place = |slot: u32, old: u32, new: u32| -> i32 {
            let spare = new as i64 - old as i64;
            match slot {
                0 => 0,
                1 => (spare / 2) as i32,
                _ => spare as i32,
            }
        };
        (place(col, old_w, new_w), place(row, old_h, new_h))
    }
}

/// A fresh `width × height` buffer filled with `background`.
pub fn new_image(width: u32, height: u32, background: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(clamp_dim(width), clamp_dim(height), background)
}

/// Resize the canvas. With `keep_content` the old pixels are placed at
/// `anchor` (cropping where they no longer fit); otherwise the result is blank.
pub fn resize_canvas(old: &RgbaImage, new_w: u32, new_h: u32, anchor: Anchor, keep_content: bool, fill: Rgba<u8>) -> RgbaImage {
    let mut out = new_image(new_w, new_h, fill);
    if !keep_content {
        return out;
    }
    let (new_w, new_h) = out.dimensions();
    let (ox, oy) = anchor.offset(old.width(), old.height(), new_w, new_h);

    let target = Rect::new(ox, oy, old.width() as i32, old.height() as i32);
    let Some(area) = target.intersect(&Rect::of_size(new_w, new_h)) else {
        return out;
    };
    for y in area.y..area.max_y() {
        for x in area.x..area.max_x() {
            let px = *old.get_pixel((x - ox) as u32, (y - oy) as u32);
            out.put_pixel(x as u32, y as u32, px);
        }
    }
    out
}

/// Copy of `rect` clamped to the image. `None` when nothing is left.
pub fn crop(image: &RgbaImage, rect: Rect) -> Option<RgbaImage> {
    let r = rect.intersect(&Rect::of_size(image.width(), image.height()))?;
    Some(imageops::crop_imm(image, r.x as u32, r.y as u32, r.w as u32, r.h as u32).to_image())
}

/// Set every pixel inside `rect` to transparent. Returns the cleared area.
pub fn clear_region(image: &mut RgbaImage, rect: Rect) -> Option<Rect> {
    let r = rect.intersect(&Rect::of_size(image.width(), image.height()))?;
    for y in r.y..r.max_y() {
        for x in r.x..r.max_x() {
            image.put_pixel(x as u32, y as u32, TRANSPARENT);
        }
    }
    Some(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    #[test]
    fn anchor_offsets() {
        assert_eq!(Anchor::TopLeft.offset(10, 10, 20, 30), (0, 0));
        assert_eq!(Anchor::Center.offset(10, 10, 20, 30), (5, 10));
        assert_eq!(Anchor::BottomRight.offset(10, 10, 20, 30), (10, 20));
        assert_eq!(Anchor::BottomRight.offset(10, 10, 4, 4), (-6, -6));
    }

    #[test]
    fn resize_keeps_content_at_anchor() {
        let old = RgbaImage::from_pixel(2, 2, RED);
        let out = resize_canvas(&old, 4, 4, Anchor::BottomRight, true, WHITE);
        assert_eq!(out.dimensions(), (4, 4));
        assert_eq!(*out.get_pixel(3, 3), RED);
        assert_eq!(*out.get_pixel(2, 2), RED);
        assert_eq!(*out.get_pixel(1, 1), WHITE);
    }

    #[test]
    fn shrinking_crops_around_anchor() {
        let mut old = RgbaImage::from_pixel(3, 3, WHITE);
        old.put_pixel(1, 1, RED);
        let out = resize_canvas(&old, 1, 1, Anchor::Center, true, TRANSPARENT);
        assert_eq!(*out.get_pixel(0, 0), RED);
    }

    #[test]
    fn resize_without_content_is_blank() {
        let old = RgbaImage::from_pixel(2, 2, RED);
        let out = resize_canvas(&old, 3, 3, Anchor::TopLeft, false, TRANSPARENT);
        assert!(out.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn crop_and_clear_clamp_to_image() {
        let mut img = RgbaImage::from_pixel(4, 4, RED);
        let c = crop(&img, Rect::new(2, 2, 10, 10)).unwrap();
        assert_eq!(c.dimensions(), (2, 2));
        assert!(crop(&img, Rect::new(8, 8, 2, 2)).is_none());
        assert_eq!(clear_region(&mut img, Rect::new(-1, -1, 2, 2)), Some(Rect::new(0, 0, 1, 1)));
        assert_eq!(*img.get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*img.get_pixel(1, 1), RED);
    }

    #[test]
    fn dimensions_are_capped() {
        assert_eq!(clamp_dim(MAX_CANVAS_DIM + 1), MAX_CANVAS_DIM);
        assert_eq!(clamp_dim(0), 0);
    }
}
