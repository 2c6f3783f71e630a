use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::error::{CanvasError, Result};

/// A pixel with zero alpha.
pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

// ============================================================================
// RECTANGLES & DRAW AREAS
// ============================================================================

/// Axis-aligned rectangle in canvas pixels.
///
/// The origin is signed so that widening a rect at the canvas edge and then
/// clamping it is always well defined. A rect with `w <= 0` or `h <= 0` is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Build from an inclusive-min / exclusive-max pair.
    pub fn from_min_max(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            x: min_x,
            y: min_y,
            w: max_x - min_x,
            h: max_y - min_y,
        }
    }

    /// Full-buffer rect for a `width × height` image.
    pub fn of_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width.min(i32::MAX as u32) as i32, height.min(i32::MAX as u32) as i32)
    }

    #[inline]
    pub fn max_x(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    #[inline]
    pub fn max_y(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.w as u64 * self.h as u64
        }
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.max_x() && y < self.max_y()
    }

    /// `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x && other.y >= self.y && other.max_x() <= self.max_x() && other.max_y() <= self.max_y()
    }

    /// Overlap of two rects, `None` when they do not overlap.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::from_min_max(
            self.x.max(other.x),
            self.y.max(other.y),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        );
        if r.is_empty() { None } else { Some(r) }
    }

    /// Smallest rect covering both. Empty operands are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_min_max(
            self.x.min(other.x),
            self.y.min(other.y),
            self.max_x().max(other.max_x()),
            self.max_y().max(other.max_y()),
        )
    }

    /// Grow by `by` pixels on every side.
    pub fn widen(&self, by: i32) -> Rect {
        Rect::new(
            self.x.saturating_sub(by),
            self.y.saturating_sub(by),
            self.w.saturating_add(by.saturating_mul(2)),
            self.h.saturating_add(by.saturating_mul(2)),
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x.saturating_add(dx), self.y.saturating_add(dy), self.w, self.h)
    }
}

/// Accumulating dirty rectangle for one gesture.
///
/// Stored as min/max bounds with an exclusive max so that single pixels and
/// whole rects can be folded in cheaply; reset after every commit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawArea {
    bounds: Option<(i32, i32, i32, i32)>,
}

impl DrawArea {
    pub const fn new() -> Self {
        Self { bounds: None }
    }

    #[inline]
    pub fn include(&mut self, x: i32, y: i32) {
        self.include_rect(Rect::new(x, y, 1, 1));
    }

    pub fn include_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        self.bounds = Some(match self.bounds {
            Some((min_x, min_y, max_x, max_y)) => (
                min_x.min(rect.x),
                min_y.min(rect.y),
                max_x.max(rect.max_x()),
                max_y.max(rect.max_y()),
            ),
            None => (rect.x, rect.y, rect.max_x(), rect.max_y()),
        });
    }

    pub fn rect(&self) -> Option<Rect> {
        self.bounds
            .map(|(min_x, min_y, max_x, max_y)| Rect::from_min_max(min_x, min_y, max_x, max_y))
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn reset(&mut self) {
        self.bounds = None;
    }
}

// ============================================================================
// BLENDING
// ============================================================================

/// How overlay pixels are merged onto the committed image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// Source-over.
    #[default]
    Normal,
    /// Destination-alpha: only pixels that already carry paint are recoloured,
    /// and the destination alpha channel is never written.
    Mask,
}

impl CompositeMode {
    pub fn name(&self) -> &'static str {
        match self {
            CompositeMode::Normal => "normal",
            CompositeMode::Mask => "mask",
        }
    }
}

#[inline(always)]
fn round_channel(x: f32) -> u8 {
    (x + 0.5).floor().clamp(0.0, 255.0) as u8
}

/// Clamp a global alpha multiplier into `[0, 1]`, mapping NaN to opaque.
pub fn sanitize_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) }
}

/// Composite `src` over `dest` with a global `alpha` multiplier.
///
/// `outA = srcA + destA·(1−srcA)`,
/// `outRGB = (srcRGB·srcA + destRGB·destA·(1−srcA)) / outA`, each channel
/// rounded to nearest. A fully opaque source skips the division entirely.
#[inline]
pub fn blend_pixel(dest: Rgba<u8>, src: Rgba<u8>, alpha: f32, mode: CompositeMode) -> Rgba<u8> {
    if src[3] == 0 || alpha <= 0.0 {
        return dest;
    }
    if mode == CompositeMode::Mask && dest[3] == 0 {
        return dest;
    }

    let full_alpha = src[3] == 255 && alpha >= 1.0;
    if full_alpha {
        return match mode {
            CompositeMode::Normal => Rgba([src[0], src[1], src[2], 255]),
            CompositeMode::Mask => Rgba([src[0], src[1], src[2], dest[3]]),
        };
    }

    let sa = (src[3] as f32 / 255.0) * alpha;
    let da = dest[3] as f32 / 255.0;
    let dest_weight = da * (1.0 - sa);
    let out_a = sa + dest_weight;
    if out_a <= 0.0 {
        return dest;
    }

    let ch = |i: usize| round_channel((src[i] as f32 * sa + dest[i] as f32 * dest_weight) / out_a);
    let out_alpha = match mode {
        CompositeMode::Normal => round_channel(out_a * 255.0),
        CompositeMode::Mask => dest[3],
    };
    Rgba([ch(0), ch(1), ch(2), out_alpha])
}

/// Display composite of one base pixel and one overlay pixel.
///
/// Three cases: empty overlay shows the base, an overlay that is opaque after
/// the global alpha shows the overlay colour exactly, anything else is a
/// partial mix using [`blend_pixel`].
#[inline]
pub fn preview_pixel(base: Rgba<u8>, overlay: Rgba<u8>, alpha: f32, mode: CompositeMode) -> Rgba<u8> {
    if overlay[3] == 0 || alpha <= 0.0 {
        base
    } else if overlay[3] == 255 && alpha >= 1.0 {
        overlay
    } else {
        blend_pixel(base, overlay, alpha, mode)
    }
}

// ============================================================================
// PIXEL SURFACE: committed buffer + in-progress overlay
// ============================================================================

/// The drawing surface: the committed image, the overlay holding the current
/// not-yet-committed gesture, and the state that governs how the two merge.
#[derive(Clone)]
pub struct PixelSurface {
    base: RgbaImage,
    overlay: RgbaImage,
    /// Region of the overlay that holds paint; `None` means the overlay is clear.
    overlay_area: DrawArea,
    clip: Option<Rect>,
    alpha: f32,
    mode: CompositeMode,
}

impl PixelSurface {
    /// Fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::new(width, height))
    }

    pub fn filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        Self::from_image(RgbaImage::from_pixel(width, height, color))
    }

    pub fn from_image(base: RgbaImage) -> Self {
        let overlay = RgbaImage::new(base.width(), base.height());
        Self {
            base,
            overlay,
            overlay_area: DrawArea::new(),
            clip: None,
            alpha: 1.0,
            mode: CompositeMode::Normal,
        }
    }

    pub fn width(&self) -> u32 {
        self.base.width()
    }

    pub fn height(&self) -> u32 {
        self.base.height()
    }

    pub fn bounds(&self) -> Rect {
        Rect::of_size(self.width(), self.height())
    }

    /// The committed image.
    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut RgbaImage {
        &mut self.base
    }

    /// The in-progress overlay.
    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    /// Replace the committed image wholesale. The overlay is reallocated to
    /// match and any clip that no longer fits is dropped.
    ///
    /// Returns `true` when an active clip was removed.
    pub(crate) fn replace_base(&mut self, image: RgbaImage) -> bool {
        let same_size = image.dimensions() == self.base.dimensions();
        self.base = image;
        if same_size {
            self.discard_overlay();
        } else {
            self.overlay = RgbaImage::new(self.base.width(), self.base.height());
            self.overlay_area.reset();
        }
        match self.clip {
            Some(clip) if !self.bounds().contains_rect(&clip) => {
                self.clip = None;
                true
            }
            _ => false,
        }
    }

    // ---- state --------------------------------------------------------------

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Set the global draw alpha, clamped to `[0, 1]`. Returns the stored value.
    pub fn set_alpha(&mut self, alpha: f32) -> f32 {
        self.alpha = sanitize_alpha(alpha);
        self.alpha
    }

    pub fn composite_mode(&self) -> CompositeMode {
        self.mode
    }

    pub fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.mode = mode;
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    /// Restrict subsequent writes to `rect` (intersected with the buffer).
    /// An empty intersection removes the clip. Returns the clip now in effect.
    pub fn set_clip(&mut self, rect: Rect) -> Option<Rect> {
        self.clip = rect.intersect(&self.bounds());
        if self.clip.is_none() {
            tracing::warn!("clip {:?} does not overlap the {}x{} canvas, clip removed", rect, self.width(), self.height());
        }
        self.clip
    }

    /// Returns `true` if a clip was active.
    pub fn remove_clip(&mut self) -> bool {
        self.clip.take().is_some()
    }

    /// The rect writes are currently allowed in: the clip, or the whole buffer.
    pub fn writable_rect(&self) -> Rect {
        self.clip.unwrap_or_else(|| self.bounds())
    }

    // ---- overlay drawing ------------------------------------------------------

    pub fn overlay_is_clear(&self) -> bool {
        self.overlay_area.is_empty()
    }

    /// Bounding rect of the paint currently sitting in the overlay.
    pub fn overlay_area(&self) -> Option<Rect> {
        self.overlay_area.rect()
    }

    /// Start a new overlay draw. Returns `false` when the overlay was already clear.
    pub fn begin_overlay_draw(&mut self) -> bool {
        if self.overlay_is_clear() {
            return false;
        }
        self.discard_overlay();
        true
    }

    /// Drop any paint in the overlay without committing it.
    pub fn discard_overlay(&mut self) {
        if let Some(area) = self.overlay_area.rect().and_then(|r| r.intersect(&self.bounds())) {
            for y in area.y..area.max_y() {
                for x in area.x..area.max_x() {
                    self.overlay.put_pixel(x as u32, y as u32, TRANSPARENT);
                }
            }
        }
        self.overlay_area.reset();
    }

    /// Write one overlay pixel. Suppressed outside the buffer or the clip.
    pub fn plot(&mut self, x: i32, y: i32, color: Rgba<u8>) -> bool {
        if !self.writable_rect().contains(x, y) {
            return false;
        }
        self.overlay.put_pixel(x as u32, y as u32, color);
        self.overlay_area.include(x, y);
        true
    }

    /// Fill a rect of the overlay. Returns the part actually written.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> Option<Rect> {
        let area = rect.intersect(&self.writable_rect())?;
        for y in area.y..area.max_y() {
            for x in area.x..area.max_x() {
                self.overlay.put_pixel(x as u32, y as u32, color);
            }
        }
        self.overlay_area.include_rect(area);
        Some(area)
    }

    /// Stamp a square brush of `size` pixels along the line from
    /// `(x0, y0)` to `(x1, y1)`.
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, size: u32, color: Rgba<u8>) -> Option<Rect> {
        let size = size.clamp(1, 1024) as i32;
        let half = (size - 1) / 2;
        let mut touched = DrawArea::new();

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        let (mut x, mut y) = (x0, y0);
        loop {
            if let Some(r) = self.fill_rect(Rect::new(x - half, y - half, size, size), color) {
                touched.include_rect(r);
            }
            if x == x1 && y == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
        touched.rect()
    }

    /// Copy `image` into the overlay with its top-left at `(x, y)`.
    /// Transparent source pixels are skipped.
    pub fn blit_overlay(&mut self, image: &RgbaImage, x: i32, y: i32) -> Option<Rect> {
        let target = Rect::new(x, y, image.width() as i32, image.height() as i32);
        let area = target.intersect(&self.writable_rect())?;
        for py in area.y..area.max_y() {
            for px in area.x..area.max_x() {
                let src = *image.get_pixel((px - x) as u32, (py - y) as u32);
                if src[3] != 0 {
                    self.overlay.put_pixel(px as u32, py as u32, src);
                }
            }
        }
        self.overlay_area.include_rect(area);
        Some(area)
    }

    // ---- commit ---------------------------------------------------------------

    /// Merge the overlay into the committed image inside `dirty`.
    ///
    /// Writes are limited to `dirty ∩ buffer ∩ clip`. Returns `false` without
    /// touching anything when that intersection is empty. On success the overlay
    /// is cleared.
    pub fn commit_overlay(&mut self, dirty: Rect) -> bool {
        let Some(area) = dirty.intersect(&self.writable_rect()) else {
            tracing::debug!("commit of {:?} skipped: outside buffer or clip", dirty);
            return false;
        };

        let alpha = self.alpha;
        let mode = self.mode;
        for y in area.y..area.max_y() {
            for x in area.x..area.max_x() {
                let (ux, uy) = (x as u32, y as u32);
                let src = *self.overlay.get_pixel(ux, uy);
                if src[3] == 0 {
                    continue;
                }
                let dest = self.base.get_pixel_mut(ux, uy);
                *dest = blend_pixel(*dest, src, alpha, mode);
            }
        }

        tracing::debug!("committed overlay over {:?} (mode {}, alpha {:.3})", area, mode.name(), alpha);
        self.discard_overlay();
        true
    }

    // ---- queries --------------------------------------------------------------

    /// Read one committed pixel.
    pub fn colour_pick(&self, x: i32, y: i32) -> Result<Rgba<u8>> {
        if !self.bounds().contains(x, y) {
            return Err(CanvasError::OutOfBounds { x: x as i64, y: y as i64 });
        }
        Ok(*self.base.get_pixel(x as u32, y as u32))
    }

    /// Base and overlay composited at one in-bounds pixel.
    #[inline]
    pub fn composite_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        preview_pixel(*self.base.get_pixel(x, y), *self.overlay.get_pixel(x, y), self.alpha, self.mode)
    }

    /// A copy of the committed image with the overlay composited on top.
    pub fn flattened(&self) -> RgbaImage {
        if self.overlay_is_clear() {
            return self.base.clone();
        }
        RgbaImage::from_fn(self.width(), self.height(), |x, y| self.composite_pixel(x, y))
    }

    /// Composite a sub-rect (must lie inside the buffer) into a new image.
    pub fn composite_region(&self, rect: Rect) -> RgbaImage {
        let area = rect.intersect(&self.bounds()).unwrap_or_default();
        RgbaImage::from_fn(area.w.max(0) as u32, area.h.max(0) as u32, |x, y| {
            self.composite_pixel(area.x as u32 + x, area.y as u32 + y)
        })
    }

    /// Minimal rect containing every committed pixel with non-zero alpha.
    pub fn drawn_bounding_box(&self) -> Option<Rect> {
        let width = self.width() as usize;
        if width == 0 || self.height() == 0 {
            return None;
        }
        let stride = width * 4;

        // Per-row (first, last) painted column, reduced across rows in parallel.
        let found = self
            .base
            .as_raw()
            .par_chunks_exact(stride)
            .enumerate()
            .filter_map(|(y, row)| {
                let first = row.chunks_exact(4).position(|px| px[3] != 0)?;
                let last = row.chunks_exact(4).rposition(|px| px[3] != 0)?;
                Some((first, y, last, y))
            })
            .reduce_with(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)));

        found.map(|(min_x, min_y, max_x, max_y)| {
            Rect::from_min_max(min_x as i32, min_y as i32, max_x as i32 + 1, max_y as i32 + 1)
        })
    }
}
