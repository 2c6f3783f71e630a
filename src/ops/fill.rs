// ============================================================================
// REGION FILL: tolerance-based 4-connected flood fill
// ============================================================================

use image::Rgba;

use crate::canvas::{blend_pixel, CompositeMode, DrawArea, PixelSurface, Rect};
use crate::error::{CanvasError, Result};

/// What a fill changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FillOutcome {
    /// Bounding rect of every repainted pixel; `None` when nothing changed.
    pub bounds: Option<Rect>,
    pub pixels: usize,
}

impl FillOutcome {
    pub fn is_empty(&self) -> bool {
        self.bounds.is_none()
    }
}

/// Per-channel acceptance window around the seed colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ToleranceWindow {
    lo: [u8; 4],
    hi: [u8; 4],
}

impl ToleranceWindow {
    fn around(seed: Rgba<u8>, tolerance: u8) -> Self {
        let mut lo = [0u8; 4];
        let mut hi = [0u8; 4];
        for c in 0..4 {
            lo[c] = seed[c].saturating_sub(tolerance);
            hi[c] = seed[c].saturating_add(tolerance);
        }
        Self { lo, hi }
    }

    #[inline(always)]
    fn accepts(&self, p: Rgba<u8>) -> bool {
        (0..4).all(|c| p[c] >= self.lo[c] && p[c] <= self.hi[c])
    }
}

/// Clamp an arbitrary tolerance into the 0–255 channel range.
pub fn clamp_tolerance(tolerance: i32) -> u8 {
    tolerance.clamp(0, 255) as u8
}

/// Flood fill the committed image of `surface` from `(x, y)` with `color`.
///
/// A neighbour joins the region when all four channels fall inside
/// `[seed − tolerance, seed + tolerance]` and, in mask mode, its alpha is
/// non-zero. Only the four cardinal neighbours are considered. Accepted
/// pixels are recoloured with the surface's alpha and composite mode.
///
/// A seed outside the buffer is `OutOfBounds`; a seed outside the clip, or a
/// transparent seed in mask mode, changes nothing.
pub fn flood_fill(surface: &mut PixelSurface, x: i32, y: i32, color: Rgba<u8>, tolerance: u8) -> Result<FillOutcome> {
    let accepted = fill_region(surface, x, y, tolerance)?;
    let mode = surface.composite_mode();
    let alpha = surface.alpha();

    let base = surface.base_mut();
    let mut area = DrawArea::new();
    for &(px, py) in &accepted {
        let dest = base.get_pixel_mut(px, py);
        *dest = blend_pixel(*dest, color, alpha, mode);
        area.include(px as i32, py as i32);
    }

    tracing::debug!("flood fill from ({}, {}) tol {} repainted {} px", x, y, tolerance, accepted.len());
    Ok(FillOutcome {
        bounds: area.rect(),
        pixels: accepted.len(),
    })
}

/// Same region as [`flood_fill`], painted into the overlay instead. The
/// committed image is untouched until the overlay is committed, which applies
/// the alpha and composite mode.
pub fn flood_fill_overlay(surface: &mut PixelSurface, x: i32, y: i32, color: Rgba<u8>, tolerance: u8) -> Result<FillOutcome> {
    let accepted = fill_region(surface, x, y, tolerance)?;
    let mut area = DrawArea::new();
    for &(px, py) in &accepted {
        if surface.plot(px as i32, py as i32, color) {
            area.include(px as i32, py as i32);
        }
    }

    tracing::debug!("overlay fill from ({}, {}) tol {} covered {} px", x, y, tolerance, accepted.len());
    Ok(FillOutcome {
        bounds: area.rect(),
        pixels: accepted.len(),
    })
}

/// Seed checks shared by both fills, then the region walk.
fn fill_region(surface: &PixelSurface, x: i32, y: i32, tolerance: u8) -> Result<Vec<(u32, u32)>> {
    let seed = surface.colour_pick(x, y)?;
    let mode = surface.composite_mode();

    let region = surface.writable_rect();
    if !region.contains(x, y) {
        tracing::debug!("fill seed ({}, {}) outside clip {:?}", x, y, region);
        return Ok(Vec::new());
    }
    if mode == CompositeMode::Mask && seed[3] == 0 {
        return Ok(Vec::new());
    }

    let window = ToleranceWindow::around(seed, tolerance);
    Ok(collect_region(surface, region, x, y, window, mode))
}

/// Walk the 4-connected region from the seed inside `region`, returning every
/// accepted pixel in canvas coordinates.
fn collect_region(
    surface: &PixelSurface,
    region: Rect,
    seed_x: i32,
    seed_y: i32,
    window: ToleranceWindow,
    mode: CompositeMode,
) -> Vec<(u32, u32)> {
    let base = surface.base();
    let rw = region.w as usize;
    let rh = region.h as usize;
    // Visited matrix is scoped to the clip, indexed in region-local coordinates.
    let mut visited = vec![false; rw * rh];

    let accepts = |lx: usize, ly: usize| {
        let p = *base.get_pixel((region.x as usize + lx) as u32, (region.y as usize + ly) as u32);
        window.accepts(p) && (mode == CompositeMode::Normal || p[3] != 0)
    };

    let sx = (seed_x - region.x) as usize;
    let sy = (seed_y - region.y) as usize;
    let mut accepted = Vec::new();
    let mut stack: Vec<(usize, usize)> = Vec::with_capacity(1024);
    visited[sy * rw + sx] = true;
    stack.push((sx, sy));

    while let Some((lx, ly)) = stack.pop() {
        accepted.push(((region.x as usize + lx) as u32, (region.y as usize + ly) as u32));

        let mut visit = |nx: usize, ny: usize, stack: &mut Vec<(usize, usize)>| {
            let idx = ny * rw + nx;
            if !visited[idx] && accepts(nx, ny) {
                visited[idx] = true;
                stack.push((nx, ny));
            }
        };
        // Left
        if lx > 0 {
            visit(lx - 1, ly, &mut stack);
        }
        // Right
        if lx + 1 < rw {
            visit(lx + 1, ly, &mut stack);
        }
        // Up
        if ly > 0 {
            visit(lx, ly - 1, &mut stack);
        }
        // Down
        if ly + 1 < rh {
            visit(lx, ly + 1, &mut stack);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    #[test]
    fn white_canvas_fills_completely() {
        let mut s = PixelSurface::filled(10, 10, WHITE);
        let out = flood_fill(&mut s, 5, 5, RED, 10).unwrap();
        assert_eq!(out.bounds, Some(Rect::new(0, 0, 10, 10)));
        assert_eq!(out.pixels, 100);
        assert!(s.base().pixels().all(|p| *p == RED));
    }

    #[test]
    fn seed_outside_buffer_is_out_of_bounds() {
        let mut s = PixelSurface::filled(4, 4, WHITE);
        assert!(matches!(flood_fill(&mut s, 4, 0, RED, 0), Err(CanvasError::OutOfBounds { .. })));
    }

    #[test]
    fn seed_outside_clip_changes_nothing() {
        let mut s = PixelSurface::filled(10, 10, WHITE);
        s.set_clip(Rect::new(2, 2, 4, 4));
        let before = s.base().clone();
        let out = flood_fill(&mut s, 8, 8, RED, 0).unwrap();
        assert!(out.is_empty());
        assert_eq!(s.base(), &before);
    }

    #[test]
    fn fill_stays_inside_clip() {
        let mut s = PixelSurface::filled(10, 10, WHITE);
        s.set_clip(Rect::new(2, 2, 4, 4));
        let out = flood_fill(&mut s, 3, 3, RED, 0).unwrap();
        assert_eq!(out.bounds, Some(Rect::new(2, 2, 4, 4)));
        assert_eq!(*s.base().get_pixel(1, 1), WHITE);
    }

    #[test]
    fn diagonal_pinch_does_not_leak() {
        // Two white cells touching only at a corner, separated by black.
        let mut s = PixelSurface::filled(2, 2, BLACK);
        s.base_mut().put_pixel(0, 0, WHITE);
        s.base_mut().put_pixel(1, 1, WHITE);
        let out = flood_fill(&mut s, 0, 0, RED, 0).unwrap();
        assert_eq!(out.pixels, 1);
        assert_eq!(*s.base().get_pixel(1, 1), WHITE);
    }

    #[test]
    fn tolerance_window_is_per_channel() {
        let mut s = PixelSurface::filled(3, 1, Rgba([100, 100, 100, 255]));
        s.base_mut().put_pixel(1, 0, Rgba([105, 100, 100, 255]));
        s.base_mut().put_pixel(2, 0, Rgba([111, 100, 100, 255]));
        let out = flood_fill(&mut s, 0, 0, RED, 10).unwrap();
        assert_eq!(out.pixels, 2);
        assert_eq!(*s.base().get_pixel(2, 0), Rgba([111, 100, 100, 255]));
    }

    #[test]
    fn zero_tolerance_takes_exact_connected_colour() {
        let mut s = PixelSurface::filled(5, 5, WHITE);
        for y in 0..5 {
            s.base_mut().put_pixel(2, y, Rgba([254, 255, 255, 255]));
        }
        let out = flood_fill(&mut s, 0, 0, RED, 0).unwrap();
        assert_eq!(out.bounds, Some(Rect::new(0, 0, 2, 5)));
    }

    #[test]
    fn mask_mode_skips_transparent_seed_and_keeps_alpha() {
        let mut s = PixelSurface::new(4, 4);
        s.set_composite_mode(CompositeMode::Mask);
        assert!(flood_fill(&mut s, 0, 0, RED, 0).unwrap().is_empty());

        let mut s = PixelSurface::filled(4, 4, Rgba([0, 0, 255, 80]));
        s.set_composite_mode(CompositeMode::Mask);
        let out = flood_fill(&mut s, 0, 0, RED, 0).unwrap();
        assert_eq!(out.pixels, 16);
        assert_eq!(*s.base().get_pixel(3, 3), Rgba([255, 0, 0, 80]));
    }

    #[test]
    fn full_alpha_forces_opaque_result() {
        let mut s = PixelSurface::filled(2, 2, Rgba([10, 10, 10, 40]));
        flood_fill(&mut s, 0, 0, RED, 0).unwrap();
        assert_eq!(*s.base().get_pixel(1, 1), RED);
    }

    #[test]
    fn overlay_fill_leaves_base_until_commit() {
        let mut s = PixelSurface::filled(4, 4, WHITE);
        s.base_mut().put_pixel(3, 3, BLACK);
        let out = flood_fill_overlay(&mut s, 0, 0, RED, 0).unwrap();
        assert_eq!(out.pixels, 15);
        assert_eq!(*s.base().get_pixel(0, 0), WHITE);
        assert_eq!(*s.overlay().get_pixel(0, 0), RED);
        assert_eq!(s.composite_pixel(2, 2), RED);
        assert_eq!(*s.overlay().get_pixel(3, 3), Rgba([0, 0, 0, 0]));

        assert!(s.commit_overlay(out.bounds.unwrap()));
        assert_eq!(*s.base().get_pixel(0, 0), RED);
        assert_eq!(*s.base().get_pixel(3, 3), BLACK);
    }

    #[test]
    fn tolerance_clamps() {
        assert_eq!(clamp_tolerance(-4), 0);
        assert_eq!(clamp_tolerance(300), 255);
        assert_eq!(clamp_tolerance(42), 42);
    }
}
