// ============================================================================
// MAGNIFIED VIEW: viewport-sized zoomed rendering of the surface
// ============================================================================
//
// The display buffer only covers the visible viewport, never the whole zoomed
// image. Redraw requests are dirty rects in canvas pixels; the path taken
// depends on zoom and on how many display pixels the request covers:
//
//   zoom <= 1          library resize (bilinear or nearest) of the window
//   zoom  > 1, small   hand-rolled nearest-neighbour with run-length fills
//   zoom  > 1, large   cheap preview now, exact tiles as deferred jobs

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use crate::canvas::{PixelSurface, Rect, TRANSPARENT};
use crate::render::scheduler::{Scheduler, TaskHandle};

pub const MIN_ZOOM: f32 = 1.0 / 16.0;
pub const MAX_ZOOM: f32 = 16.0;

/// Clamp a requested zoom into `[1/16, 16]`. Above 1 only whole numbers are
/// allowed, so magnified pixels always map to an integer block.
pub fn clamp_zoom(zoom: f32) -> f32 {
    if !zoom.is_finite() {
        return 1.0;
    }
    let z = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    if z > 1.0 { z.round() } else { z }
}

/// Deferred redraw work queued on the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedrawJob {
    /// Debounced redraw of the whole visible viewport.
    Full { generation: u64 },
    /// One exact nearest-neighbour tile of a large-area redraw.
    Tile { generation: u64, rect: Rect },
}

/// Which path the last accepted redraw took.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedrawPath {
    Scaled,
    Nearest,
    Tiled { tiles: usize },
}

/// Counters for the renderer; cheap enough to keep always on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Rect fills emitted by the nearest-neighbour path (one per colour run).
    pub rect_fills: u64,
    /// Source pixels composited by the nearest-neighbour path.
    pub source_pixels: u64,
    pub scaled_blits: u64,
    pub previews: u64,
    pub tiles_scheduled: u64,
    pub tiles_drawn: u64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewConfig {
    /// Display-pixel area above which a magnified redraw is split into tiles.
    pub large_area_threshold: u64,
    /// Tile edge in canvas pixels.
    pub tile_size: u32,
    pub debounce_ms: u64,
    /// Bilinear (true) or nearest (false) filtering when zoomed out.
    pub smooth_downscale: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            large_area_threshold: 512 * 512,
            tile_size: 64,
            debounce_ms: 30,
            smooth_downscale: true,
        }
    }
}

/// Zoom and scroll. Scroll offsets are display pixels into the zoomed image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    pub zoom: f32,
    pub scroll_x: i32,
    pub scroll_y: i32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            scroll_x: 0,
            scroll_y: 0,
        }
    }
}

pub struct MagnifiedView {
    view: ViewState,
    canvas_w: u32,
    canvas_h: u32,
    display: RgbaImage,
    config: ViewConfig,
    debounce: Option<TaskHandle>,
    tiles: Vec<TaskHandle>,
    generation: u64,
    last_path: Option<RedrawPath>,
    stats: RenderStats,
}

impl MagnifiedView {
    pub fn new(viewport_w: u32, viewport_h: u32, config: ViewConfig) -> Self {
        Self {
            view: ViewState::default(),
            canvas_w: 0,
            canvas_h: 0,
            display: RgbaImage::new(viewport_w, viewport_h),
            config,
            debounce: None,
            tiles: Vec::new(),
            generation: 0,
            last_path: None,
            stats: RenderStats::default(),
        }
    }

    // ---- accessors ------------------------------------------------------------

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn zoom(&self) -> f32 {
        self.view.zoom
    }

    /// Display pixels per canvas pixel.
    pub fn pixel_scale(&self) -> f32 {
        self.view.zoom
    }

    pub fn display(&self) -> &RgbaImage {
        &self.display
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        self.display.dimensions()
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = RenderStats::default();
    }

    pub fn last_path(&self) -> Option<RedrawPath> {
        self.last_path
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// Tile jobs queued and not yet run.
    pub fn pending_tiles(&self) -> usize {
        self.tiles.iter().filter(|h| h.is_waiting()).count()
    }

    /// A debounced full redraw is waiting.
    pub fn has_pending_redraw(&self) -> bool {
        self.debounce.as_ref().is_some_and(TaskHandle::is_waiting)
    }

    // ---- geometry -------------------------------------------------------------

    /// Record a new canvas size and re-clamp the scroll offsets.
    pub fn set_canvas_size(&mut self, width: u32, height: u32) {
        self.canvas_w = width;
        self.canvas_h = height;
        self.clamp_scroll();
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if self.display.dimensions() != (width, height) {
            self.display = RgbaImage::new(width, height);
        }
        self.clamp_scroll();
    }

    fn zoomed_extent(&self) -> (i64, i64) {
        let z = self.view.zoom as f64;
        (
            (self.canvas_w as f64 * z).ceil() as i64,
            (self.canvas_h as f64 * z).ceil() as i64,
        )
    }

    fn clamp_scroll(&mut self) {
        let (ew, eh) = self.zoomed_extent();
        let (vw, vh) = self.display.dimensions();
        let max_x = (ew - vw as i64).max(0);
        let max_y = (eh - vh as i64).max(0);
        self.view.scroll_x = (self.view.scroll_x as i64).clamp(0, max_x) as i32;
        self.view.scroll_y = (self.view.scroll_y as i64).clamp(0, max_y) as i32;
    }

    /// Scroll to an absolute offset (clamped). Returns `true` if it moved.
    pub fn scroll_to(&mut self, x: i32, y: i32) -> bool {
        let before = (self.view.scroll_x, self.view.scroll_y);
        self.view.scroll_x = x;
        self.view.scroll_y = y;
        self.clamp_scroll();
        before != (self.view.scroll_x, self.view.scroll_y)
    }

    pub fn scroll_by(&mut self, dx: i32, dy: i32) -> bool {
        self.scroll_to(self.view.scroll_x.saturating_add(dx), self.view.scroll_y.saturating_add(dy))
    }

    /// Canvas point under the centre of the viewport.
    pub fn viewport_center(&self) -> (f64, f64) {
        let (vw, vh) = self.display.dimensions();
        self.display_to_canvas(vw as f64 / 2.0, vh as f64 / 2.0)
    }

    /// Zoom while keeping the canvas point `(anchor_x, anchor_y)` at the same
    /// display position. Returns the zoom now in effect.
    pub fn zoom_about(&mut self, zoom: f32, anchor_x: f64, anchor_y: f64) -> f32 {
        let old = self.view.zoom as f64;
        let new = clamp_zoom(zoom);
        let screen_x = anchor_x * old - self.view.scroll_x as f64;
        let screen_y = anchor_y * old - self.view.scroll_y as f64;
        self.view.zoom = new;
        self.view.scroll_x = (anchor_x * new as f64 - screen_x).round() as i32;
        self.view.scroll_y = (anchor_y * new as f64 - screen_y).round() as i32;
        self.clamp_scroll();
        new
    }

    /// Zoom about the viewport centre.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let (cx, cy) = self.viewport_center();
        self.zoom_about(zoom, cx, cy)
    }

    pub fn canvas_to_display(&self, x: f64, y: f64) -> (f64, f64) {
        let z = self.view.zoom as f64;
        (x * z - self.view.scroll_x as f64, y * z - self.view.scroll_y as f64)
    }

    pub fn display_to_canvas(&self, x: f64, y: f64) -> (f64, f64) {
        let z = self.view.zoom as f64;
        ((x + self.view.scroll_x as f64) / z, (y + self.view.scroll_y as f64) / z)
    }

    /// Canvas pixels that are at least partly visible in the viewport.
    pub fn visible_source_rect(&self) -> Option<Rect> {
        let (vw, vh) = self.display.dimensions();
        let (x0, y0) = self.display_to_canvas(0.0, 0.0);
        let (x1, y1) = self.display_to_canvas(vw as f64, vh as f64);
        let window = Rect::from_min_max(
            x0.floor() as i32,
            y0.floor() as i32,
            x1.ceil() as i32,
            y1.ceil() as i32,
        );
        window.intersect(&Rect::of_size(self.canvas_w, self.canvas_h))
    }

    // ---- scheduling -----------------------------------------------------------

    /// Debounced full redraw: any earlier pending request is cancelled and
    /// replaced by this one, together with the tiles it left queued.
    pub fn schedule_redraw(&mut self, scheduler: &mut Scheduler<RedrawJob>) {
        if let Some(prev) = self.debounce.take() {
            prev.cancel();
        }
        self.cancel_tiles();
        let job = RedrawJob::Full {
            generation: self.generation,
        };
        self.debounce = Some(scheduler.schedule(self.config.debounce_ms, job));
    }

    /// Cancel every pending job this view owns.
    pub fn cancel_pending(&mut self) {
        if let Some(prev) = self.debounce.take() {
            prev.cancel();
        }
        self.cancel_tiles();
    }

    /// Cancel queued tiles and retire their generation, so a tile already
    /// popped but not yet run is skipped too.
    fn cancel_tiles(&mut self) {
        for tile in self.tiles.drain(..) {
            tile.cancel();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Execute a job popped from the scheduler. Returns `true` if it drew.
    pub fn run_job(&mut self, surface: &PixelSurface, job: RedrawJob, scheduler: &mut Scheduler<RedrawJob>) -> bool {
        match job {
            RedrawJob::Full { .. } => {
                self.debounce = None;
                self.redraw_all(surface, scheduler)
            }
            RedrawJob::Tile { generation, rect } => {
                if generation != self.generation {
                    return false;
                }
                self.draw_nearest(surface, rect);
                self.stats.tiles_drawn += 1;
                self.tiles.retain(TaskHandle::is_waiting);
                true
            }
        }
    }

    /// Clear the display and redraw everything visible. Tile jobs left over
    /// from earlier full redraws are cancelled first.
    pub fn redraw_all(&mut self, surface: &PixelSurface, scheduler: &mut Scheduler<RedrawJob>) -> bool {
        self.cancel_tiles();
        self.set_canvas_size(surface.width(), surface.height());
        for px in self.display.pixels_mut() {
            *px = TRANSPARENT;
        }
        self.request_redraw(surface, surface.bounds(), scheduler)
    }

    // ---- rendering ------------------------------------------------------------

    /// Redraw the part of the display showing canvas rect `rect`.
    ///
    /// The rect is widened by one pixel, clamped to the canvas and to the
    /// visible window. Returns `false` when nothing visible remains.
    pub fn request_redraw(&mut self, surface: &PixelSurface, rect: Rect, scheduler: &mut Scheduler<RedrawJob>) -> bool {
        if rect.is_empty() {
            return false;
        }
        if (self.canvas_w, self.canvas_h) != (surface.width(), surface.height()) {
            self.set_canvas_size(surface.width(), surface.height());
        }
        let Some(area) = rect
            .widen(1)
            .intersect(&surface.bounds())
            .and_then(|r| self.visible_source_rect().and_then(|v| r.intersect(&v)))
        else {
            return false;
        };

        let zoom = self.view.zoom;
        let path = if zoom <= 1.0 {
            self.draw_scaled(surface, area);
            RedrawPath::Scaled
        } else {
            let z = zoom as u64;
            let display_area = area.area() * z * z;
            if display_area <= self.config.large_area_threshold {
                self.draw_nearest(surface, area);
                RedrawPath::Nearest
            } else {
                let tiles = self.draw_tiled(surface, area, scheduler);
                RedrawPath::Tiled { tiles }
            }
        };
        self.last_path = Some(path);
        true
    }

    /// Display rect covered by canvas rect `area` at the current zoom.
    fn display_rect(&self, area: Rect) -> Rect {
        let z = self.view.zoom as f64;
        let x0 = (area.x as f64 * z).floor() as i64 - self.view.scroll_x as i64;
        let y0 = (area.y as f64 * z).floor() as i64 - self.view.scroll_y as i64;
        let x1 = (area.max_x() as f64 * z).ceil() as i64 - self.view.scroll_x as i64;
        let y1 = (area.max_y() as f64 * z).ceil() as i64 - self.view.scroll_y as i64;
        Rect::from_min_max(x0 as i32, y0 as i32, (x1 as i32).max(x0 as i32 + 1), (y1 as i32).max(y0 as i32 + 1))
    }

    /// Zoom <= 1: composite the window, let the image crate resample it.
    fn draw_scaled(&mut self, surface: &PixelSurface, area: Rect) {
        let src = surface.composite_region(area);
        let dest = self.display_rect(area);
        let filter = if self.config.smooth_downscale {
            FilterType::Triangle
        } else {
            FilterType::Nearest
        };
        if dest.w as u32 == src.width() && dest.h as u32 == src.height() {
            self.paste(&src, dest.x, dest.y);
        } else {
            let scaled = imageops::resize(&src, dest.w as u32, dest.h as u32, filter);
            self.paste(&scaled, dest.x, dest.y);
        }
        self.stats.scaled_blits += 1;
    }

    /// Zoom > 1, large area: immediate nearest-resize preview of the whole
    /// area, then one deferred exact job per tile.
    fn draw_tiled(&mut self, surface: &PixelSurface, area: Rect, scheduler: &mut Scheduler<RedrawJob>) -> usize {
        let src = surface.composite_region(area);
        let dest = self.display_rect(area);
        let preview = imageops::resize(&src, dest.w as u32, dest.h as u32, FilterType::Nearest);
        self.paste(&preview, dest.x, dest.y);
        self.stats.previews += 1;

        self.tiles.retain(TaskHandle::is_waiting);
        let tile = self.config.tile_size.max(1) as i32;
        let mut count = 0;
        let mut ty = area.y;
        while ty < area.max_y() {
            let mut tx = area.x;
            while tx < area.max_x() {
                if let Some(rect) = Rect::new(tx, ty, tile, tile).intersect(&area) {
                    let job = RedrawJob::Tile {
                        generation: self.generation,
                        rect,
                    };
                    self.tiles.push(scheduler.schedule(0, job));
                    count += 1;
                }
                tx += tile;
            }
            ty += tile;
        }
        self.stats.tiles_scheduled += count as u64;
        tracing::debug!("scheduled {} redraw tiles for {:?} at zoom {}", count, area, self.view.zoom);
        count
    }

    /// Zoom > 1: nearest-neighbour expansion. Each source row is composited
    /// first, then runs of identical colour become one rect fill each.
    fn draw_nearest(&mut self, surface: &PixelSurface, area: Rect) {
        let z = self.view.zoom.round().max(1.0) as i32;
        let (scroll_x, scroll_y) = (self.view.scroll_x, self.view.scroll_y);
        let mut row: Vec<Rgba<u8>> = Vec::with_capacity(area.w as usize);

        for sy in area.y..area.max_y() {
            row.clear();
            row.extend((area.x..area.max_x()).map(|sx| surface.composite_pixel(sx as u32, sy as u32)));
            self.stats.source_pixels += row.len() as u64;

            let dy = sy * z - scroll_y;
            let mut start = 0usize;
            while start < row.len() {
                let color = row[start];
                let mut end = start + 1;
                while end < row.len() && row[end] == color {
                    end += 1;
                }
                let dx = (area.x + start as i32) * z - scroll_x;
                self.fill_display(Rect::new(dx, dy, (end - start) as i32 * z, z), color);
                self.stats.rect_fills += 1;
                start = end;
            }
        }
    }

    fn fill_display(&mut self, rect: Rect, color: Rgba<u8>) {
        let bounds = Rect::of_size(self.display.width(), self.display.height());
        let Some(r) = rect.intersect(&bounds) else { return };
        let stride = self.display.width() as usize * 4;
        let raw: &mut [u8] = &mut self.display;
        for y in r.y..r.max_y() {
            let start = y as usize * stride + r.x as usize * 4;
            let end = start + r.w as usize * 4;
            for px in raw[start..end].chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        }
    }

    fn paste(&mut self, src: &RgbaImage, x: i32, y: i32) {
        let bounds = Rect::of_size(self.display.width(), self.display.height());
        let target = Rect::new(x, y, src.width() as i32, src.height() as i32);
        let Some(r) = target.intersect(&bounds) else { return };
        for dy in r.y..r.max_y() {
            for dx in r.x..r.max_x() {
                let p = *src.get_pixel((dx - x) as u32, (dy - y) as u32);
                self.display.put_pixel(dx as u32, dy as u32, p);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{preview_pixel, CompositeMode};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn view_for(surface: &PixelSurface, vw: u32, vh: u32) -> MagnifiedView {
        let mut v = MagnifiedView::new(vw, vh, ViewConfig::default());
        v.set_canvas_size(surface.width(), surface.height());
        v
    }

    #[test]
    fn zoom_clamps_and_snaps() {
        assert_eq!(clamp_zoom(100.0), 16.0);
        assert_eq!(clamp_zoom(0.0), MIN_ZOOM);
        assert_eq!(clamp_zoom(2.6), 3.0);
        assert_eq!(clamp_zoom(0.75), 0.75);
        assert_eq!(clamp_zoom(f32::NAN), 1.0);
    }

    #[test]
    fn zoom_one_to_four_about_centre_scales_by_four() {
        let s = PixelSurface::filled(100, 100, WHITE);
        let mut v = view_for(&s, 100, 100);
        assert_eq!(v.zoom_about(4.0, 50.0, 50.0), 4.0);
        assert_eq!(v.pixel_scale(), 4.0);
        let (ax, _) = v.canvas_to_display(50.0, 50.0);
        let (bx, _) = v.canvas_to_display(51.0, 50.0);
        assert_eq!(bx - ax, 4.0);
        // The anchor stays where it was on screen.
        assert_eq!(v.canvas_to_display(50.0, 50.0), (50.0, 50.0));
    }

    #[test]
    fn request_outside_viewport_is_rejected() {
        let s = PixelSurface::filled(100, 100, WHITE);
        let mut v = view_for(&s, 20, 20);
        let mut sched = Scheduler::new();
        v.set_zoom(2.0);
        v.scroll_to(0, 0);
        assert!(!v.request_redraw(&s, Rect::new(60, 60, 5, 5), &mut sched));
        assert!(!v.request_redraw(&s, Rect::new(3, 3, 0, 5), &mut sched));
        assert!(!v.request_redraw(&s, Rect::new(500, 500, 5, 5), &mut sched));
        assert!(v.request_redraw(&s, Rect::new(2, 2, 1, 1), &mut sched));
    }

    #[test]
    fn nearest_path_fills_runs_not_pixels() {
        let mut s = PixelSurface::filled(8, 2, WHITE);
        s.plot(4, 0, RED);
        let mut v = view_for(&s, 64, 16);
        let mut sched = Scheduler::new();
        v.zoom_about(4.0, 0.0, 0.0);
        v.reset_stats();
        assert!(v.request_redraw(&s, Rect::new(0, 0, 8, 2), &mut sched));
        assert_eq!(v.last_path(), Some(RedrawPath::Nearest));
        // Row 0: white, red, white. Row 1: all white.
        assert_eq!(v.stats().rect_fills, 4);
        assert_eq!(*v.display().get_pixel(16, 0), RED);
        assert_eq!(*v.display().get_pixel(19, 3), RED);
        assert_eq!(*v.display().get_pixel(20, 0), WHITE);
        assert_eq!(*v.display().get_pixel(16, 4), WHITE);
    }

    #[test]
    fn nearest_path_splits_runs_on_partial_overlay() {
        let black = Rgba([0, 0, 0, 255]);
        let mut s = PixelSurface::filled(4, 2, WHITE);
        for y in 0..2 {
            s.base_mut().put_pixel(2, y, black);
            s.base_mut().put_pixel(3, y, black);
        }
        s.set_alpha(0.5);
        s.plot(1, 0, RED);
        s.plot(2, 0, RED);
        let over_white = preview_pixel(WHITE, RED, 0.5, CompositeMode::Normal);
        let over_black = preview_pixel(black, RED, 0.5, CompositeMode::Normal);
        assert_ne!(over_white, over_black);

        let mut v = view_for(&s, 64, 16);
        let mut sched = Scheduler::new();
        v.zoom_about(4.0, 0.0, 0.0);
        v.reset_stats();
        assert!(v.request_redraw(&s, s.bounds(), &mut sched));
        assert_eq!(v.last_path(), Some(RedrawPath::Nearest));
        // Row 0: white, mix over white, mix over black, black. Row 1: white, black.
        assert_eq!(v.stats().rect_fills, 6);
        assert_eq!(v.stats().source_pixels, 8);
        assert_eq!(*v.display().get_pixel(0, 0), WHITE);
        assert_eq!(*v.display().get_pixel(4, 0), over_white);
        assert_eq!(*v.display().get_pixel(11, 3), over_black);
        assert_eq!(*v.display().get_pixel(12, 0), black);
        assert_eq!(*v.display().get_pixel(4, 4), WHITE);
    }

    #[test]
    fn mask_mode_preview_in_magnified_view() {
        let blue = Rgba([0, 0, 255, 255]);
        let mut s = PixelSurface::filled(4, 1, blue);
        s.base_mut().put_pixel(0, 0, TRANSPARENT);
        s.set_composite_mode(CompositeMode::Mask);
        s.fill_rect(s.bounds(), RED);

        let mut v = view_for(&s, 64, 16);
        let mut sched = Scheduler::new();
        v.zoom_about(4.0, 0.0, 0.0);

        // Opaque overlay shows exactly, even over transparent paint.
        v.reset_stats();
        assert!(v.request_redraw(&s, s.bounds(), &mut sched));
        assert_eq!(v.stats().rect_fills, 1);
        assert_eq!(*v.display().get_pixel(0, 0), RED);

        // Half alpha: transparent pixels stay empty, painted ones mix.
        s.set_alpha(0.5);
        let mixed = preview_pixel(blue, RED, 0.5, CompositeMode::Mask);
        v.reset_stats();
        assert!(v.request_redraw(&s, s.bounds(), &mut sched));
        assert_eq!(v.stats().rect_fills, 2);
        assert_eq!(*v.display().get_pixel(0, 0), TRANSPARENT);
        assert_eq!(*v.display().get_pixel(4, 0), mixed);
        assert_eq!(mixed[3], 255);
    }

    #[test]
    fn zoomed_out_uses_library_resize() {
        let s = PixelSurface::filled(64, 64, RED);
        let mut v = view_for(&s, 64, 64);
        let mut sched = Scheduler::new();
        v.zoom_about(0.5, 0.0, 0.0);
        assert!(v.request_redraw(&s, s.bounds(), &mut sched));
        assert_eq!(v.last_path(), Some(RedrawPath::Scaled));
        assert_eq!(*v.display().get_pixel(10, 10), RED);
        assert_eq!(*v.display().get_pixel(40, 40), TRANSPARENT);
    }

    #[test]
    fn large_area_previews_then_tiles() {
        let s = PixelSurface::filled(128, 128, RED);
        let mut v = MagnifiedView::new(
            512,
            512,
            ViewConfig {
                large_area_threshold: 1000,
                tile_size: 32,
                ..ViewConfig::default()
            },
        );
        let mut sched = Scheduler::new();
        v.set_canvas_size(128, 128);
        v.zoom_about(4.0, 0.0, 0.0);
        assert!(v.redraw_all(&s, &mut sched));
        assert_eq!(v.last_path(), Some(RedrawPath::Tiled { tiles: 16 }));
        assert_eq!(v.stats().previews, 1);
        assert_eq!(*v.display().get_pixel(0, 0), RED);
        assert_eq!(sched.pending(), 16);

        let mut ran = 0;
        while let Some(job) = sched.next_ready() {
            assert!(v.run_job(&s, job, &mut sched));
            ran += 1;
        }
        assert_eq!(ran, 16);
        assert_eq!(v.stats().tiles_drawn, 16);
    }

    #[test]
    fn fresh_full_redraw_cancels_old_tiles() {
        let s = PixelSurface::filled(128, 128, RED);
        let mut v = MagnifiedView::new(
            512,
            512,
            ViewConfig {
                large_area_threshold: 1000,
                tile_size: 64,
                ..ViewConfig::default()
            },
        );
        let mut sched = Scheduler::new();
        v.set_canvas_size(128, 128);
        v.zoom_about(4.0, 0.0, 0.0);
        v.redraw_all(&s, &mut sched);
        assert_eq!(sched.pending(), 4);
        v.redraw_all(&s, &mut sched);
        assert_eq!(sched.pending(), 4);
    }

    #[test]
    fn scheduling_a_full_redraw_cancels_queued_tiles() {
        let s = PixelSurface::filled(128, 128, RED);
        let mut v = MagnifiedView::new(
            512,
            512,
            ViewConfig {
                large_area_threshold: 1000,
                tile_size: 32,
                ..ViewConfig::default()
            },
        );
        let mut sched = Scheduler::new();
        v.set_canvas_size(128, 128);
        v.zoom_about(4.0, 0.0, 0.0);
        v.redraw_all(&s, &mut sched);
        assert_eq!(sched.pending(), 16);

        v.schedule_redraw(&mut sched);
        assert_eq!(sched.pending(), 1);
        assert_eq!(v.pending_tiles(), 0);

        v.set_zoom(0.5);
        v.reset_stats();
        sched.advance(v.config().debounce_ms);
        let mut ran = 0;
        while let Some(job) = sched.next_ready() {
            v.run_job(&s, job, &mut sched);
            ran += 1;
        }
        assert_eq!(ran, 1);
        assert_eq!(v.stats().tiles_drawn, 0);
        assert_eq!(v.last_path(), Some(RedrawPath::Scaled));
    }

    #[test]
    fn finished_tiles_release_their_handles() {
        let s = PixelSurface::filled(64, 64, RED);
        let mut v = MagnifiedView::new(
            256,
            256,
            ViewConfig {
                large_area_threshold: 1000,
                tile_size: 16,
                ..ViewConfig::default()
            },
        );
        let mut sched = Scheduler::new();
        v.set_canvas_size(64, 64);
        v.zoom_about(4.0, 0.0, 0.0);
        for _ in 0..100 {
            assert!(v.request_redraw(&s, s.bounds(), &mut sched));
            while let Some(job) = sched.next_ready() {
                v.run_job(&s, job, &mut sched);
            }
        }
        assert_eq!(sched.pending(), 0);
        assert!(v.tiles.is_empty());
        assert_eq!(v.stats().tiles_drawn, 1600);
    }

    #[test]
    fn debounce_is_last_writer_wins() {
        let s = PixelSurface::filled(16, 16, WHITE);
        let mut v = view_for(&s, 16, 16);
        let mut sched = Scheduler::new();
        v.schedule_redraw(&mut sched);
        v.schedule_redraw(&mut sched);
        v.schedule_redraw(&mut sched);
        assert_eq!(sched.pending(), 1);
        sched.advance(v.config().debounce_ms);
        let job = sched.next_ready().unwrap();
        assert!(v.run_job(&s, job, &mut sched));
        assert!(!v.has_pending_redraw());
        assert_eq!(*v.display().get_pixel(5, 5), WHITE);
    }

    #[test]
    fn scroll_is_clamped_to_zoomed_extent() {
        let s = PixelSurface::new(10, 10);
        let mut v = view_for(&s, 20, 20);
        v.zoom_about(4.0, 0.0, 0.0);
        v.scroll_to(1000, -5);
        assert_eq!((v.view().scroll_x, v.view().scroll_y), (20, 0));
    }
}
