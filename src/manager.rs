// ============================================================================
// CANVAS MANAGER: public contract of the engine
// ============================================================================
//
// Owns the surface, history, magnified view, scheduler, tools and clipboard.
// Every operation that changes the committed image records a history step,
// asks the view to redraw what changed and then notifies listeners.

use image::{Rgba, RgbaImage};

use crate::canvas::{CompositeMode, DrawArea, PixelSurface, Rect, TRANSPARENT};
use crate::components::colors::{self, Hsv};
use crate::components::history::{HistoryStack, Snapshot};
use crate::components::tools::{ControlValue, DrawHandle, HookKind, PointerEvent, ToolRegistry};
use crate::config::EngineConfig;
use crate::error::{CanvasError, Result};
use crate::io;
use crate::ops::canvas_ops::{self, Anchor};
use crate::ops::clipboard::Clipboard;
use crate::ops::fill::{self, FillOutcome};
use crate::render::magnifier::{MagnifiedView, RedrawJob};
use crate::render::scheduler::Scheduler;

/// Fired after an operation commits, never mid-drag.
#[derive(Clone, Debug, PartialEq)]
pub enum CanvasEvent {
    Draw,
    Zoom(f32),
    Clip(Option<Rect>),
    Copy,
    Paste,
    SetColor(String),
    SetAlpha(f32),
    Undo,
    Redo,
}

pub type Listener = Box<dyn FnMut(&CanvasEvent)>;

/// An in-progress pointer gesture.
#[derive(Clone, Copy, Debug, Default)]
struct Gesture {
    area: DrawArea,
    last: (i32, i32),
}

pub struct CanvasManager {
    config: EngineConfig,
    surface: PixelSurface,
    history: HistoryStack,
    view: MagnifiedView,
    scheduler: Scheduler<RedrawJob>,
    tools: ToolRegistry,
    clipboard: Clipboard,
    listeners: Vec<Listener>,
    color: Rgba<u8>,
    tolerance: u8,
    shift: bool,
    gesture: Option<Gesture>,
}

impl CanvasManager {
    /// A transparent `width × height` canvas.
    pub fn new(width: u32, height: u32, config: EngineConfig) -> Result<Self> {
        let image = canvas_ops::new_image(width, height, TRANSPARENT);
        Self::from_image(image, config)
    }

    pub fn from_image(image: RgbaImage, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let surface = PixelSurface::from_image(image);
        let mut history = HistoryStack::new(config.undo_levels);
        history.reset(surface.base());

        let mut view = MagnifiedView::new(config.viewport_width, config.viewport_height, config.view_config());
        view.set_canvas_size(surface.width(), surface.height());
        let mut scheduler = Scheduler::new();
        view.schedule_redraw(&mut scheduler);

        tracing::info!(
            "canvas {}x{} created (undo levels {}, viewport {}x{})",
            surface.width(),
            surface.height(),
            config.undo_levels,
            config.viewport_width,
            config.viewport_height
        );
        let mut manager = Self {
            color: config.default_color,
            tolerance: config.default_tolerance,
            config,
            surface,
            history,
            view,
            scheduler,
            tools: ToolRegistry::with_builtins(),
            clipboard: Clipboard::new(),
            listeners: Vec::new(),
            shift: false,
            gesture: None,
        };
        manager.sync_bucket_tolerance();
        Ok(manager)
    }

    // ---- events ---------------------------------------------------------------

    pub fn subscribe(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    fn emit(&mut self, event: CanvasEvent) {
        tracing::debug!("event {:?}", event);
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    // ---- accessors ------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    pub fn view(&self) -> &MagnifiedView {
        &self.view
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tools_mut(&mut self) -> &mut ToolRegistry {
        &mut self.tools
    }

    pub fn clipboard(&self) -> &Clipboard {
        &self.clipboard
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn native_cursor(&self) -> bool {
        self.config.native_cursor
    }

    pub fn colour_pick(&self, x: i32, y: i32) -> Result<Rgba<u8>> {
        self.surface.colour_pick(x, y)
    }

    /// Committed image plus whatever the overlay currently holds.
    pub fn flattened(&self) -> RgbaImage {
        self.surface.flattened()
    }

    /// The committed image encoded as a `data:` URL.
    pub fn to_data_url(&self, mime: &str) -> Result<String> {
        io::to_data_url(self.surface.base(), mime)
    }

    // ---- colour & compositing state -------------------------------------------

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn color_hex(&self) -> String {
        colors::rgba_to_hex(self.color)
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = color;
        let hex = self.color_hex();
        self.emit(CanvasEvent::SetColor(hex));
    }

    /// Set the draw colour from `#rgb`, `#rrggbb` or `#rrggbbaa`. Returns the
    /// normalised hex.
    pub fn set_color_hex(&mut self, hex: &str) -> Result<String> {
        let color = colors::parse_hex(hex).ok_or_else(|| CanvasError::InvalidFormat(format!("bad colour '{}'", hex)))?;
        self.set_color(color);
        Ok(self.color_hex())
    }

    /// Set an opaque draw colour from HSV.
    pub fn set_color_hsv(&mut self, hsv: Hsv) -> String {
        let [r, g, b] = colors::hsv_to_rgb(hsv.h, hsv.s, hsv.v);
        self.set_color(Rgba([r, g, b, 255]));
        self.color_hex()
    }

    pub fn alpha(&self) -> f32 {
        self.surface.alpha()
    }

    /// Global draw alpha, clamped to `[0, 1]`.
    pub fn set_alpha(&mut self, alpha: f32) -> f32 {
        let stored = self.surface.set_alpha(alpha);
        if stored != alpha {
            tracing::warn!("alpha {} clamped to {}", alpha, stored);
        }
        self.emit(CanvasEvent::SetAlpha(stored));
        stored
    }

    pub fn composite_mode(&self) -> CompositeMode {
        self.surface.composite_mode()
    }

    pub fn set_composite_mode(&mut self, mode: CompositeMode) {
        self.surface.set_composite_mode(mode);
    }

    pub fn tolerance(&self) -> u8 {
        self.tolerance
    }

    /// Fill tolerance for [`fill`](Self::fill) and the bucket tool.
    pub fn set_tolerance(&mut self, tolerance: i32) -> u8 {
        self.tolerance = fill::clamp_tolerance(tolerance);
        self.sync_bucket_tolerance();
        self.tolerance
    }

    fn sync_bucket_tolerance(&mut self) {
        let Some(bucket) = self.tools.get_mut("bucket") else { return };
        if let Err(e) = bucket.set_value("tolerance", ControlValue::Number(self.tolerance as f32)) {
            tracing::warn!("bucket tolerance not updated: {}", e);
        }
    }

    // ---- clip -----------------------------------------------------------------

    pub fn clip(&self) -> Option<Rect> {
        self.surface.clip()
    }

    pub fn set_clip(&mut self, rect: Rect) -> Option<Rect> {
        let clip = self.surface.set_clip(rect);
        self.emit(CanvasEvent::Clip(clip));
        clip
    }

    pub fn remove_clip(&mut self) -> bool {
        let had = self.surface.remove_clip();
        if had {
            self.emit(CanvasEvent::Clip(None));
        }
        had
    }

    // ---- history --------------------------------------------------------------

    pub fn has_undo(&self) -> bool {
        self.history.has_undo()
    }

    pub fn has_redo(&self) -> bool {
        self.history.has_redo()
    }

    pub fn undo_count(&self) -> usize {
        self.history.undo_count()
    }

    pub fn redo_count(&self) -> usize {
        self.history.redo_count()
    }

    pub fn history_memory_bytes(&self) -> usize {
        self.history.memory_bytes()
    }

    /// Forget all history; the current image becomes the oldest state.
    pub fn reset_history(&mut self) {
        self.history.reset(self.surface.base());
    }

    pub fn try_undo(&mut self) -> Result<()> {
        let image = self.history.undo().map(Snapshot::to_image).ok_or(CanvasError::NoHistory)?;
        self.restore(image);
        self.emit(CanvasEvent::Undo);
        Ok(())
    }

    pub fn try_redo(&mut self) -> Result<()> {
        let image = self.history.redo().map(Snapshot::to_image).ok_or(CanvasError::NoHistory)?;
        self.restore(image);
        self.emit(CanvasEvent::Redo);
        Ok(())
    }

    /// Step back one state. `false` at the oldest state.
    pub fn undo(&mut self) -> bool {
        match self.try_undo() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("undo: {}", e);
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.try_redo() {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("redo: {}", e);
                false
            }
        }
    }

    /// Put a snapshot back without recording history.
    fn restore(&mut self, image: RgbaImage) {
        self.gesture = None;
        if self.surface.replace_base(image) {
            self.emit(CanvasEvent::Clip(None));
        }
        self.redraw_all();
    }

    // ---- gestures -------------------------------------------------------------

    pub fn select_tool(&mut self, name: &str) -> Result<()> {
        self.tools.activate(name)
    }

    pub fn gesture_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Pointer down at a canvas pixel. Any uncommitted overlay is dropped.
    pub fn begin_gesture(&mut self, x: i32, y: i32) -> bool {
        self.surface.begin_overlay_draw();
        self.gesture = Some(Gesture {
            area: DrawArea::new(),
            last: (x, y),
        });
        self.dispatch(HookKind::Down, x, y)
    }

    pub fn move_gesture(&mut self, x: i32, y: i32) -> bool {
        self.dispatch(HookKind::Move, x, y)
    }

    /// Shift pressed or released. Forwarded to the active tool mid-gesture.
    pub fn set_shift(&mut self, shift: bool) -> bool {
        self.shift = shift;
        match self.gesture {
            Some(g) => self.dispatch(HookKind::Shift, g.last.0, g.last.1),
            None => false,
        }
    }

    /// Pointer up: commit the overlay inside the gesture's draw area, record
    /// history and fire `Draw`. Returns `false` when nothing was committed.
    pub fn end_gesture(&mut self, x: i32, y: i32) -> bool {
        if self.gesture.is_none() {
            return false;
        }
        self.dispatch(HookKind::Up, x, y);
        let area = self.gesture.take().and_then(|g| g.area.rect());
        self.commit(area)
    }

    /// Abandon the gesture, discarding its overlay paint.
    pub fn cancel_gesture(&mut self) {
        if let Some(rect) = self.gesture.take().and_then(|g| g.area.rect()) {
            self.surface.discard_overlay();
            self.redraw(rect);
        }
    }

    /// Run `draw` against a fresh overlay and commit it as one step.
    pub fn draw<F>(&mut self, draw: F) -> bool
    where
        F: FnOnce(&mut DrawHandle<'_>),
    {
        self.surface.begin_overlay_draw();
        let mut area = DrawArea::new();
        {
            let mut handle = DrawHandle::new(&mut self.surface, &mut area, self.color);
            draw(&mut handle);
        }
        self.commit(area.rect())
    }

    /// Invoke the active tool's hook and redraw whatever it touched.
    fn dispatch(&mut self, kind: HookKind, x: i32, y: i32) -> bool {
        let Some(gesture) = self.gesture.as_mut() else { return false };
        let Some(tool) = self.tools.active_mut() else { return false };
        let event = PointerEvent {
            x,
            y,
            last_x: gesture.last.0,
            last_y: gesture.last.1,
            shift: self.shift,
        };
        let mut step = DrawArea::new();
        let ran = {
            let mut handle = DrawHandle::new(&mut self.surface, &mut step, self.color);
            tool.call(kind, &mut handle, &event)
        };
        gesture.last = (x, y);
        if let Some(rect) = step.rect() {
            gesture.area.include_rect(rect);
            self.redraw(rect);
        }
        ran
    }

    fn commit(&mut self, area: Option<Rect>) -> bool {
        let Some(rect) = area else {
            self.surface.discard_overlay();
            return false;
        };
        if !self.surface.commit_overlay(rect) {
            self.surface.discard_overlay();
            self.redraw(rect);
            return false;
        }
        self.history.add(self.surface.base());
        self.redraw(rect);
        self.emit(CanvasEvent::Draw);
        true
    }

    // ---- fill -----------------------------------------------------------------

    /// Flood fill with the current colour, alpha, mode and tolerance.
    pub fn fill(&mut self, x: i32, y: i32) -> Result<FillOutcome> {
        let outcome = fill::flood_fill(&mut self.surface, x, y, self.color, self.tolerance)?;
        if let Some(rect) = outcome.bounds {
            self.history.add(self.surface.base());
            self.redraw(rect);
            self.emit(CanvasEvent::Draw);
        }
        Ok(outcome)
    }

    // ---- clipboard ------------------------------------------------------------

    /// Copy the clip region, or the whole image, to the internal clipboard.
    pub fn copy(&mut self) -> bool {
        let region = self.surface.writable_rect();
        if !self.clipboard.copy_region(self.surface.base(), region) {
            return false;
        }
        self.emit(CanvasEvent::Copy);
        true
    }

    /// Copy, then clear what was copied.
    pub fn cut(&mut self) -> bool {
        self.copy() && self.clear()
    }

    /// Paste the clipboard with its top-left at `(x, y)`.
    pub fn paste(&mut self, x: i32, y: i32) -> bool {
        let Some(image) = self.clipboard.image().cloned() else {
            return false;
        };
        self.paste_image(&image, x, y)
    }

    /// Paste an external image as one undoable step.
    pub fn paste_image(&mut self, image: &RgbaImage, x: i32, y: i32) -> bool {
        self.surface.begin_overlay_draw();
        let Some(rect) = self.surface.blit_overlay(image, x, y) else {
            return false;
        };
        if !self.surface.commit_overlay(rect) {
            return false;
        }
        self.history.add(self.surface.base());
        self.redraw(rect);
        self.emit(CanvasEvent::Paste);
        true
    }

    // ---- image lifecycle ------------------------------------------------------

    pub fn new_image(&mut self, width: u32, height: u32, background: Rgba<u8>) {
        let image = canvas_ops::new_image(width, height, background);
        self.replace_image(image, "new image");
    }

    pub fn set_image(&mut self, image: RgbaImage) {
        self.replace_image(image, "set image");
    }

    pub fn resize(&mut self, width: u32, height: u32, anchor: Anchor, keep_content: bool) {
        let image = canvas_ops::resize_canvas(self.surface.base(), width, height, anchor, keep_content, TRANSPARENT);
        self.replace_image(image, "resize");
    }

    /// Crop to the painted pixels. `false` when the image is fully transparent.
    pub fn crop_to_drawn(&mut self) -> bool {
        let Some(bounds) = self.surface.drawn_bounding_box() else { return false };
        self.crop(bounds)
    }

    pub fn crop_to_clip(&mut self) -> bool {
        let Some(clip) = self.surface.clip() else { return false };
        self.crop(clip)
    }

    fn crop(&mut self, rect: Rect) -> bool {
        match canvas_ops::crop(self.surface.base(), rect) {
            Some(image) => {
                self.replace_image(image, "crop");
                true
            }
            None => false,
        }
    }

    /// Clear the clip region (or everything) to transparent, then drop the clip.
    pub fn clear(&mut self) -> bool {
        let region = self.surface.writable_rect();
        self.surface.discard_overlay();
        let Some(cleared) = canvas_ops::clear_region(self.surface.base_mut(), region) else {
            return false;
        };
        self.remove_clip();
        self.history.add(self.surface.base());
        self.redraw(cleared);
        self.emit(CanvasEvent::Draw);
        true
    }

    fn replace_image(&mut self, image: RgbaImage, what: &str) {
        self.gesture = None;
        self.surface.replace_base(image);
        if self.surface.remove_clip() {
            self.emit(CanvasEvent::Clip(None));
        }
        self.history.add(self.surface.base());
        tracing::info!("{}: canvas is now {}x{}", what, self.width(), self.height());
        self.redraw_all();
        self.emit(CanvasEvent::Draw);
    }

    // ---- view -----------------------------------------------------------------

    pub fn zoom(&self) -> f32 {
        self.view.zoom()
    }

    /// Zoom about the viewport centre. Returns the zoom now in effect.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        let (cx, cy) = self.view.viewport_center();
        self.zoom_about(zoom, cx, cy)
    }

    /// Zoom keeping canvas point `(anchor_x, anchor_y)` fixed on screen.
    pub fn zoom_about(&mut self, zoom: f32, anchor_x: f64, anchor_y: f64) -> f32 {
        let before = self.view.zoom();
        let now = self.view.zoom_about(zoom, anchor_x, anchor_y);
        if now != before {
            self.view.schedule_redraw(&mut self.scheduler);
            self.emit(CanvasEvent::Zoom(now));
        }
        now
    }

    /// Next zoom level: +1 at or above 1, doubling below.
    pub fn zoom_in(&mut self) -> f32 {
        let z = self.view.zoom();
        let next = if z >= 1.0 { z.floor() + 1.0 } else { (z * 2.0).min(1.0) };
        self.set_zoom(next)
    }

    /// Previous zoom level: −1 above 1, halving at or below.
    pub fn zoom_out(&mut self) -> f32 {
        let z = self.view.zoom();
        let next = if z > 1.0 { z.ceil() - 1.0 } else { z / 2.0 };
        self.set_zoom(next)
    }

    pub fn scroll_to(&mut self, x: i32, y: i32) -> bool {
        let moved = self.view.scroll_to(x, y);
        if moved {
            self.view.schedule_redraw(&mut self.scheduler);
        }
        moved
    }

    pub fn scroll_by(&mut self, dx: i32, dy: i32) -> bool {
        let moved = self.view.scroll_by(dx, dy);
        if moved {
            self.view.schedule_redraw(&mut self.scheduler);
        }
        moved
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.view.set_viewport(width, height);
        self.view.schedule_redraw(&mut self.scheduler);
    }

    /// Request a debounced full redraw.
    pub fn schedule_redraw(&mut self) {
        self.view.schedule_redraw(&mut self.scheduler);
    }

    /// Redraw everything now, dropping any pending debounce.
    pub fn redraw_now(&mut self) -> bool {
        self.view.cancel_pending();
        self.view.redraw_all(&self.surface, &mut self.scheduler)
    }

    fn redraw(&mut self, rect: Rect) -> bool {
        self.view.request_redraw(&self.surface, rect, &mut self.scheduler)
    }

    fn redraw_all(&mut self) -> bool {
        self.view.redraw_all(&self.surface, &mut self.scheduler)
    }

    // ---- event loop -----------------------------------------------------------

    /// Deferred jobs still waiting.
    pub fn pending_jobs(&self) -> usize {
        self.scheduler.pending()
    }

    /// One event-loop cycle: run the next due job, if any.
    pub fn run_one(&mut self) -> bool {
        match self.scheduler.next_ready() {
            Some(job) => {
                self.view.run_job(&self.surface, job, &mut self.scheduler);
                true
            }
            None => false,
        }
    }

    /// Advance the clock by `elapsed_ms` and run every job that is due, one
    /// per cycle. Returns how many ran.
    pub fn pump(&mut self, elapsed_ms: u64) -> usize {
        self.scheduler.advance(elapsed_ms);
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        self.scheduler.purge_cancelled();
        ran
    }
}
