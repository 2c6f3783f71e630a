use std::collections::BTreeMap;

use image::{Rgba, RgbaImage};

use crate::canvas::{DrawArea, PixelSurface, Rect};
use crate::error::{CanvasError, Result};
use crate::ops::fill::{self, FillOutcome};

// ============================================================================
// CONTROL DESCRIPTORS: static per-tool settings, validated at registration
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum ControlDescriptor {
    Slider {
        key: &'static str,
        label: &'static str,
        min: f32,
        max: f32,
        default: f32,
    },
    Checkbox {
        key: &'static str,
        label: &'static str,
        default: bool,
    },
    /// One choice out of `options`.
    Toggle {
        key: &'static str,
        label: &'static str,
        options: Vec<&'static str>,
        default: usize,
    },
}

impl ControlDescriptor {
    pub fn key(&self) -> &'static str {
        match self {
            ControlDescriptor::Slider { key, .. }
            | ControlDescriptor::Checkbox { key, .. }
            | ControlDescriptor::Toggle { key, .. } => key,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ControlDescriptor::Slider { label, .. }
            | ControlDescriptor::Checkbox { label, .. }
            | ControlDescriptor::Toggle { label, .. } => label,
        }
    }

    pub fn default_value(&self) -> ControlValue {
        match self {
            ControlDescriptor::Slider { default, .. } => ControlValue::Number(*default),
            ControlDescriptor::Checkbox { default, .. } => ControlValue::Flag(*default),
            ControlDescriptor::Toggle { default, .. } => ControlValue::Choice(*default),
        }
    }

    fn validate(&self, tool: &str) -> Result<()> {
        let bad = |why: String| Err(CanvasError::Configuration(format!("tool '{}', control '{}': {}", tool, self.key(), why)));
        if self.key().trim().is_empty() {
            return Err(CanvasError::Configuration(format!("tool '{}' has a control with an empty key", tool)));
        }
        match self {
            ControlDescriptor::Slider { min, max, default, .. } => {
                if !(min.is_finite() && max.is_finite() && default.is_finite()) {
                    return bad("slider bounds must be finite".into());
                }
                if min >= max {
                    return bad(format!("slider min {} is not below max {}", min, max));
                }
                if default < min || default > max {
                    return bad(format!("default {} outside [{}, {}]", default, min, max));
                }
            }
            ControlDescriptor::Checkbox { .. } => {}
            ControlDescriptor::Toggle { options, default, .. } => {
                if options.len() < 2 {
                    return bad("a toggle needs at least two options".into());
                }
                if *default >= options.len() {
                    return bad(format!("default index {} out of {} options", default, options.len()));
                }
            }
        }
        Ok(())
    }

    /// Coerce `value` into this control's domain, or `None` on a type mismatch.
    fn coerce(&self, value: ControlValue) -> Option<ControlValue> {
        match (self, value) {
            (ControlDescriptor::Slider { min, max, .. }, ControlValue::Number(n)) if n.is_finite() => {
                Some(ControlValue::Number(n.clamp(*min, *max)))
            }
            (ControlDescriptor::Checkbox { .. }, ControlValue::Flag(b)) => Some(ControlValue::Flag(b)),
            (ControlDescriptor::Toggle { options, .. }, ControlValue::Choice(i)) => {
                Some(ControlValue::Choice(i.min(options.len() - 1)))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ControlValue {
    Number(f32),
    Flag(bool),
    Choice(usize),
}

/// Current values of a tool's controls.
#[derive(Clone, Debug, Default)]
pub struct ToolSettings {
    values: BTreeMap<&'static str, ControlValue>,
}

impl ToolSettings {
    pub fn get(&self, key: &str) -> Option<ControlValue> {
        self.values.get(key).copied()
    }

    pub fn number(&self, key: &str) -> Option<f32> {
        match self.get(key)? {
            ControlValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            ControlValue::Flag(b) => Some(b),
            _ => None,
        }
    }

    pub fn choice(&self, key: &str) -> Option<usize> {
        match self.get(key)? {
            ControlValue::Choice(i) => Some(i),
            _ => None,
        }
    }
}

// ============================================================================
// DRAW HANDLE: what a tool hook may touch
// ============================================================================

/// Pointer position in canvas pixels, plus where the previous event was.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    pub last_x: i32,
    pub last_y: i32,
    pub shift: bool,
}

/// Capability-limited view of the surface handed to tool hooks: overlay
/// drawing plus read-only queries. Every write extends the gesture's draw area.
pub struct DrawHandle<'a> {
    surface: &'a mut PixelSurface,
    area: &'a mut DrawArea,
    color: Rgba<u8>,
}

impl<'a> DrawHandle<'a> {
    pub fn new(surface: &'a mut PixelSurface, area: &'a mut DrawArea, color: Rgba<u8>) -> Self {
        Self { surface, area, color }
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    pub fn clip(&self) -> Option<Rect> {
        self.surface.clip()
    }

    pub fn alpha(&self) -> f32 {
        self.surface.alpha()
    }

    pub fn pick(&self, x: i32, y: i32) -> Result<Rgba<u8>> {
        self.surface.colour_pick(x, y)
    }

    pub fn plot(&mut self, x: i32, y: i32) -> bool {
        let hit = self.surface.plot(x, y, self.color);
        if hit {
            self.area.include(x, y);
        }
        hit
    }

    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, size: u32) -> Option<Rect> {
        let r = self.surface.draw_line(x0, y0, x1, y1, size, self.color)?;
        self.area.include_rect(r);
        Some(r)
    }

    pub fn fill_rect(&mut self, rect: Rect) -> Option<Rect> {
        let r = self.surface.fill_rect(rect, self.color)?;
        self.area.include_rect(r);
        Some(r)
    }

    pub fn blit(&mut self, image: &RgbaImage, x: i32, y: i32) -> Option<Rect> {
        let r = self.surface.blit_overlay(image, x, y)?;
        self.area.include_rect(r);
        Some(r)
    }

    /// Region fill into the overlay; it reaches the image when the gesture
    /// commits.
    pub fn flood_fill(&mut self, x: i32, y: i32, tolerance: u8) -> Result<FillOutcome> {
        let outcome = fill::flood_fill_overlay(self.surface, x, y, self.color, tolerance)?;
        if let Some(r) = outcome.bounds {
            self.area.include_rect(r);
        }
        Ok(outcome)
    }
}

// ============================================================================
// TOOL SPEC & REGISTRY
// ============================================================================

pub type ToolHook = Box<dyn FnMut(&mut DrawHandle<'_>, &PointerEvent, &ToolSettings)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookKind {
    Down,
    Move,
    Up,
    Shift,
}

/// A tool: static controls plus optional pointer hooks.
pub struct ToolSpec {
    pub name: &'static str,
    pub controls: Vec<ControlDescriptor>,
    pub on_down: Option<ToolHook>,
    pub on_move: Option<ToolHook>,
    pub on_up: Option<ToolHook>,
    pub on_shift: Option<ToolHook>,
    settings: ToolSettings,
}

impl ToolSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            controls: Vec::new(),
            on_down: None,
            on_move: None,
            on_up: None,
            on_shift: None,
            settings: ToolSettings::default(),
        }
    }

    pub fn control(mut self, descriptor: ControlDescriptor) -> Self {
        self.controls.push(descriptor);
        self
    }

    pub fn hook(mut self, kind: HookKind, hook: ToolHook) -> Self {
        *self.slot(kind) = Some(hook);
        self
    }

    fn slot(&mut self, kind: HookKind) -> &mut Option<ToolHook> {
        match kind {
            HookKind::Down => &mut self.on_down,
            HookKind::Move => &mut self.on_move,
            HookKind::Up => &mut self.on_up,
            HookKind::Shift => &mut self.on_shift,
        }
    }

    pub fn has_hook(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::Down => self.on_down.is_some(),
            HookKind::Move => self.on_move.is_some(),
            HookKind::Up => self.on_up.is_some(),
            HookKind::Shift => self.on_shift.is_some(),
        }
    }

    /// Run the hook for `kind` if the tool defines one. Returns whether it ran.
    pub fn call(&mut self, kind: HookKind, handle: &mut DrawHandle<'_>, event: &PointerEvent) -> bool {
        let settings = &self.settings;
        let slot = match kind {
            HookKind::Down => &mut self.on_down,
            HookKind::Move => &mut self.on_move,
            HookKind::Up => &mut self.on_up,
            HookKind::Shift => &mut self.on_shift,
        };
        match slot {
            Some(hook) => {
                hook(handle, event, settings);
                true
            }
            None => false,
        }
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Change one control value; numbers are clamped to the slider range.
    pub fn set_value(&mut self, key: &str, value: ControlValue) -> Result<ControlValue> {
        let descriptor = self
            .controls
            .iter()
            .find(|c| c.key() == key)
            .ok_or_else(|| CanvasError::Configuration(format!("tool '{}' has no control '{}'", self.name, key)))?;
        let coerced = descriptor.coerce(value).ok_or_else(|| {
            CanvasError::Configuration(format!("value {:?} does not fit control '{}' of tool '{}'", value, key, self.name))
        })?;
        self.settings.values.insert(descriptor.key(), coerced);
        Ok(coerced)
    }

    fn validate(&mut self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CanvasError::Configuration("tool name is empty".into()));
        }
        let mut seen = Vec::with_capacity(self.controls.len());
        for c in &self.controls {
            c.validate(self.name)?;
            if seen.contains(&c.key()) {
                return Err(CanvasError::Configuration(format!("tool '{}' declares control '{}' twice", self.name, c.key())));
            }
            seen.push(c.key());
        }
        self.settings.values = self.controls.iter().map(|c| (c.key(), c.default_value())).collect();
        Ok(())
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("controls", &self.controls)
            .field("on_down", &self.on_down.is_some())
            .field("on_move", &self.on_move.is_some())
            .field("on_up", &self.on_up.is_some())
            .field("on_shift", &self.on_shift.is_some())
            .finish()
    }
}

#[derive(Default, Debug)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
    active: Option<usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the pencil and the bucket, pencil active.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        // Builtin descriptors are static and known-good.
        for spec in [pencil(), bucket()] {
            if let Err(e) = reg.register(spec) {
                tracing::error!("builtin tool rejected: {}", e);
            }
        }
        reg.active = if reg.tools.is_empty() { None } else { Some(0) };
        reg
    }

    /// Validate and add a tool. Names must be unique.
    pub fn register(&mut self, mut spec: ToolSpec) -> Result<usize> {
        spec.validate()?;
        if self.tools.iter().any(|t| t.name == spec.name) {
            return Err(CanvasError::Configuration(format!("tool '{}' is already registered", spec.name)));
        }
        tracing::debug!("registered tool '{}' with {} controls", spec.name, spec.controls.len());
        self.tools.push(spec);
        Ok(self.tools.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ToolSpec> {
        self.tools.iter_mut().find(|t| t.name == name)
    }

    pub fn activate(&mut self, name: &str) -> Result<()> {
        let idx = self
            .tools
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| CanvasError::Configuration(format!("unknown tool '{}'", name)))?;
        self.active = Some(idx);
        Ok(())
    }

    pub fn active(&self) -> Option<&ToolSpec> {
        self.active.and_then(|i| self.tools.get(i))
    }

    pub fn active_mut(&mut self) -> Option<&mut ToolSpec> {
        self.active.and_then(|i| self.tools.get_mut(i))
    }
}

// ============================================================================
// BUILTIN TOOLS
// ============================================================================

/// Square-tipped freehand pencil.
pub fn pencil() -> ToolSpec {
    let stamp: ToolHook = Box::new(|h: &mut DrawHandle<'_>, ev: &PointerEvent, settings: &ToolSettings| {
        let size = settings.number("size").unwrap_or(1.0).round().max(1.0) as u32;
        h.line(ev.last_x, ev.last_y, ev.x, ev.y, size);
    });
    let dab: ToolHook = Box::new(|h: &mut DrawHandle<'_>, ev: &PointerEvent, settings: &ToolSettings| {
        let size = settings.number("size").unwrap_or(1.0).round().max(1.0) as u32;
        h.line(ev.x, ev.y, ev.x, ev.y, size);
    });
    ToolSpec::new("pencil")
        .control(ControlDescriptor::Slider {
            key: "size",
            label: "Size",
            min: 1.0,
            max: 64.0,
            default: 1.0,
        })
        .hook(HookKind::Down, dab)
        .hook(HookKind::Move, stamp)
}

/// Tolerance flood fill on pointer down.
pub fn bucket() -> ToolSpec {
    let down: ToolHook = Box::new(|h: &mut DrawHandle<'_>, ev: &PointerEvent, settings: &ToolSettings| {
        let tolerance = fill::clamp_tolerance(settings.number("tolerance").unwrap_or(0.0).round() as i32);
        if let Err(e) = h.flood_fill(ev.x, ev.y, tolerance) {
            tracing::warn!("bucket fill at ({}, {}) rejected: {}", ev.x, ev.y, e);
        }
    });
    ToolSpec::new("bucket")
        .control(ControlDescriptor::Slider {
            key: "tolerance",
            label: "Tolerance",
            min: 0.0,
            max: 255.0,
            default: 32.0,
        })
        .hook(HookKind::Down, down)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    #[test]
    fn call_if_present() {
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let mut spec = ToolSpec::new("probe").hook(
            HookKind::Shift,
            Box::new(move |_: &mut DrawHandle<'_>, _: &PointerEvent, _: &ToolSettings| {
                counter.set(counter.get() + 1)
            }),
        );
        let mut surface = PixelSurface::new(4, 4);
        let mut area = DrawArea::new();
        let mut handle = DrawHandle::new(&mut surface, &mut area, RED);
        let ev = PointerEvent::default();
        assert!(spec.call(HookKind::Shift, &mut handle, &ev));
        assert!(!spec.call(HookKind::Down, &mut handle, &ev));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn malformed_descriptors_are_rejected() {
        let mut reg = ToolRegistry::new();
        let inverted = ToolSpec::new("a").control(ControlDescriptor::Slider {
            key: "k",
            label: "K",
            min: 5.0,
            max: 1.0,
            default: 2.0,
        });
        assert!(matches!(reg.register(inverted), Err(CanvasError::Configuration(_))));

        let lonely = ToolSpec::new("b").control(ControlDescriptor::Toggle {
            key: "k",
            label: "K",
            options: vec!["only"],
            default: 0,
        });
        assert!(reg.register(lonely).is_err());

        let twice = ToolSpec::new("c")
            .control(ControlDescriptor::Checkbox { key: "k", label: "K", default: false })
            .control(ControlDescriptor::Checkbox { key: "k", label: "K", default: true });
        assert!(reg.register(twice).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = ToolRegistry::with_builtins();
        assert!(reg.register(ToolSpec::new("pencil")).is_err());
        assert_eq!(reg.names(), vec!["pencil", "bucket"]);
    }

    #[test]
    fn values_start_at_defaults_and_clamp() {
        let mut reg = ToolRegistry::with_builtins();
        let pencil = reg.get_mut("pencil").unwrap();
        assert_eq!(pencil.settings().number("size"), Some(1.0));
        assert_eq!(pencil.set_value("size", ControlValue::Number(500.0)).unwrap(), ControlValue::Number(64.0));
        assert!(pencil.set_value("size", ControlValue::Flag(true)).is_err());
        assert!(pencil.set_value("nope", ControlValue::Number(1.0)).is_err());
    }

    #[test]
    fn handle_tracks_draw_area() {
        let mut surface = PixelSurface::new(10, 10);
        let mut area = DrawArea::new();
        {
            let mut h = DrawHandle::new(&mut surface, &mut area, RED);
            h.plot(2, 3);
            h.fill_rect(Rect::new(5, 5, 2, 2));
            assert!(!h.plot(20, 20));
        }
        assert_eq!(area.rect(), Some(Rect::new(2, 3, 5, 4)));
        assert_eq!(*surface.overlay().get_pixel(2, 3), RED);
        assert_eq!(*surface.base().get_pixel(2, 3), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn handle_fill_paints_the_overlay_only() {
        let white = Rgba([255, 255, 255, 255]);
        let mut surface = PixelSurface::filled(3, 3, white);
        let mut area = DrawArea::new();
        {
            let mut h = DrawHandle::new(&mut surface, &mut area, RED);
            assert_eq!(h.flood_fill(1, 1, 0).unwrap().pixels, 9);
        }
        assert_eq!(area.rect(), Some(Rect::new(0, 0, 3, 3)));
        assert!(surface.base().pixels().all(|p| *p == white));
        assert_eq!(*surface.overlay().get_pixel(2, 2), RED);
    }
}
