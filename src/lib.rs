//! Pixel compositing and history engine for a raster painting surface.
//!
//! [`CanvasManager`] is the entry point: it owns a [`PixelSurface`] (committed
//! image plus an in-progress overlay), a bounded undo [`HistoryStack`], a
//! zoomed [`MagnifiedView`] and the deferred redraw scheduler, and fires
//! [`CanvasEvent`]s after every committed change.

pub mod canvas;
pub mod cli;
pub mod components;
pub mod config;
pub mod error;
pub mod io;
pub mod logger;
pub mod manager;
pub mod ops;
pub mod render;

pub use canvas::{CompositeMode, DrawArea, PixelSurface, Rect};
pub use components::history::{HistoryStack, Snapshot};
pub use config::EngineConfig;
pub use error::{CanvasError, Result};
pub use manager::{CanvasEvent, CanvasManager};
pub use render::magnifier::MagnifiedView;
