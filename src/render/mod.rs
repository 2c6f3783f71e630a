// ============================================================================
// RENDER MODULE: zoomed display of the surface
// ============================================================================
//
// Architecture:
//   magnifier.rs: MagnifiedView: viewport-sized display buffer, zoom/scroll,
//                  scaled / nearest / tiled redraw paths
//   scheduler.rs: virtual-clock deferred job queue with cancellable handles
// ============================================================================

pub mod magnifier;
pub mod scheduler;

pub use magnifier::{MagnifiedView, RedrawJob, RedrawPath, RenderStats, ViewConfig, ViewState};
pub use scheduler::{Scheduler, TaskHandle};
