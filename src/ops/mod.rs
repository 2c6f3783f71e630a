// ============================================================================
// OPS MODULE: operations applied to the surface
// ============================================================================
//
//   fill.rs       : tolerance flood fill
//   canvas_ops.rs : new image, resize with anchor, crop, clear
//   clipboard.rs  : internal copy / paste buffer
// ============================================================================

pub mod canvas_ops;
pub mod clipboard;
pub mod fill;
