// ============================================================================
// COMPONENTS MODULE: colour model, undo history, tools
// ============================================================================

pub mod colors;
pub mod history;
pub mod tools;
