use image::RgbaImage;
use std::collections::VecDeque;
use std::sync::Arc;
use uuid::Uuid;

/// User-visible undo levels when no configuration says otherwise.
pub const DEFAULT_UNDO_LEVELS: usize = 40;

// ============================================================================
// SNAPSHOT: immutable, size-tagged copy of the committed image
// ============================================================================

/// A frozen copy of the committed image. Pixels sit behind an `Arc`, so
/// handing a snapshot back to the caller on undo/redo never copies.
#[derive(Clone, Debug)]
pub struct Snapshot {
    id: Uuid,
    width: u32,
    height: u32,
    pixels: Arc<RgbaImage>,
}

impl Snapshot {
    pub fn capture(image: &RgbaImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            width: image.width(),
            height: image.height(),
            pixels: Arc::new(image.clone()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// An owned copy for restoring into a surface.
    pub fn to_image(&self) -> RgbaImage {
        (*self.pixels).clone()
    }

    pub fn memory_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

// ============================================================================
// HISTORY STACK: bounded ring of snapshots with an undo pointer
// ============================================================================

/// Bounded undo/redo history.
///
/// Holds at most `undo_levels + 1` snapshots: the base state plus one per
/// undoable step. Slot `pointer` is the current state; slots above it up to
/// `top` form the redo branch.
pub struct HistoryStack {
    ring: VecDeque<Snapshot>,
    capacity: usize,
    pointer: usize,
    top: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LEVELS)
    }
}

impl HistoryStack {
    pub fn new(undo_levels: usize) -> Self {
        let capacity = undo_levels.max(1) + 1;
        Self {
            ring: VecDeque::with_capacity(capacity),
            capacity,
            pointer: 0,
            top: 0,
        }
    }

    /// Maximum number of snapshots held at once.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of snapshots currently held (including the redo branch).
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drop all history and seed it with `image` as the base state.
    pub fn reset(&mut self, image: &RgbaImage) {
        self.ring.clear();
        self.ring.push_back(Snapshot::capture(image));
        self.pointer = 0;
        self.top = 0;
        tracing::debug!("history reset ({}x{})", image.width(), image.height());
    }

    /// Record `image` as the state after a new edit.
    ///
    /// Anything ahead of the pointer is overwritten. When the ring is full the
    /// oldest snapshot is evicted first.
    pub fn add(&mut self, image: &RgbaImage) {
        let snapshot = Snapshot::capture(image);
        if self.ring.is_empty() {
            self.ring.push_back(snapshot);
            self.pointer = 0;
            self.top = 0;
            return;
        }

        self.ring.truncate(self.pointer + 1);
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
            tracing::debug!("history full ({} snapshots), evicted oldest", self.capacity);
        }
        self.ring.push_back(snapshot);
        self.pointer = self.ring.len() - 1;
        self.top = self.pointer;
    }

    /// Step back one state. `None` when already at the oldest state.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if !self.has_undo() {
            return None;
        }
        self.pointer -= 1;
        self.ring.get(self.pointer)
    }

    /// Step forward one state. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if !self.has_redo() {
            return None;
        }
        self.pointer += 1;
        self.ring.get(self.pointer)
    }

    pub fn has_undo(&self) -> bool {
        self.pointer > 0
    }

    pub fn has_redo(&self) -> bool {
        self.pointer < self.top
    }

    /// The snapshot for the current state.
    pub fn current(&self) -> Option<&Snapshot> {
        self.ring.get(self.pointer)
    }

    pub fn undo_count(&self) -> usize {
        self.pointer
    }

    pub fn redo_count(&self) -> usize {
        self.top - self.pointer
    }

    /// Bytes of pixel data retained across all snapshots.
    pub fn memory_bytes(&self) -> usize {
        self.ring.iter().map(Snapshot::memory_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn img(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(2, 2, Rgba([v, v, v, 255]))
    }

    #[test]
    fn empty_history_has_nothing() {
        let mut h = HistoryStack::new(3);
        assert!(!h.has_undo());
        assert!(!h.has_redo());
        assert!(h.undo().is_none());
        assert!(h.redo().is_none());
    }

    #[test]
    fn undo_redo_walk() {
        let mut h = HistoryStack::new(5);
        h.reset(&img(0));
        h.add(&img(1));
        h.add(&img(2));
        assert_eq!(h.undo().unwrap().pixels(), &img(1));
        assert_eq!(h.undo().unwrap().pixels(), &img(0));
        assert!(h.undo().is_none());
        assert_eq!(h.redo().unwrap().pixels(), &img(1));
        assert_eq!(h.redo().unwrap().pixels(), &img(2));
        assert!(h.redo().is_none());
    }

    #[test]
    fn redo_returns_the_same_snapshot() {
        let mut h = HistoryStack::new(5);
        h.reset(&img(0));
        h.add(&img(1));
        let id = h.current().unwrap().id();
        h.undo();
        assert_eq!(h.redo().unwrap().id(), id);
    }

    #[test]
    fn add_after_undo_drops_redo_branch() {
        let mut h = HistoryStack::new(5);
        h.reset(&img(0));
        h.add(&img(1));
        h.add(&img(2));
        h.undo();
        assert!(h.has_redo());
        h.add(&img(9));
        assert!(!h.has_redo());
        assert_eq!(h.len(), 3);
        assert_eq!(h.undo().unwrap().pixels(), &img(1));
    }

    #[test]
    fn capacity_is_bounded_fifo() {
        let mut h = HistoryStack::new(3);
        assert_eq!(h.capacity(), 4);
        h.reset(&img(0));
        for v in 1..=10 {
            h.add(&img(v));
            assert!(h.len() <= h.capacity());
        }
        // Oldest retained is 7: 7, 8, 9, 10.
        assert_eq!(h.undo_count(), 3);
        while h.undo().is_some() {}
        assert_eq!(h.current().unwrap().pixels(), &img(7));
    }

    #[test]
    fn reset_discards_everything() {
        let mut h = HistoryStack::new(3);
        h.reset(&img(0));
        h.add(&img(1));
        h.reset(&img(5));
        assert_eq!(h.len(), 1);
        assert!(!h.has_undo());
        assert_eq!(h.current().unwrap().pixels(), &img(5));
    }
}
