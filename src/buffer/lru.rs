//! # LRU Replacer
//!
//! Tracks the eviction order of *unpinned* buffer pool frames. The contract
//! is strict: a frame appears here exactly while its pin count is zero. The
//! buffer pool calls [`LruReplacer::pin`] and [`LruReplacer::unpin`] in
//! lockstep with its pin-count transitions; the replacer itself knows nothing
//! about pages or pin counts.
//!
//! ## Structure
//!
//! A doubly-linked list threaded through a `HashMap<FrameId, Node>`, plus
//! head (most recently unpinned) and tail (least recently unpinned) anchors.
//! Every operation is O(1):
//!
//! - `unpin`: insert at the head, or move an already-tracked frame there
//! - `pin`: unlink, if present
//! - `victim`: unlink and return the tail
//!
//! ## Why not a queue?
//!
//! Re-unpinning must *promote* a frame to most-recent rather than enqueue a
//! duplicate, and pinning must remove from the middle. Both need the map for
//! O(1) node lookup.
//!
//! ## Thread Safety
//!
//! None here. The replacer is embedded in the buffer pool's state and is only
//! touched under the pool's mutex.

use hashbrown::HashMap;

use crate::config::FrameId;

#[derive(Debug, Clone, Copy)]
struct Node {
    prev: Option<FrameId>,
    next: Option<FrameId>,
}

pub struct LruReplacer {
    nodes: HashMap<FrameId, Node>,
    head: Option<FrameId>,
    tail: Option<FrameId>,
    capacity: usize,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
            capacity,
        }
    }

    /// Number of frames currently eligible for eviction.
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    fn unlink(&mut self, frame_id: FrameId) -> bool {
        let Some(node) = self.nodes.remove(&frame_id) else {
            return false;
        };

        match node.prev {
            Some(prev) => self.nodes.get_mut(&prev).expect("broken lru link").next = node.next,
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => self.nodes.get_mut(&next).expect("broken lru link").prev = node.prev,
            None => self.tail = node.prev,
        }

        true
    }

    fn push_head(&mut self, frame_id: FrameId) {
        let node = Node {
            prev: None,
            next: self.head,
        };
        if let Some(old_head) = self.head {
            self.nodes.get_mut(&old_head).expect("broken lru link").prev = Some(frame_id);
        }
        self.nodes.insert(frame_id, node);
        self.head = Some(frame_id);
        if self.tail.is_none() {
            self.tail = Some(frame_id);
        }
    }

    /// Marks a frame evictable. A frame already tracked is promoted to
    /// most-recent; an untracked frame is inserted unless the replacer is at
    /// capacity.
    pub fn unpin(&mut self, frame_id: FrameId) {
        if self.unlink(frame_id) {
            self.push_head(frame_id);
            return;
        }
        if self.nodes.len() >= self.capacity {
            return;
        }
        self.push_head(frame_id);
    }

    /// Removes a frame from eviction candidacy. No-op if untracked.
    pub fn pin(&mut self, frame_id: FrameId) {
        self.unlink(frame_id);
    }

    /// Removes and returns the least recently unpinned frame.
    pub fn victim(&mut self) -> Option<FrameId> {
        let tail = self.tail?;
        self.unlink(tail);
        Some(tail)
    }
}
