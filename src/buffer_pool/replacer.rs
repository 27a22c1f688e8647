//! Victim selection for the buffer pool. A frame becomes a replacement
//! candidate the moment its pin count drops to zero, ordered by how long ago
//! that happened: `victim()` gives up the frame that has been unpinned the
//! longest. Recency here is update-on-release, not update-on-access — a page
//! fetched and immediately unpinned moves to the back; a page pinned for a
//! long read-modify-write never moves at all while it's held.

use priority_queue::PriorityQueue;

use super::FrameId;

#[derive(Debug)]
pub(super) struct LruReplacer {
    capacity: usize,
    clock: i64,
    queue: PriorityQueue<FrameId, i64>,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            clock: 0,
            queue: PriorityQueue::with_capacity(capacity),
        }
    }

    /// Gives up the least-recently-released frame, removing it from the
    /// replacer. `None` if there is nothing evictable.
    pub fn victim(&mut self) -> Option<FrameId> {
        self.queue.pop().map(|(frame_id, _)| frame_id)
    }

    /// A pinned frame can't be a victim. Idempotent: pinning a frame that's
    /// already out of the replacer (or was never in it) does nothing.
    pub fn pin(&mut self, frame_id: FrameId) {
        self.queue.remove(&frame_id);
    }

    /// A frame with no remaining pins is added as a victim candidate, most
    /// recently released last. A no-op if the frame is already a candidate,
    /// or if the replacer is already tracking as many frames as it has
    /// capacity for.
    pub fn unpin(&mut self, frame_id: FrameId) {
        if self.queue.get(&frame_id).is_some() {
            return;
        }
        if self.queue.len() >= self.capacity {
            return;
        }
        self.clock += 1;
        self.queue.push(frame_id, -self.clock);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn victim_picks_the_oldest_release_first() {
        let mut replacer = LruReplacer::new(3);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(3);
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(3));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn pin_removes_a_frame_from_consideration() {
        let mut replacer = LruReplacer::new(3);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.pin(1);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn pin_is_idempotent_on_an_absent_frame() {
        let mut replacer = LruReplacer::new(3);
        replacer.pin(42);
        assert_eq!(replacer.len(), 0);
    }

    #[test]
    fn unpin_is_a_no_op_when_already_a_candidate() {
        let mut replacer = LruReplacer::new(3);
        replacer.unpin(1);
        replacer.unpin(2);
        replacer.unpin(1); // would otherwise bump 1 to the back
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), Some(2));
    }

    #[test]
    fn unpin_respects_capacity() {
        let mut replacer = LruReplacer::new(1);
        replacer.unpin(1);
        replacer.unpin(2);
        assert_eq!(replacer.len(), 1);
        assert_eq!(replacer.victim(), Some(1));
    }
}
