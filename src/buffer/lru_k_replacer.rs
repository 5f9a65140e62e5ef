use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history is bounded at `max(k, HISTORY_RETENTION)` samples.
const HISTORY_RETENTION: usize = 4;

/// Per-frame access history tracked by the replacer.
#[derive(Debug)]
struct LruKNode {
    /// Access timestamps, most recent at the back.
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl LruKNode {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    /// Records an access at the given timestamp.
    fn record(&mut self, timestamp: Timestamp, retention: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > retention {
            self.history.pop_front();
        }
    }

    /// Backward k-distance from `now`, or None for +inf (fewer than k
    /// recorded accesses).
    fn k_distance(&self, now: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            // The kth most recent access sits at index (len - k).
            Some(now - self.history[self.history.len() - k])
        }
    }

    /// The oldest retained access timestamp.
    fn earliest_timestamp(&self) -> Timestamp {
        self.history.front().copied().unwrap_or(0)
    }
}

/// State behind the replacer mutex: the node store and the evictable count.
struct ReplacerInner {
    nodes: HashMap<FrameId, LruKNode>,
    num_evictable: usize,
}

/// LRU-K Replacement Policy
///
/// The LRU-K algorithm evicts the frame whose backward k-distance is the
/// maximum over all evictable frames, where backward k-distance is the
/// difference between the current timestamp and the timestamp of the kth
/// most recent access.
///
/// A frame with fewer than k historical accesses has +inf backward
/// k-distance. When several frames are at +inf, the one with the earliest
/// overall access timestamp is evicted (classical LRU among the
/// under-sampled frames).
///
/// Timestamps come from a monotonic counter bumped on every recorded
/// access, never from the wall clock.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    num_frames: usize,
    /// Samples kept per frame
    retention: usize,
    /// Current timestamp (monotonically increasing)
    current_timestamp: AtomicU64,
    /// Node store and evictable count
    inner: Mutex<ReplacerInner>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer tracking up to `num_frames` frames.
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(num_frames > 0, "replacer needs at least one frame");
        assert!(k >= 1, "k must be at least 1");
        Self {
            k,
            num_frames,
            retention: k.max(HISTORY_RETENTION),
            current_timestamp: AtomicU64::new(0),
            inner: Mutex::new(ReplacerInner {
                nodes: HashMap::new(),
                num_evictable: 0,
            }),
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance and
    /// drops its access history. Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if inner.num_evictable == 0 {
            return None;
        }

        let now = self.current_timestamp.load(Ordering::Relaxed);

        // (frame, k-distance, earliest access) of the best candidate so far.
        let mut victim: Option<(FrameId, Option<Timestamp>, Timestamp)> = None;

        for (&frame_id, node) in inner.nodes.iter() {
            if !node.is_evictable {
                continue;
            }
            let k_dist = node.k_distance(now, self.k);
            let earliest = node.earliest_timestamp();

            let better = match &victim {
                None => true,
                // Current best has finite distance: any +inf candidate wins,
                // otherwise the larger distance wins.
                Some((_, Some(best_dist), _)) => match k_dist {
                    None => true,
                    Some(dist) => dist > *best_dist,
                },
                // Current best is +inf: only an earlier +inf candidate wins.
                Some((_, None, best_earliest)) => {
                    k_dist.is_none() && earliest < *best_earliest
                }
            };
            if better {
                victim = Some((frame_id, k_dist, earliest));
            }
        }

        let (frame_id, _, _) = victim?;
        inner.nodes.remove(&frame_id);
        inner.num_evictable -= 1;
        Some(frame_id)
    }

    /// Records that the given frame was accessed, stamping it with the next
    /// value of the monotonic counter. A first access creates the frame's
    /// node, non-evictable.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.num_frames {
            return;
        }

        let mut guard = self.inner.lock();
        let timestamp = self.current_timestamp.fetch_add(1, Ordering::Relaxed);
        guard
            .nodes
            .entry(frame_id)
            .or_insert_with(LruKNode::new)
            .record(timestamp, self.retention);
    }

    /// Sets whether a frame is evictable, adjusting `size()` accordingly.
    /// An unknown frame is a no-op.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(node) = inner.nodes.get_mut(&frame_id) {
            if node.is_evictable != evictable {
                node.is_evictable = evictable;
                if evictable {
                    inner.num_evictable += 1;
                } else {
                    inner.num_evictable -= 1;
                }
            }
        }
    }

    /// Removes a frame from the replacer entirely, to be called when the
    /// frame's page is deleted. An unknown frame is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the frame exists and is not evictable; removing a pinned
    /// frame is a caller bug.
    pub fn remove(&self, frame_id: FrameId) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(node) = inner.nodes.get(&frame_id) {
            assert!(
                node.is_evictable,
                "cannot remove non-evictable frame {frame_id} from the replacer"
            );
            inner.nodes.remove(&frame_id);
            inner.num_evictable -= 1;
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.inner.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
