//! Scrollbar index mapping: pointer coordinates to frame slots
//!
//! **Why**: while a session is still filling in, a click must land on the
//! nearest loaded frame, never on an empty slot. The heavy lifting happens
//! once per loaded segment (`add_segment` re-partitions the click regions
//! incrementally), so pointer drags and key steps stay O(region width) with
//! no rescans.
//!
//! **Used by**: Pane (index for the displayed frame), Viewer (scrub input)

/// Pure math mapping a pointer x coordinate to a discrete bucket and back.
#[derive(Debug, Clone, Copy)]
pub struct IndexSpace {
    left: f32,
    width: f32,
    buckets: usize,
}

impl IndexSpace {
    pub fn new(left: f32, width: f32, buckets: usize) -> Self {
        Self { left, width, buckets }
    }

    /// Linear map of `[left, left+width)` onto `[0, buckets)`, floored and
    /// clamped into `[0, buckets-1]`.
    pub fn index_at(&self, x: f32) -> usize {
        if self.buckets == 0 || self.width <= 0.0 {
            return 0;
        }
        let raw = (x - self.left) / self.width * self.buckets as f32;
        (raw.floor().max(0.0) as usize).min(self.buckets - 1)
    }

    /// Center x of a bucket, for drawing the position indicator.
    pub fn x_of(&self, index: usize) -> f32 {
        self.left + self.bucket_width() * (0.5 + index as f32)
    }

    pub fn bucket_width(&self) -> f32 {
        if self.buckets == 0 {
            self.width
        } else {
            self.width / self.buckets as f32
        }
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.left + self.width
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }
}

/// Discrete position state for one pane: segment presence, the click-region
/// partition, and the current index.
#[derive(Debug, Clone)]
pub struct Scrollbar {
    space: IndexSpace,
    present: Vec<bool>,
    owner: Vec<Option<usize>>,
    index: Option<usize>,
    count: usize,
}

impl Scrollbar {
    pub fn new(left: f32, width: f32, capacity: usize) -> Self {
        Self {
            space: IndexSpace::new(left, width, capacity),
            present: vec![false; capacity],
            owner: vec![None; capacity],
            index: None,
            count: 0,
        }
    }

    /// Reinitialize to a new capacity: clears presence, ownership and the
    /// current index, and recomputes the bucket width.
    pub fn reset_to_capacity(&mut self, capacity: usize) {
        self.space = IndexSpace::new(self.space.left, self.space.width, capacity);
        self.present = vec![false; capacity];
        self.owner = vec![None; capacity];
        self.index = None;
        self.count = 0;
    }

    /// Move/resize the bar without touching load state.
    pub fn set_bounds(&mut self, left: f32, width: f32) {
        self.space = IndexSpace::new(left, width, self.present.len());
    }

    /// Record that `slot` finished loading and claim its click region.
    ///
    /// The boundary with the nearest present neighbor on either side is the
    /// ceiling midpoint of the two slot numbers; with no neighbor the region
    /// runs to the respective end. The first segment also becomes the
    /// current index.
    pub fn add_segment(&mut self, slot: usize) {
        if slot >= self.present.len() || self.present[slot] {
            return;
        }
        self.present[slot] = true;
        self.count += 1;

        let lower = match (0..slot).rev().find(|&i| self.present[i]) {
            Some(prev) => (prev + slot).div_ceil(2),
            None => 0,
        };
        let upper = match (slot + 1..self.present.len()).find(|&i| self.present[i]) {
            Some(next) => (next + slot).div_ceil(2),
            None => self.present.len(),
        };
        for bucket in lower..upper {
            self.owner[bucket] = Some(slot);
        }

        if self.index.is_none() {
            self.index = Some(slot);
        }
    }

    /// Resolve a pointer x to its raw bucket, then snap the current index to
    /// that bucket's owner. Returns the raw bucket, or None when x is
    /// outside the bar.
    pub fn update_index_from_pointer(&mut self, x: f32) -> Option<usize> {
        if !self.space.contains(x) {
            return None;
        }
        let bucket = self.space.index_at(x);
        if Some(bucket) != self.index
            && let Some(owner) = self.owner[bucket]
        {
            self.set_index(owner);
        }
        Some(bucket)
    }

    /// Direct index update, clamped into range; reverts if the target slot
    /// has no segment yet.
    pub fn set_index(&mut self, index: usize) -> Option<usize> {
        let saved = self.index;
        let clamped = index.min(self.present.len().saturating_sub(1));
        if self.present.get(clamped).copied().unwrap_or(false) {
            self.index = Some(clamped);
        } else {
            self.index = saved;
        }
        self.index
    }

    /// Step up to the next distinct click region, snapping to its owner.
    /// Defensive no-op when that owner is not a present segment.
    pub fn increment_index(&mut self) -> Option<usize> {
        let saved = self.index;
        let len = self.owner.len();
        let mut cur = self.index?;
        loop {
            cur += 1;
            let same = cur < len && self.owner[cur] == self.owner[cur - 1];
            if !(same && cur < len - 1) {
                break;
            }
        }
        let target = if cur < len { self.owner[cur] } else { None };
        self.index = match target {
            Some(t) if self.present[t] => Some(t),
            _ => saved,
        };
        self.index
    }

    /// Step down to the previous distinct click region. Inverse of
    /// `increment_index` over the sequence of distinct owned slots.
    pub fn decrement_index(&mut self) -> Option<usize> {
        let saved = self.index;
        let mut cur = self.index?;
        if cur == 0 {
            return self.index;
        }
        loop {
            cur -= 1;
            let same = self.owner[cur] == self.owner[cur + 1];
            if !(same && cur > 0) {
                break;
            }
        }
        self.index = match self.owner[cur] {
            Some(t) if self.present[t] => Some(t),
            _ => saved,
        };
        self.index
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// Raw pointer-to-bucket mapping (no snapping, no state change).
    pub fn index_from_pointer(&self, x: f32) -> usize {
        self.space.index_at(x)
    }

    pub fn owner_of(&self, bucket: usize) -> Option<usize> {
        self.owner.get(bucket).copied().flatten()
    }

    pub fn has_segment(&self, slot: usize) -> bool {
        self.present.get(slot).copied().unwrap_or(false)
    }

    /// True once any segment has loaded.
    pub fn is_ready(&self) -> bool {
        self.count > 0
    }

    pub fn capacity(&self) -> usize {
        self.present.len()
    }

    pub fn space(&self) -> &IndexSpace {
        &self.space
    }
}
