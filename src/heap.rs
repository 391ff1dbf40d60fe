//! Fixed-capacity binary min-heap used by the k-way merge.

/// Heap entry. Ties a pending line to the chunk cursor it was read from,
/// so the merge can replenish the heap from the right source after an
/// extraction. Ordering is defined by the line alone; the chunk index is
/// payload, not a sort key.
#[derive(Debug, PartialEq, Eq)]
pub struct HeapEntry {
    pub line: String,
    pub chunk_index: usize,
}

/// Array-backed binary min-heap over [`HeapEntry`] items.
///
/// Capacity is fixed at construction to the number of merged chunks: the
/// merge holds at most one pending line per non-exhausted chunk, so an
/// insert beyond capacity is a usage defect, not a runtime condition, and
/// panics. Lines are compared with plain `String` ordering (byte-wise
/// lexicographic), the same ordering the chunks were sorted with.
pub struct MinHeap {
    entries: Vec<HeapEntry>,
    capacity: usize,
}

impl MinHeap {
    /// Creates an empty heap able to hold `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        MinHeap {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a line tagged with the index of the chunk it came from.
    ///
    /// # Panics
    /// Panics if the heap is full.
    pub fn insert(&mut self, line: String, chunk_index: usize) {
        assert!(
            self.entries.len() < self.capacity,
            "min-heap capacity ({}) exceeded",
            self.capacity
        );

        self.entries.push(HeapEntry { line, chunk_index });
        self.sift_up(self.entries.len() - 1);
    }

    /// Removes and returns the smallest entry, or [`None`] if the heap is
    /// empty. The last entry takes the root slot and is sifted down.
    pub fn extract_min(&mut self) -> Option<HeapEntry> {
        if self.entries.is_empty() {
            return None;
        }

        let last = self.entries.len() - 1;
        self.entries.swap(0, last);
        let min = self.entries.pop();
        if !self.entries.is_empty() {
            self.sift_down(0);
        }

        return min;
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.entries[parent].line <= self.entries[idx].line {
                break;
            }
            self.entries.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;

            if left < self.entries.len() && self.entries[left].line < self.entries[smallest].line {
                smallest = left;
            }
            if right < self.entries.len() && self.entries[right].line < self.entries[smallest].line {
                smallest = right;
            }

            if smallest == idx {
                break;
            }
            self.entries.swap(idx, smallest);
            idx = smallest;
        }
    }
}

#[cfg(test)]
mod test {
    use rand::seq::SliceRandom;

    use super::MinHeap;

    #[test]
    fn test_extracts_in_ascending_order() {
        let mut lines = Vec::from_iter((0..64).map(|n| format!("line-{:03}", n)));
        let sorted = lines.clone();
        lines.shuffle(&mut rand::thread_rng());

        let mut heap = MinHeap::with_capacity(lines.len());
        for (idx, line) in lines.into_iter().enumerate() {
            heap.insert(line, idx);
        }

        let mut extracted = Vec::new();
        while let Some(entry) = heap.extract_min() {
            extracted.push(entry.line);
        }

        assert_eq!(extracted, sorted);
    }

    #[test]
    fn test_empty_heap_yields_none() {
        let mut heap = MinHeap::with_capacity(4);

        assert!(heap.is_empty());
        assert!(heap.extract_min().is_none());
    }

    #[test]
    fn test_interleaved_insert_extract() {
        let mut heap = MinHeap::with_capacity(2);

        heap.insert("delta".into(), 0);
        heap.insert("bravo".into(), 1);

        let min = heap.extract_min().unwrap();
        assert_eq!(min.line, "bravo");
        assert_eq!(min.chunk_index, 1);

        // slot 1 is free again, re-insertion stays within capacity
        heap.insert("alpha".into(), 1);
        assert_eq!(heap.extract_min().unwrap().line, "alpha");
        assert_eq!(heap.extract_min().unwrap().line, "delta");
        assert!(heap.extract_min().is_none());
    }

    #[test]
    fn test_equal_lines_from_different_chunks() {
        let mut heap = MinHeap::with_capacity(3);

        heap.insert("same".into(), 0);
        heap.insert("same".into(), 1);
        heap.insert("other".into(), 2);

        assert_eq!(heap.extract_min().unwrap().line, "other");
        assert_eq!(heap.extract_min().unwrap().line, "same");
        assert_eq!(heap.extract_min().unwrap().line, "same");
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn test_insert_beyond_capacity_panics() {
        let mut heap = MinHeap::with_capacity(1);

        heap.insert("a".into(), 0);
        heap.insert("b".into(), 1);
    }
}
