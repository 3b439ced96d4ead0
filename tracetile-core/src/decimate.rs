//! Display decimation helpers.
//!
//! Both the trace rasterizer and the demodulator reduce a run of samples to
//! at most one retained value per target slot. The rightmost sample is always
//! retained so the end of a run is never truncated.

/// Decimation stride that keeps at most `slots` values out of `count`.
///
/// Returns `ceil(count / slots)`, and never less than 1.
#[must_use]
pub fn decimation_stride(count: usize, slots: usize) -> usize {
    if slots == 0 || count <= slots {
        return 1;
    }
    count.div_ceil(slots)
}

/// Iterator over retained indices: `0, stride, 2*stride, ...` followed by
/// `count - 1` when the stride does not land on it.
#[derive(Debug, Clone)]
pub struct DecimatedIndices {
    next: usize,
    count: usize,
    stride: usize,
    tail_pending: bool,
}

impl DecimatedIndices {
    /// Creates the index sequence for `count` samples with the given stride.
    #[must_use]
    pub fn new(count: usize, stride: usize) -> Self {
        let stride = stride.max(1);
        Self {
            next: 0,
            count,
            stride,
            tail_pending: count > 0 && (count - 1) % stride != 0,
        }
    }

    /// Returns true if `index` is retained by this decimation.
    #[must_use]
    pub fn keeps(&self, index: usize) -> bool {
        index < self.count && (index % self.stride == 0 || index + 1 == self.count)
    }
}

impl Iterator for DecimatedIndices {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next < self.count {
            let index = self.next;
            self.next = self.next.saturating_add(self.stride);
            return Some(index);
        }
        if self.tail_pending {
            self.tail_pending = false;
            return Some(self.count - 1);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_is_ceiling() {
        assert_eq!(decimation_stride(10_000, 100), 100);
        assert_eq!(decimation_stride(10_001, 100), 101);
        assert_eq!(decimation_stride(50, 100), 1);
        assert_eq!(decimation_stride(0, 100), 1);
        assert_eq!(decimation_stride(100, 0), 1);
    }

    #[test]
    fn test_last_index_forced() {
        let indices: Vec<usize> = DecimatedIndices::new(10, 4).collect();
        assert_eq!(indices, vec![0, 4, 8, 9]);
    }

    #[test]
    fn test_last_index_not_duplicated() {
        let indices: Vec<usize> = DecimatedIndices::new(9, 4).collect();
        assert_eq!(indices, vec![0, 4, 8]);
    }

    #[test]
    fn test_keeps_matches_iteration() {
        let decim = DecimatedIndices::new(37, 5);
        let expected: Vec<usize> = decim.clone().collect();
        let kept: Vec<usize> = (0..40).filter(|&i| decim.keeps(i)).collect();
        assert_eq!(kept, expected);
    }

    #[test]
    fn test_empty() {
        assert_eq!(DecimatedIndices::new(0, 3).count(), 0);
    }
}
