//! Tracks which bytes of a TIFF block were claimed by parsed structures.
//!
//! Every IFD and every out-of-line tag datum we parse gets recorded here.
//! When the block is rewritten, all of those structures are rendered afresh,
//! so the recorded ranges become space we can reuse.

use super::error::TiffError;

/// A sorted list of non-overlapping `[start, end)` ranges. Adjacent ranges
/// are merged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangeList(Vec<(u32, u32)>);

impl RangeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ranges, lowest first.
    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records `[start, end)`.
    ///
    /// Overlapping a range we already have means the input is malformed.
    pub fn add(&mut self, start: u32, end: u32) -> Result<(), TiffError> {
        if start > end {
            log::error!("Range `[{start:#x}, {end:#x})` is backwards!");
            return Err(TiffError::InvalidRange { start, end });
        }
        if start == end {
            return Ok(());
        }

        // the first range that starts at or after our end
        let idx = self
            .0
            .iter()
            .position(|&(s, _)| s >= end)
            .unwrap_or(self.0.len());

        if idx > 0 && start < self.0[idx - 1].1 {
            log::error!("Range `[{start:#x}, {end:#x})` overlaps `{:x?}`.", self.0[idx - 1]);
            return Err(TiffError::OverlappingRange { start, end });
        }

        let touches_prev = idx > 0 && self.0[idx - 1].1 == start;
        let touches_next = idx < self.0.len() && self.0[idx].0 == end;
        match (touches_prev, touches_next) {
            (true, true) => {
                self.0[idx - 1].1 = self.0[idx].1;
                self.0.remove(idx);
            }
            (true, false) => self.0[idx - 1].1 = end,
            (false, true) => self.0[idx].0 = start,
            (false, false) => self.0.insert(idx, (start, end)),
        }

        Ok(())
    }

    /// Drops the last range if it runs up to `eof`, returning where it
    /// started. Otherwise returns `eof` as-is.
    ///
    /// Space at the end of the block isn't worth reusing; we can simply
    /// render over it.
    pub fn remove_trailer(&mut self, eof: u32) -> u32 {
        match self.0.last() {
            Some(&(start, end)) if end == eof => {
                self.0.pop();
                start
            }
            _ => eof,
        }
    }

    /// Allocates `size` bytes from the front of the largest range that can
    /// hold them. On ties, the lowest range wins.
    pub fn consume(&mut self, size: u32) -> Option<u32> {
        let mut best: Option<(usize, u32)> = None;
        for (idx, &(start, end)) in self.0.iter().enumerate() {
            let len = end - start;
            if len >= size && best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((idx, len));
            }
        }

        let (idx, len) = best?;
        let offset = self.0[idx].0;
        if len > size {
            self.0[idx].0 += size;
        } else {
            self.0.remove(idx);
        }

        log::trace!("Reusing `{size}` bytes at offset `{offset:#x}`.");
        Some(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::RangeList;
    use crate::{containers::tiff::error::TiffError, util::logger};

    #[test]
    fn adjacent_ranges_coalesce() {
        logger();

        let orders = [
            [(0, 2), (4, 6), (2, 4)],
            [(2, 4), (0, 2), (4, 6)],
            [(4, 6), (2, 4), (0, 2)],
        ];
        for order in orders {
            let mut ranges = RangeList::new();
            for (start, end) in order {
                ranges.add(start, end).unwrap();
            }
            assert_eq!(ranges.ranges(), &[(0, 6)]);
        }
    }

    #[test]
    fn overlaps_are_rejected() {
        logger();

        let mut ranges = RangeList::new();
        ranges.add(10, 20).unwrap();
        assert_eq!(
            ranges.add(15, 25),
            Err(TiffError::OverlappingRange { start: 15, end: 25 })
        );
        assert_eq!(
            ranges.add(5, 11),
            Err(TiffError::OverlappingRange { start: 5, end: 11 })
        );
        assert!(ranges.add(7, 7).is_ok());
        assert_eq!(ranges.ranges(), &[(10, 20)]);
    }

    #[test]
    fn trailer_and_consumption() {
        logger();

        let mut ranges = RangeList::new();
        ranges.add(8, 20).unwrap();
        ranges.add(30, 40).unwrap();
        ranges.add(50, 60).unwrap();

        assert_eq!(ranges.remove_trailer(70), 70);
        assert_eq!(ranges.remove_trailer(60), 50);
        assert_eq!(ranges.ranges(), &[(8, 20), (30, 40)]);

        // largest first, then the remainder of that range
        assert_eq!(ranges.consume(4), Some(8));
        assert_eq!(ranges.ranges(), &[(12, 20), (30, 40)]);
        assert_eq!(ranges.consume(10), Some(30));
        assert_eq!(ranges.consume(9), None);
        assert_eq!(ranges.consume(8), Some(12));
        assert!(ranges.is_empty());
    }
}
