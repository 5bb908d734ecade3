//! Position mapping through document changes.
//!
//! A [`StepMap`] records the ranges one step replaced, in the coordinates of
//! the document before that step. A [`Mapping`] chains the maps of a whole
//! transaction so a position in the original document can be followed to the
//! final one.

use std::ops::Range;

/// Which side of an insertion a position sticks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Stay before content inserted exactly at the position.
    Left,
    /// Move past content inserted exactly at the position.
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The position was strictly inside a replaced range.
    pub deleted: bool,
}

/// One replaced range: `old_size` positions starting at `start` became
/// `new_size` positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<ChangedRange>,
}

impl StepMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn replaced(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::empty();
        }
        Self {
            ranges: vec![ChangedRange {
                start,
                old_size,
                new_size,
            }],
        }
    }

    /// Ranges must be sorted and non-overlapping, in pre-step coordinates.
    pub fn from_ranges(ranges: Vec<ChangedRange>) -> Self {
        Self {
            ranges: ranges
                .into_iter()
                .filter(|r| r.old_size > 0 || r.new_size > 0)
                .collect(),
        }
    }

    pub fn ranges(&self) -> &[ChangedRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.map_result(pos, bias).pos
    }

    pub fn map_result(&self, pos: usize, bias: Bias) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = range.start;
            if start > pos {
                break;
            }
            let end = start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    bias
                } else if pos == start {
                    Bias::Left
                } else if pos == end {
                    Bias::Right
                } else {
                    bias
                };
                let base = offset(start, diff);
                let mapped = match side {
                    Bias::Left => base,
                    Bias::Right => base + range.new_size,
                };
                let deleted = pos > start && pos < end;
                return MapResult {
                    pos: mapped,
                    deleted,
                };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        MapResult {
            pos: offset(pos, diff),
            deleted: false,
        }
    }

    /// The ranges as they appear in the post-step document.
    pub fn new_ranges(&self) -> Vec<Range<usize>> {
        let mut diff: isize = 0;
        self.ranges
            .iter()
            .map(|r| {
                let start = offset(r.start, diff);
                diff += r.new_size as isize - r.old_size as isize;
                start..start + r.new_size
            })
            .collect()
    }
}

fn offset(pos: usize, diff: isize) -> usize {
    pos.saturating_add_signed(diff)
}

/// The maps of a sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn is_identity(&self) -> bool {
        self.maps.iter().all(StepMap::is_empty)
    }

    pub fn map(&self, pos: usize, bias: Bias) -> usize {
        self.map_result(pos, bias).pos
    }

    pub fn map_result(&self, pos: usize, bias: Bias) -> MapResult {
        self.map_result_from(0, pos, bias)
    }

    /// Maps through the maps starting at index `from`.
    pub fn map_result_from(&self, from: usize, pos: usize, bias: Bias) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps[from.min(self.maps.len())..] {
            let result = map.map_result(pos, bias);
            deleted |= result.deleted;
            pos = result.pos;
        }
        MapResult { pos, deleted }
    }

    /// Follows a position to the final document, or `None` when the content
    /// around it was removed or replaced.
    pub fn remap(&self, pos: usize) -> Option<usize> {
        let result = self.map_result(pos, Bias::Right);
        (!result.deleted).then_some(result.pos)
    }

    /// Every range any step replaced, expressed in final coordinates.
    pub fn touched_ranges(&self) -> Vec<Range<usize>> {
        let mut out = Vec::new();
        for (i, map) in self.maps.iter().enumerate() {
            for range in map.new_ranges() {
                let start = self.map_result_from(i + 1, range.start, Bias::Left).pos;
                let end = self.map_result_from(i + 1, range.end, Bias::Right).pos;
                out.push(start..end.max(start));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_after_insertion_shift() {
        let map = StepMap::replaced(5, 0, 3);
        assert_eq!(map.map(2, Bias::Right), 2);
        assert_eq!(map.map(7, Bias::Left), 10);
        assert_eq!(map.map(5, Bias::Left), 5);
        assert_eq!(map.map(5, Bias::Right), 8);
    }

    #[test]
    fn positions_inside_deletion_are_flagged() {
        let map = StepMap::replaced(4, 4, 0);
        assert_eq!(
            map.map_result(6, Bias::Right),
            MapResult {
                pos: 4,
                deleted: true
            }
        );
        assert_eq!(
            map.map_result(4, Bias::Right),
            MapResult {
                pos: 4,
                deleted: false
            }
        );
        assert_eq!(
            map.map_result(8, Bias::Left),
            MapResult {
                pos: 4,
                deleted: false
            }
        );
        assert_eq!(map.map(10, Bias::Left), 6);
    }

    #[test]
    fn mapping_remaps_through_steps() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::replaced(0, 0, 2));
        mapping.push(StepMap::replaced(10, 3, 0));
        assert_eq!(mapping.remap(5), Some(7));
        assert_eq!(mapping.remap(9), None);
        assert_eq!(mapping.remap(20), Some(19));
    }

    #[test]
    fn touched_ranges_follow_later_steps() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::replaced(10, 0, 4));
        mapping.push(StepMap::replaced(0, 0, 2));
        assert_eq!(mapping.touched_ranges(), vec![12..16, 0..2]);
    }
}
