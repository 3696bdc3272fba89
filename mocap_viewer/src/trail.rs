//! Bounded per-marker position history. Every marker owns one ring buffer
//! whose capacity is the shared `maxlen`; capacity changes rebuild each ring
//! in place, keeping the most recent points.

use std::collections::VecDeque;

/// Default cyclic marker palette; markers pick `palette[index % len]`.
pub const DEFAULT_PALETTE: [[f32; 3]; 8] = [
    [0.20, 0.95, 0.85],
    [0.98, 0.74, 0.28],
    [0.25, 0.60, 0.95],
    [0.95, 0.35, 0.25],
    [0.28, 0.82, 0.52],
    [0.85, 0.45, 0.90],
    [0.90, 0.90, 0.30],
    [0.80, 0.80, 0.85],
];

#[derive(Debug)]
struct MarkerTrail {
    points: VecDeque<[f32; 3]>,
    visible: bool,
}

#[derive(Debug)]
pub struct TrailSet {
    trails: Vec<MarkerTrail>,
    palette: Vec<[f32; 3]>,
    maxlen: usize,
}

impl TrailSet {
    /// Build one empty ring per marker. History starts at a single point so
    /// a fresh session shows current positions only.
    pub fn new(marker_count: usize) -> Self {
        Self::with_palette(marker_count, DEFAULT_PALETTE.to_vec())
    }

    pub fn with_palette(marker_count: usize, palette: Vec<[f32; 3]>) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            palette
        };
        let trails = (0..marker_count)
            .map(|_| MarkerTrail {
                points: VecDeque::with_capacity(1),
                visible: true,
            })
            .collect();
        Self {
            trails,
            palette,
            maxlen: 1,
        }
    }

    pub fn marker_count(&self) -> usize {
        self.trails.len()
    }

    pub fn maxlen(&self) -> usize {
        self.maxlen
    }

    pub fn color(&self, marker_index: usize) -> [f32; 3] {
        self.palette[marker_index % self.palette.len()]
    }

    pub fn is_visible(&self, marker_index: usize) -> bool {
        self.trails[marker_index].visible
    }

    /// Flip a marker's visibility. Out-of-range indices are ignored so digit
    /// keys past the marker count stay inert.
    pub fn toggle_visible(&mut self, marker_index: usize) {
        if let Some(trail) = self.trails.get_mut(marker_index) {
            trail.visible = !trail.visible;
        }
    }

    /// Push one point onto a marker's ring, evicting the oldest at capacity.
    pub fn append(&mut self, marker_index: usize, position: [f32; 3]) {
        let maxlen = self.maxlen;
        let trail = &mut self.trails[marker_index];
        if trail.points.len() == maxlen {
            trail.points.pop_front();
        }
        trail.points.push_back(position);
    }

    /// Resize every ring, preserving the most recent
    /// `min(old_len, new_maxlen)` points. Effective immediately for
    /// subsequent appends.
    pub fn set_capacity(&mut self, new_maxlen: usize) {
        let new_maxlen = new_maxlen.max(1);
        for trail in &mut self.trails {
            while trail.points.len() > new_maxlen {
                trail.points.pop_front();
            }
        }
        self.maxlen = new_maxlen;
    }

    /// Double the shared capacity. No ceiling: growth is bounded only by
    /// what the operator asks for.
    pub fn grow(&mut self) {
        self.set_capacity(self.maxlen * 2);
    }

    /// Halve the shared capacity, floored at one point.
    pub fn shrink(&mut self) {
        self.set_capacity((self.maxlen / 2).max(1));
    }

    pub fn points(&self, marker_index: usize) -> impl Iterator<Item = &[f32; 3]> {
        self.trails[marker_index].points.iter()
    }

    /// Iterate `(marker_index, color, point)` over every visible trail point.
    pub fn visible_points(&self) -> impl Iterator<Item = (usize, [f32; 3], [f32; 3])> + '_ {
        self.trails
            .iter()
            .enumerate()
            .filter(|(_, trail)| trail.visible)
            .flat_map(|(index, trail)| {
                let color = self.color(index);
                trail.points.iter().map(move |point| (index, color, *point))
            })
    }

    pub fn total_points(&self) -> usize {
        self.trails.iter().map(|trail| trail.points.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collected(trails: &TrailSet, marker: usize) -> Vec<[f32; 3]> {
        trails.points(marker).copied().collect()
    }

    #[test]
    fn append_evicts_oldest_at_capacity() {
        let mut trails = TrailSet::new(1);
        trails.set_capacity(3);
        for step in 0..5 {
            trails.append(0, [step as f32, 0.0, 0.0]);
        }
        assert_eq!(
            collected(&trails, 0),
            vec![[2.0, 0.0, 0.0], [3.0, 0.0, 0.0], [4.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn length_never_exceeds_maxlen_across_capacity_changes() {
        let mut trails = TrailSet::new(2);
        let capacities = [4usize, 2, 7, 1, 3];
        let mut step = 0;
        for capacity in capacities {
            trails.set_capacity(capacity);
            for _ in 0..capacity + 2 {
                trails.append(0, [step as f32, 0.0, 0.0]);
                trails.append(1, [0.0, step as f32, 0.0]);
                step += 1;
                assert!(trails.points(0).count() <= trails.maxlen());
                assert!(trails.points(1).count() <= trails.maxlen());
            }
        }
    }

    #[test]
    fn growing_preserves_points_in_order() {
        let mut trails = TrailSet::new(1);
        trails.set_capacity(4);
        for step in 0..4 {
            trails.append(0, [step as f32, 0.0, 0.0]);
        }
        let before = collected(&trails, 0);
        trails.set_capacity(8);
        assert_eq!(trails.maxlen(), 8);
        assert_eq!(collected(&trails, 0), before);
    }

    #[test]
    fn shrinking_keeps_the_most_recent_points() {
        let mut trails = TrailSet::new(1);
        trails.set_capacity(5);
        for step in 0..5 {
            trails.append(0, [step as f32, 0.0, 0.0]);
        }
        trails.set_capacity(2);
        assert_eq!(
            collected(&trails, 0),
            vec![[3.0, 0.0, 0.0], [4.0, 0.0, 0.0]]
        );
    }

    #[test]
    fn capacity_floor_is_one() {
        let mut trails = TrailSet::new(1);
        trails.shrink();
        trails.shrink();
        assert_eq!(trails.maxlen(), 1);
        trails.set_capacity(0);
        assert_eq!(trails.maxlen(), 1);
    }

    #[test]
    fn toggle_visible_never_touches_points() {
        let mut trails = TrailSet::new(1);
        trails.set_capacity(3);
        trails.append(0, [1.0, 2.0, 3.0]);
        trails.append(0, [4.0, 5.0, 6.0]);
        let before = collected(&trails, 0);

        trails.toggle_visible(0);
        assert!(!trails.is_visible(0));
        assert_eq!(collected(&trails, 0), before);

        trails.toggle_visible(0);
        assert!(trails.is_visible(0));
        assert_eq!(collected(&trails, 0), before);
    }

    #[test]
    fn out_of_range_toggle_is_ignored() {
        let mut trails = TrailSet::new(2);
        trails.toggle_visible(9);
        assert!(trails.is_visible(0));
        assert!(trails.is_visible(1));
    }

    #[test]
    fn hidden_markers_drop_out_of_visible_points() {
        let mut trails = TrailSet::new(2);
        trails.append(0, [1.0, 0.0, 0.0]);
        trails.append(1, [2.0, 0.0, 0.0]);
        trails.toggle_visible(0);
        let visible: Vec<_> = trails.visible_points().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].0, 1);
        assert_eq!(visible[0].2, [2.0, 0.0, 0.0]);
    }

    #[test]
    fn palette_cycles_by_index() {
        let trails = TrailSet::new(20);
        let len = DEFAULT_PALETTE.len();
        assert_eq!(trails.color(0), DEFAULT_PALETTE[0]);
        assert_eq!(trails.color(len + 3), DEFAULT_PALETTE[3]);
    }

    #[test]
    fn empty_palette_preset_falls_back_to_default() {
        let trails = TrailSet::with_palette(1, Vec::new());
        assert_eq!(trails.color(0), DEFAULT_PALETTE[0]);
    }
}
