use log::debug;

use crate::{
    graph::AssemblyGraph,
    seg::{SegId, SignedSeg},
};

const INITIAL_TOLERANCE: f64 = 0.1;
const PROPAGATION_TOLERANCE: f64 = 0.2;
const MIN_HALF_MEDIAN_FOR_DIPLOID: f64 = 0.1;
const MIN_SINGLE_COPY_LENGTH: usize = 1000;

impl AssemblyGraph {
    /// Assigns a copy depth vector to each segment in the graph: a
    /// descending list of per-copy depths summing to the segment's depth.
    ///
    /// Seeds single-copy segments near the graph's single-copy depth, then
    /// propagates outward with the merge and redistribute rules until
    /// nothing changes, reseeding from the longest unassigned segment as
    /// needed. A final pass with no tolerance completes the stragglers.
    pub fn determine_copy_depth(&mut self) {
        self.copy_depths.clear();

        // In haploid and some diploid cases the single-copy depth is the
        // median depth. In other diploid cases the median sits on the
        // sequence shared between sister chromosomes, so the single-copy
        // depth is near half the median. We check whether the graph peaks
        // more strongly at half the median than at double.
        let median_depth = self.median_read_depth();
        debug!("median graph depth: {median_depth:.3}");
        let near_half = self.base_count_in_depth_range(median_depth * 0.4, median_depth * 0.6);
        let near_double = self.base_count_in_depth_range(median_depth * 1.6, median_depth * 2.4);
        let total_bases = self.total_length();
        let single_copy_depth = if total_bases > 0 {
            let half_frac = near_half as f64 / total_bases as f64;
            let double_frac = near_double as f64 / total_bases as f64;
            if half_frac > double_frac && half_frac >= MIN_HALF_MEDIAN_FOR_DIPLOID {
                median_depth / 2.0
            } else {
                median_depth
            }
        } else {
            median_depth
        };
        debug!("single-copy depth: {single_copy_depth:.3}");

        let max_depth = single_copy_depth + INITIAL_TOLERANCE;
        let ids: Vec<SegId> = self.segments.keys().copied().collect();
        for id in ids {
            let depth = self.segments[&id].depth;
            if depth <= max_depth && self.at_most_one_link_per_end(id) {
                self.copy_depths.insert(id, vec![depth]);
            }
        }

        self.propagate_copy_depths(PROPAGATION_TOLERANCE);
        loop {
            let assigned = self.assign_single_copy_depth(MIN_SINGLE_COPY_LENGTH);
            self.propagate_copy_depths(PROPAGATION_TOLERANCE);
            if !assigned {
                break;
            }
        }
        // No tolerance threshold: complete whatever remains.
        self.propagate_copy_depths(1.0);
    }

    /// Propagates copy depths repeatedly until neither rule assigns.
    fn propagate_copy_depths(&mut self, tolerance: f64) {
        loop {
            while self.merge_copy_depths(tolerance) {}
            if !self.redistribute_copy_depths(tolerance) {
                break;
            }
        }
    }

    /// Seeds the longest still-unassigned segment that has exactly one link
    /// per end as a single copy.
    fn assign_single_copy_depth(&mut self, min_single_copy_length: usize) -> bool {
        let mut candidates = self.segments_without_copies();
        candidates.sort_by(|a, b| {
            let (a_len, b_len) = (self.segments[a].len(), self.segments[b].len());
            b_len.cmp(&a_len).then(a.cmp(b))
        });
        for id in candidates {
            if self.segments[&id].len() < min_single_copy_length {
                continue;
            }
            if self.exactly_one_link_per_end(id) {
                let depth = self.segments[&id].depth;
                debug!("new single copy: {id} ({depth:.2}x)");
                self.copy_depths.insert(id, vec![depth]);
                return true;
            }
        }
        false
    }

    /// The merge rule: a segment whose exclusive inputs (or outputs) all
    /// carry copy depths can take on the union of those depths, scaled to
    /// its own depth. Across all such candidates the globally lowest
    /// scaling error wins; nothing happens unless it beats the margin.
    fn merge_copy_depths(&mut self, error_margin: f64) -> bool {
        let unassigned = self.segments_without_copies();
        if unassigned.is_empty() {
            return false;
        }

        let mut best: Option<(SegId, Vec<f64>)> = None;
        let mut lowest_error = f64::INFINITY;
        for &id in &unassigned {
            for sources in [self.exclusive_inputs(id), self.exclusive_outputs(id)] {
                if sources.is_empty() || !self.all_have_copy_depths(&sources) {
                    continue;
                }
                let (depths, error) = self.scale_copy_depths_from_sources(id, &sources);
                if error < lowest_error {
                    lowest_error = error;
                    best = Some((id, depths));
                }
            }
        }
        match best {
            Some((id, depths)) if lowest_error < error_margin => {
                debug!("merged copy depths onto {id} (error {lowest_error:.3})");
                self.copy_depths.insert(id, depths);
                true
            }
            _ => false,
        }
    }

    /// The redistribute rule: a segment holding two or more copy depths
    /// whose exclusive inputs (or outputs) lack copy depths shares its
    /// depths out among them. All partitions of the depths into per
    /// neighbour bins are tried; the one with the smallest worst-case
    /// scaling error wins if it beats the margin.
    fn redistribute_copy_depths(&mut self, error_margin: f64) -> bool {
        for id in self.segments_with_multiple_copies() {
            let mut connections = self.exclusive_inputs(id);
            if connections.is_empty() || self.all_have_copy_depths(&connections) {
                connections = self.exclusive_outputs(id);
            }
            if connections.is_empty() || self.all_have_copy_depths(&connections) {
                continue;
            }

            let copy_depths = self.copy_depths[&id].clone();
            let targets: Vec<Option<usize>> = connections
                .iter()
                .map(|c| self.copy_depths.get(c).map(Vec::len))
                .collect();
            let bins = vec![vec![]; connections.len()];
            let arrangements = shuffle_into_bins(&copy_depths, bins, &targets);

            let mut best: Option<&Vec<Vec<f64>>> = None;
            let mut lowest_error = f64::INFINITY;
            for arrangement in &arrangements {
                let error = self.error_for_segments_and_depths(&connections, arrangement);
                if error < lowest_error {
                    lowest_error = error;
                    best = Some(arrangement);
                }
            }
            if lowest_error < error_margin {
                if let Some(arrangement) = best {
                    if self.assign_copy_depths_where_needed(&connections, arrangement, error_margin)
                    {
                        debug!("split copies of {id} across {connections:?}");
                        return true;
                    }
                }
            }
        }
        false
    }

    /// When a bridge consumes a segment by some depth, that depth comes off
    /// the segment (clamped at zero) and the closest copy depth entry is
    /// dropped.
    pub fn remove_segment_depth(&mut self, seg: SignedSeg, amount: f64) {
        let id = seg.id();
        let Some(segment) = self.segments.get_mut(&id) else {
            return;
        };
        segment.remove_depth(amount);
        let Some(copies) = self.copy_depths.get_mut(&id) else {
            return;
        };
        let closest = copies
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - amount).abs().total_cmp(&(*b - amount).abs()))
            .map(|(i, _)| i);
        if let Some(at) = closest {
            copies.remove(at);
        }
    }

    /// Unsigned ids of the segments with a copy number of exactly 1.
    pub fn single_copy_segments(&self) -> Vec<SegId> {
        self.copy_depths
            .iter()
            .filter(|(_, depths)| depths.len() == 1)
            .map(|(&id, _)| id)
            .collect()
    }

    fn at_most_one_link_per_end(&self, id: SegId) -> bool {
        let seg = SignedSeg::forward(id);
        self.links.outgoing(seg).len() <= 1 && self.links.incoming(seg).len() <= 1
    }

    fn exactly_one_link_per_end(&self, id: SegId) -> bool {
        let seg = SignedSeg::forward(id);
        self.links.outgoing(seg).len() == 1 && self.links.incoming(seg).len() == 1
    }

    fn all_have_copy_depths(&self, ids: &[SegId]) -> bool {
        ids.iter().all(|id| self.copy_depths.contains_key(id))
    }

    fn segments_without_copies(&self) -> Vec<SegId> {
        self.segments
            .keys()
            .filter(|id| !self.copy_depths.contains_key(id))
            .copied()
            .collect()
    }

    fn segments_with_multiple_copies(&self) -> Vec<SegId> {
        self.segments
            .keys()
            .filter(|id| self.copy_depths.get(id).is_some_and(|d| d.len() > 1))
            .copied()
            .collect()
    }

    fn scale_copy_depths_from_sources(&self, id: SegId, sources: &[SegId]) -> (Vec<f64>, f64) {
        let source_depths: Vec<f64> = sources
            .iter()
            .flat_map(|source| self.copy_depths[source].iter().copied())
            .collect();
        scale_copy_depths(self.segments[&id].depth, &source_depths)
    }

    /// The worst per-bin scaling error of assigning each depth bin to the
    /// corresponding segment.
    fn error_for_segments_and_depths(&self, ids: &[SegId], bins: &[Vec<f64>]) -> f64 {
        ids.iter()
            .zip(bins)
            .map(|(id, bin)| relative_error(bin.iter().sum(), self.segments[id].depth))
            .fold(0.0, f64::max)
    }

    /// Assigns each bin (scaled) to its segment, skipping segments that
    /// already carry copy depths and bins that scale too poorly.
    fn assign_copy_depths_where_needed(
        &mut self,
        ids: &[SegId],
        bins: &[Vec<f64>],
        error_margin: f64,
    ) -> bool {
        let mut success = false;
        for (&id, bin) in ids.iter().zip(bins) {
            if self.copy_depths.contains_key(&id) {
                continue;
            }
            let (depths, error) = scale_copy_depths(self.segments[&id].depth, bin);
            if error <= error_margin {
                self.copy_depths.insert(id, depths);
                success = true;
            }
        }
        success
    }
}

/// Scales the source depths so their sum matches the target depth. Returns
/// the scaled depths, descending, and the relative scaling error. A zero
/// source sum cannot be scaled; its error is infinite.
pub(crate) fn scale_copy_depths(target_depth: f64, source_depths: &[f64]) -> (Vec<f64>, f64) {
    let source_sum: f64 = source_depths.iter().sum();
    if source_sum <= 0.0 {
        return (vec![], f64::INFINITY);
    }
    let scaling_factor = target_depth / source_sum;
    let mut scaled: Vec<f64> = source_depths.iter().map(|d| d * scaling_factor).collect();
    scaled.sort_by(|a, b| b.total_cmp(a));
    (scaled, relative_error(source_sum, target_depth))
}

/// The relative error of assigning `source` to `target`.
pub(crate) fn relative_error(source: f64, target: f64) -> f64 {
    if target > 0.0 {
        (source - target).abs() / target
    } else {
        f64::INFINITY
    }
}

/// All arrangements of `items` into bins such that every bin gets at least
/// one item and any bin with a target size gets exactly that many.
fn shuffle_into_bins(
    items: &[f64],
    bins: Vec<Vec<f64>>,
    targets: &[Option<usize>],
) -> Vec<Vec<Vec<f64>>> {
    let mut arrangements = vec![];
    if let Some((first, rest)) = items.split_first() {
        for at in 0..bins.len() {
            let mut bins = bins.clone();
            bins[at].push(*first);
            arrangements.extend(shuffle_into_bins(rest, bins, targets));
        }
    } else if bins.iter().all(|bin| !bin.is_empty())
        && targets
            .iter()
            .enumerate()
            .all(|(i, target)| target.is_none_or(|t| t == bins[i].len()))
    {
        arrangements.push(bins);
    }
    arrangements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seg::{Segment, Strand};

    fn f(id: SegId) -> SignedSeg {
        SignedSeg::forward(id)
    }
    fn seg(depth: f64, len: usize) -> Segment {
        Segment::new(depth, "A".repeat(len), Strand::Forward)
    }

    #[test]
    fn triangle_merge_assigns_repeat_two_copies() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(10.0, 100));
        graph.insert_segment(2, seg(10.0, 100));
        graph.insert_segment(3, seg(20.0, 50));
        for (a, b) in [(1, 3), (2, 3), (3, 1), (3, 2)] {
            graph.add_link(f(a), f(b));
        }
        graph.determine_copy_depth();
        assert_eq!(graph.copy_depths().get(&1), Some(&vec![10.0]));
        assert_eq!(graph.copy_depths().get(&2), Some(&vec![10.0]));
        assert_eq!(graph.copy_depths().get(&3), Some(&vec![10.0, 10.0]));
    }

    #[test]
    fn diploid_graphs_use_half_median_single_copy_depth() {
        // Enough bases near half the median depth to look diploid.
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(50.0, 50_000));
        graph.insert_segment(2, seg(100.0, 400_000));
        graph.determine_copy_depth();
        // The half-median segment is single copy; the median-depth one is
        // out of range of the seeding depth.
        assert_eq!(graph.copy_depths().get(&1), Some(&vec![50.0]));
        assert!(!graph.copy_depths().contains_key(&2) || graph.copy_depths()[&2].len() != 1);
    }

    #[test]
    fn linear_chain_fills_in_one_merge_sweep() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(10.0, 1000));
        graph.insert_segment(2, seg(10.5, 100));
        graph.insert_segment(3, seg(10.4, 100));
        graph.add_link(f(1), f(2));
        graph.add_link(f(2), f(3));
        graph.determine_copy_depth();
        for id in 1..=3 {
            assert_eq!(graph.copy_depths()[&id].len(), 1, "segment {id}");
        }
    }

    #[test]
    fn redistribute_splits_depths_over_unassigned_branches() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(20.1, 100));
        graph.insert_segment(2, seg(10.0, 100));
        graph.insert_segment(3, seg(10.0, 100));
        graph.add_link(f(1), f(2));
        graph.add_link(f(1), f(3));
        graph.copy_depths.insert(1, vec![10.2, 9.9]);
        assert!(graph.redistribute_copy_depths(0.2));
        for id in [2, 3] {
            let depths = &graph.copy_depths()[&id];
            assert_eq!(depths.len(), 1);
            assert!((depths[0] - 10.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_depth_sources_are_never_assigned() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(0.0, 100));
        graph.insert_segment(2, seg(5.0, 100));
        graph.add_link(f(1), f(2));
        graph.copy_depths.insert(1, vec![0.0]);
        assert!(!graph.merge_copy_depths(1.0));
        assert!(!graph.copy_depths().contains_key(&2));
    }

    #[test]
    fn scaling_matches_target_and_sorts_descending() {
        let (depths, error) = scale_copy_depths(30.0, &[10.0, 5.0, 15.0]);
        assert_eq!(depths, vec![15.0, 10.0, 5.0]);
        assert_eq!(error, 0.0);

        let (depths, error) = scale_copy_depths(20.0, &[5.0, 5.0]);
        assert_eq!(depths, vec![10.0, 10.0]);
        assert_eq!(error, 0.5);
    }

    #[test]
    fn shuffle_respects_bin_targets() {
        let items = [1.0, 2.0, 3.0];
        let no_targets = shuffle_into_bins(&items, vec![vec![], vec![]], &[None, None]);
        assert_eq!(no_targets.len(), 6);
        let targeted = shuffle_into_bins(&items, vec![vec![], vec![]], &[Some(1), None]);
        assert_eq!(targeted.len(), 3);
        for arrangement in targeted {
            assert_eq!(arrangement[0].len(), 1);
        }
    }

    #[test]
    fn depth_removal_drops_closest_copy() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(16.0, 100));
        graph.copy_depths.insert(1, vec![9.0, 5.0, 2.0]);
        graph.remove_segment_depth(f(1), 4.9);
        assert_eq!(graph.copy_depths()[&1], vec![9.0, 2.0]);
        assert!((graph.segment(1).unwrap().depth - 11.1).abs() < 1e-9);
        // Removing from a segment that is not in the graph is a no-op.
        graph.remove_segment_depth(f(9), 1.0);
    }
}
