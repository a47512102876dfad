use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;

use crate::{
    link::LinkTable,
    paths::{find_replace, insert_between, replace_value, split_path_on},
    seg::{SegId, Segment, SignedSeg, Strand},
};

/// A double-stranded assembly graph: segments keyed by unsigned id, links
/// between signed ids, per-segment copy depths and named paths.
///
/// All link overlaps are the same, equal to the graph overlap value.
#[derive(Debug, Clone, Default)]
pub struct AssemblyGraph {
    pub(crate) segments: BTreeMap<SegId, Segment>,
    pub(crate) links: LinkTable,
    pub(crate) copy_depths: BTreeMap<SegId, Vec<f64>>,
    pub(crate) paths: BTreeMap<String, Vec<SignedSeg>>,
    pub(crate) overlap: usize,
}

impl AssemblyGraph {
    pub fn new(overlap: usize) -> Self {
        Self {
            overlap,
            ..Self::default()
        }
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }
    pub fn segments(&self) -> &BTreeMap<SegId, Segment> {
        &self.segments
    }
    pub fn segment(&self, id: SegId) -> Option<&Segment> {
        self.segments.get(&id)
    }
    pub fn has_segment(&self, id: SegId) -> bool {
        self.segments.contains_key(&id)
    }
    pub fn links(&self) -> &LinkTable {
        &self.links
    }
    pub fn paths(&self) -> &BTreeMap<String, Vec<SignedSeg>> {
        &self.paths
    }
    pub fn copy_depths(&self) -> &BTreeMap<SegId, Vec<f64>> {
        &self.copy_depths
    }

    pub fn insert_segment(&mut self, id: SegId, segment: Segment) {
        assert!(id > 0, "segment ids must be positive");
        self.segments.insert(id, segment);
    }

    /// Registers a named path. Every listed id must resolve to a live
    /// segment and consecutive ids must be linked.
    pub fn insert_path(&mut self, name: String, segments: Vec<SignedSeg>) {
        self.paths.insert(name, segments);
    }

    pub fn add_link(&mut self, start: SignedSeg, end: SignedSeg) {
        self.links.add(start, end);
    }
    pub fn remove_link(&mut self, start: SignedSeg, end: SignedSeg) {
        self.links.remove(start, end);
    }

    /// The strand-appropriate sequence of a signed segment id.
    pub fn seq_of(&self, seg: SignedSeg) -> &str {
        self.segments[&seg.id()].sequence(seg.strand())
    }

    /// One more than the largest id in use.
    pub fn next_seg_id(&self) -> SegId {
        self.segments.keys().next_back().copied().unwrap_or(0) + 1
    }

    pub fn total_length(&self) -> usize {
        self.segments.values().map(Segment::len).sum()
    }
    pub fn total_length_no_overlaps(&self) -> usize {
        self.segments
            .values()
            .map(|s| s.len_no_overlap(self.overlap))
            .sum()
    }

    /// The graph's median read depth by base: segments are sorted by depth
    /// and weighted by their length without overlap.
    pub fn median_read_depth(&self) -> f64 {
        self.median_depth_of(self.segments.values().collect())
    }
    /// Like [`Self::median_read_depth`], restricted to the given segments.
    pub fn median_read_depth_of(&self, ids: &[SegId]) -> f64 {
        self.median_depth_of(ids.iter().map(|id| &self.segments[id]).collect())
    }
    fn median_depth_of(&self, mut segments: Vec<&Segment>) -> f64 {
        segments.sort_by(|a, b| a.depth.total_cmp(&b.depth));
        let total_length: usize = segments
            .iter()
            .map(|s| s.len_no_overlap(self.overlap))
            .sum();
        let halfway_length = total_length / 2;
        let mut length_so_far = 0;
        for segment in segments {
            length_so_far += segment.len_no_overlap(self.overlap);
            if length_so_far >= halfway_length {
                return segment.depth;
            }
        }
        0.0
    }

    /// Divides every segment's depth by the graph's median, so the median
    /// depth becomes 1.
    pub fn normalise_read_depths(&mut self) {
        let median_depth = self.median_read_depth();
        if median_depth <= 0.0 {
            return;
        }
        for segment in self.segments.values_mut() {
            segment.divide_depth(median_depth);
        }
    }

    /// Total bases held by segments whose depth falls in `[min, max]`.
    pub fn base_count_in_depth_range(&self, min_depth: f64, max_depth: f64) -> usize {
        self.segments
            .values()
            .filter(|s| s.depth >= min_depth && s.depth <= max_depth)
            .map(Segment::len)
            .sum()
    }

    /// The number of dead ends for one segment: 0, 1 or 2.
    pub fn dead_end_count(&self, id: SegId) -> usize {
        let seg = SignedSeg::forward(id);
        usize::from(self.links.outgoing(seg).is_empty())
            + usize::from(self.links.incoming(seg).is_empty())
    }

    pub fn total_dead_end_count(&self) -> usize {
        self.segments
            .keys()
            .map(|&id| self.dead_end_count(id))
            .sum()
    }

    /// The change in the graph dead end count if this segment were deleted.
    /// Positive values mean deleting the segment would create dead ends.
    pub fn dead_end_change_if_deleted(&self, id: SegId) -> i64 {
        let seg = SignedSeg::forward(id);
        let potential_dead_ends = self
            .links
            .outgoing(seg)
            .iter()
            .filter(|&&downstream| self.links.incoming(downstream).len() == 1)
            .count()
            + self
                .links
                .incoming(seg)
                .iter()
                .filter(|&&upstream| self.links.outgoing(upstream).len() == 1)
                .count();
        potential_dead_ends as i64 - self.dead_end_count(id) as i64
    }

    /// Like [`Self::dead_end_change_if_deleted`] for a whole simple,
    /// unbranching path considered at once.
    pub fn dead_end_change_if_path_deleted(&self, path: &[SignedSeg]) -> i64 {
        assert!(!path.is_empty());
        let start = path[0];
        let end = path[path.len() - 1];

        let downstream = self.links.outgoing(end);
        let upstream = self.links.incoming(start);
        let potential_dead_ends = downstream
            .iter()
            .filter(|&&d| self.links.incoming(d).len() == 1)
            .count()
            + upstream
                .iter()
                .filter(|&&u| self.links.outgoing(u).len() == 1)
                .count();
        let dead_ends = usize::from(downstream.is_empty()) + usize::from(upstream.is_empty());
        potential_dead_ends as i64 - dead_ends as i64
    }

    /// The connected components of the undirected projection of the graph,
    /// each a list of unsigned segment ids.
    pub fn connected_components(&self) -> Vec<Vec<SegId>> {
        let mut visited = BTreeSet::new();
        let mut components = vec![];
        for &id in self.segments.keys() {
            if visited.contains(&id) {
                continue;
            }
            let mut component = vec![];
            let mut queue = VecDeque::from([id]);
            visited.insert(id);
            while let Some(at) = queue.pop_front() {
                component.push(at);
                for connected in self.links.connected_ids(at) {
                    if visited.insert(connected) {
                        queue.push_back(connected);
                    }
                }
            }
            components.push(component);
        }
        components
    }

    pub fn all_segments_below_depth(&self, ids: &[SegId], cutoff: f64) -> bool {
        ids.iter().all(|id| self.segments[id].depth < cutoff)
    }

    /// Unsigned ids of the segments leading into `id` whose sole outgoing
    /// link is `id` itself.
    pub fn exclusive_inputs(&self, id: SegId) -> Vec<SegId> {
        let seg = SignedSeg::forward(id);
        self.links
            .incoming(seg)
            .iter()
            .filter(|&&input| self.links.outgoing(input) == &[seg])
            .map(|input| input.id())
            .collect()
    }

    /// The symmetric version of [`Self::exclusive_inputs`].
    pub fn exclusive_outputs(&self, id: SegId) -> Vec<SegId> {
        let seg = SignedSeg::forward(id);
        self.links
            .outgoing(seg)
            .iter()
            .filter(|&&output| self.links.incoming(output) == &[seg])
            .map(|output| output.id())
            .collect()
    }

    /// Deletes the listed segments from the graph: the segment map, the
    /// copy depth map, both adjacency maps, and any path referencing them.
    pub fn remove_segments(&mut self, ids: &[SegId]) {
        let ids: BTreeSet<SegId> = ids.iter().copied().collect();
        self.segments.retain(|id, _| !ids.contains(id));
        self.copy_depths.retain(|id, _| !ids.contains(id));
        self.links.remove_segments(&ids);
        self.paths
            .retain(|_, segments| !segments.iter().any(|s| ids.contains(&s.id())));
    }

    /// Expands outward from the given signed id as far as possible while the
    /// chain stays simple (i.e. mergeable). Always at least length 1.
    pub fn simple_path(&self, starting_seg: SignedSeg) -> Vec<SignedSeg> {
        let mut path = VecDeque::from([starting_seg]);

        // Expand forward as much as possible.
        loop {
            let tip = *path.back().unwrap();
            let [potential] = self.links.outgoing(tip) else {
                break;
            };
            let potential = *potential;
            if path.contains(&potential) || path.contains(&-potential) {
                break;
            }
            if self.links.incoming(potential) == &[tip] {
                path.push_back(potential);
            } else {
                break;
            }
        }

        // Expand backward as much as possible.
        loop {
            let tip = *path.front().unwrap();
            let [potential] = self.links.incoming(tip) else {
                break;
            };
            let potential = *potential;
            if path.contains(&potential) || path.contains(&-potential) {
                break;
            }
            if self.links.outgoing(potential) == &[tip] {
                path.push_front(potential);
            } else {
                break;
            }
        }

        path.into()
    }

    /// The linear sequence spelled by a path, spanning one overlap per
    /// consecutive pair. Panics if consecutive segments are unlinked or an
    /// overlap does not match; both indicate a corrupted graph.
    pub fn path_sequence(&self, path: &[SignedSeg]) -> String {
        let mut sequence = String::new();
        let mut prev: Option<SignedSeg> = None;
        for &seg in path {
            let seg_seq = self.seq_of(seg);
            match prev {
                None => sequence.push_str(seg_seq),
                Some(prev) => {
                    assert!(
                        self.links.contains(prev, seg),
                        "path steps from {prev} to {seg} without a link"
                    );
                    assert!(
                        sequence.ends_with(&seg_seq[..self.overlap]),
                        "overlap mismatch between {prev} and {seg}"
                    );
                    sequence.push_str(&seg_seq[self.overlap..]);
                }
            }
            prev = Some(seg);
        }
        sequence
    }

    /// The length of a path in bases, or 0 if any segment is missing.
    pub fn path_length(&self, path: &[SignedSeg]) -> usize {
        let mut length = 0;
        for seg in path {
            match self.segments.get(&seg.id()) {
                Some(segment) => length += segment.len(),
                None => return 0,
            }
        }
        length.saturating_sub(path.len().saturating_sub(1) * self.overlap)
    }

    /// Merges a simple, unbranching path into a single fresh segment and
    /// adjusts any registered paths as necessary. Returns the new id.
    /// Merging a path of one segment is a no-op.
    pub fn merge_simple_path(&mut self, merge_path: &[SignedSeg]) -> SegId {
        assert!(!merge_path.is_empty());
        let start = merge_path[0];
        let end = merge_path[merge_path.len() - 1];
        if merge_path.len() == 1 {
            return start.id();
        }

        // The merged depth is the mean of the components, weighted by their
        // length without overlap (or unweighted 1.0 if all lengths vanish).
        let mut depth_sum = 0.0;
        let mut weight_sum = 0.0;
        for seg in merge_path {
            let segment = &self.segments[&seg.id()];
            let weight = segment.len_no_overlap(self.overlap) as f64;
            depth_sum += segment.depth * weight;
            weight_sum += weight;
        }
        let mean_depth = if weight_sum > 0.0 {
            depth_sum / weight_sum
        } else {
            1.0
        };

        let new_id = self.next_seg_id();
        let new_seg = SignedSeg::forward(new_id);
        let merged_seq = self.path_sequence(merge_path);

        // Save the external links and paths, then drop the old segments.
        // Links from the path back onto itself become links on the new id.
        let mut outgoing = self.links.outgoing(end).to_vec();
        let mut incoming = self.links.incoming(start).to_vec();
        replace_value(&mut outgoing, start, new_seg);
        replace_value(&mut outgoing, -end, -new_seg);
        replace_value(&mut incoming, end, new_seg);
        replace_value(&mut incoming, -start, -new_seg);
        let paths_copy = std::mem::take(&mut self.paths);
        let old_ids: Vec<SegId> = merge_path.iter().map(|s| s.id()).collect();
        self.remove_segments(&old_ids);

        self.insert_segment(new_id, Segment::new(mean_depth, merged_seq, Strand::Forward));
        for link in outgoing {
            self.add_link(new_seg, link);
        }
        for link in incoming {
            self.add_link(link, new_seg);
        }

        // Rewrite the merged run inside any path; whatever still references
        // the old ids afterwards is split into `_1`, `_2`, ... fragments.
        let flipped: Vec<SignedSeg> = merge_path.iter().rev().map(|&s| -s).collect();
        let cut: Vec<SignedSeg> = merge_path.iter().chain(&flipped).copied().collect();
        for (name, segments) in paths_copy {
            let segments = find_replace(&segments, merge_path, &[new_seg]);
            let segments = find_replace(&segments, &flipped, &[-new_seg]);
            let mut fragments = split_path_on(&segments, &cut);
            if fragments.len() == 1 {
                self.paths.insert(name, fragments.pop().unwrap());
            } else {
                for (i, fragment) in fragments.into_iter().enumerate() {
                    self.paths.insert(format!("{name}_{}", i + 1), fragment);
                }
            }
        }
        new_id
    }

    /// Gives the longest segment the id 1, the second-longest 2, and so on.
    /// Links, copy depths and paths follow.
    pub fn renumber_segments(&mut self) {
        let mut order: Vec<(SegId, usize)> = self
            .segments
            .iter()
            .map(|(&id, segment)| (id, segment.len()))
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let changes: BTreeMap<SegId, SegId> = order
            .iter()
            .enumerate()
            .map(|(i, &(old, _))| (old, i as SegId + 1))
            .collect();

        self.segments = std::mem::take(&mut self.segments)
            .into_iter()
            .map(|(id, segment)| (changes[&id], segment))
            .collect();
        self.links = self.links.renumbered(&changes);
        self.copy_depths = std::mem::take(&mut self.copy_depths)
            .into_iter()
            .map(|(id, depths)| (changes[&id], depths))
            .collect();
        for segments in self.paths.values_mut() {
            for seg in segments {
                *seg = SignedSeg::new(changes[&seg.id()], seg.strand());
            }
        }
    }

    /// Finds and fixes multi-way junctions, as these mess up copy number
    /// determination: a bipartite K(S,E) junction with |S|, |E| >= 2 is
    /// replaced by a zero-core-length segment bridging the two sides.
    /// For example A->C,D and B->C,D becomes A->X, B->X, X->C, X->D.
    pub fn repair_multi_way_junctions(&mut self) {
        'search: loop {
            let candidates: Vec<SignedSeg> = self
                .segments
                .keys()
                .flat_map(|&id| [SignedSeg::forward(id), SignedSeg::reverse(id)])
                .collect();
            for seg in candidates {
                let ending_segs: BTreeSet<SignedSeg> =
                    self.links.outgoing(seg).iter().copied().collect();
                if ending_segs.len() < 2 {
                    continue;
                }
                let first_end = *ending_segs.first().unwrap();
                let starting_segs: BTreeSet<SignedSeg> =
                    self.links.incoming(first_end).iter().copied().collect();
                if starting_segs.len() < 2 {
                    continue;
                }

                // Only a full bipartite junction qualifies: every starting
                // segment leads to exactly the ending set and every ending
                // segment is reached from exactly the starting set.
                let is_junction = starting_segs.iter().all(|&s| {
                    self.links.outgoing(s).iter().copied().collect::<BTreeSet<_>>() == ending_segs
                }) && ending_segs.iter().all(|&e| {
                    self.links.incoming(e).iter().copied().collect::<BTreeSet<_>>() == starting_segs
                });
                if !is_junction {
                    continue;
                }

                self.repair_junction(&starting_segs, &ending_segs);
                continue 'search;
            }
            break;
        }
    }

    fn repair_junction(
        &mut self,
        starting_segs: &BTreeSet<SignedSeg>,
        ending_segs: &BTreeSet<SignedSeg>,
    ) {
        // All sides of the junction must share the same overlap sequence.
        let overlap = self.overlap;
        let bridge_seq = self.seq_of(*ending_segs.first().unwrap())[..overlap].to_owned();
        for &seg in starting_segs {
            assert!(
                self.seq_of(seg).ends_with(&bridge_seq),
                "junction overlap mismatch at {seg}"
            );
        }
        for &seg in ending_segs {
            assert!(
                self.seq_of(seg).starts_with(&bridge_seq),
                "junction overlap mismatch at {seg}"
            );
        }

        let start_depth_sum: f64 = starting_segs
            .iter()
            .map(|s| self.segments[&s.id()].depth)
            .sum();
        let end_depth_sum: f64 = ending_segs
            .iter()
            .map(|s| self.segments[&s.id()].depth)
            .sum();
        let bridge_depth = (start_depth_sum + end_depth_sum) / 2.0;

        let bridge_id = self.next_seg_id();
        let bridge = SignedSeg::forward(bridge_id);
        debug!("repairing multi-way junction with new segment {bridge_id}");
        self.insert_segment(bridge_id, Segment::new(bridge_depth, bridge_seq, Strand::Forward));

        for &start in starting_segs {
            for &end in ending_segs {
                self.remove_link(start, end);
            }
        }
        for &start in starting_segs {
            self.add_link(start, bridge);
        }
        for &end in ending_segs {
            self.add_link(bridge, end);
        }

        // Any path that ran straight through the junction now visits the
        // bridge segment.
        for segments in self.paths.values_mut() {
            for &start in starting_segs {
                for &end in ending_segs {
                    *segments = insert_between(segments, start, end, bridge);
                    *segments = insert_between(segments, -end, -start, -bridge);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(id: SegId) -> SignedSeg {
        SignedSeg::forward(id)
    }
    fn r(id: SegId) -> SignedSeg {
        SignedSeg::reverse(id)
    }
    fn seg(depth: f64, sequence: &str) -> Segment {
        Segment::new(depth, sequence.to_owned(), Strand::Forward)
    }

    /// 1 -> 2 -> 3 -> 4 with no overlap, plus a trailing segment 7.
    fn chain_graph() -> AssemblyGraph {
        let mut graph = AssemblyGraph::new(0);
        for (id, sequence) in [(1, "AC"), (2, "GT"), (3, "CA"), (4, "TT"), (7, "GG")] {
            graph.insert_segment(id, seg(10.0, sequence));
        }
        for (a, b) in [(1, 2), (2, 3), (3, 4), (4, 7)] {
            graph.add_link(f(a), f(b));
        }
        graph
    }

    #[test]
    fn dead_end_counting() {
        let graph = chain_graph();
        assert_eq!(graph.dead_end_count(1), 1);
        assert_eq!(graph.dead_end_count(2), 0);
        assert_eq!(graph.dead_end_count(7), 1);
        assert_eq!(graph.total_dead_end_count(), 2);
        // Deleting an interior segment creates two dead ends.
        assert_eq!(graph.dead_end_change_if_deleted(3), 2);
        // Deleting an end segment moves the dead end.
        assert_eq!(graph.dead_end_change_if_deleted(1), 0);
    }

    #[test]
    fn dead_end_change_for_whole_path() {
        let graph = chain_graph();
        assert_eq!(graph.dead_end_change_if_path_deleted(&[f(2), f(3)]), 2);
        assert_eq!(
            graph.dead_end_change_if_path_deleted(&[f(1), f(2), f(3), f(4), f(7)]),
            -2
        );
    }

    #[test]
    fn connected_components_ignore_strand() {
        let mut graph = chain_graph();
        graph.insert_segment(9, seg(1.0, "AA"));
        graph.insert_segment(10, seg(1.0, "CC"));
        graph.add_link(r(9), f(10));
        let components = graph.connected_components();
        assert_eq!(components, vec![vec![1, 2, 3, 4, 7], vec![9, 10]]);
    }

    #[test]
    fn exclusive_neighbourhoods() {
        let mut graph = AssemblyGraph::new(0);
        for id in 1..=4 {
            graph.insert_segment(id, seg(10.0, "ACGT"));
        }
        graph.add_link(f(1), f(3));
        graph.add_link(f(2), f(3));
        assert_eq!(graph.exclusive_inputs(3), vec![1, 2]);
        // Once 2 also leads to 4 it no longer feeds 3 exclusively.
        graph.add_link(f(2), f(4));
        assert_eq!(graph.exclusive_inputs(3), vec![1]);
        // 4 is fed only by 2; 3 is also fed by 1.
        assert_eq!(graph.exclusive_outputs(2), vec![4]);
        assert_eq!(graph.exclusive_outputs(1), vec![]);
    }

    #[test]
    fn remove_segments_purges_everything() {
        let mut graph = chain_graph();
        graph.copy_depths.insert(2, vec![10.0]);
        graph.insert_path("p".to_owned(), vec![f(1), f(2)]);
        graph.insert_path("q".to_owned(), vec![f(3), f(4)]);
        graph.remove_segments(&[2]);
        assert!(!graph.has_segment(2));
        assert!(graph.copy_depths.is_empty());
        assert!(graph.links.outgoing(f(1)).is_empty());
        assert!(!graph.paths.contains_key("p"));
        assert!(graph.paths.contains_key("q"));
    }

    #[test]
    fn simple_path_extends_both_ways() {
        let graph = chain_graph();
        let path = graph.simple_path(f(3));
        assert_eq!(path, vec![f(1), f(2), f(3), f(4), f(7)]);
    }

    #[test]
    fn simple_path_stops_at_branches() {
        let mut graph = chain_graph();
        graph.insert_segment(8, seg(10.0, "TA"));
        graph.add_link(f(8), f(3));
        assert_eq!(graph.simple_path(f(2)), vec![f(1), f(2)]);
        assert_eq!(graph.simple_path(f(4)), vec![f(3), f(4), f(7)]);
    }

    #[test]
    fn simple_path_does_not_loop() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(1.0, "AC"));
        graph.insert_segment(2, seg(1.0, "GT"));
        graph.add_link(f(1), f(2));
        graph.add_link(f(2), f(1));
        let path = graph.simple_path(f(1));
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn merge_of_single_segment_path_is_a_noop() {
        let mut graph = chain_graph();
        let before = graph.segments().len();
        let new_id = graph.merge_simple_path(&[f(7)]);
        assert_eq!(new_id, 7);
        assert_eq!(graph.segments().len(), before);
        assert!(graph.links.contains(f(4), f(7)));
    }

    #[test]
    fn merge_simple_path_concatenates_and_rewires() {
        let mut graph = chain_graph();
        graph.insert_path("p".to_owned(), vec![f(1), f(2), f(3), f(4), f(7)]);
        graph.insert_path("q".to_owned(), vec![f(2), f(9)]);
        let new_id = graph.merge_simple_path(&[f(1), f(2), f(3), f(4)]);

        let merged = graph.segment(new_id).unwrap();
        assert_eq!(merged.forward_sequence(), "ACGTCATT");
        assert_eq!(merged.depth, 10.0);
        assert!(graph.links.contains(f(new_id), f(7)));
        assert!(!graph.has_segment(1));

        // The containing path now references the merged segment; the path
        // that referenced a consumed id was split down to nothing.
        assert_eq!(graph.paths().get("p"), Some(&vec![f(new_id), f(7)]));
        assert!(!graph.paths().contains_key("q"));
    }

    #[test]
    fn merge_rewrites_reverse_strand_paths() {
        let mut graph = chain_graph();
        graph.insert_path("rev".to_owned(), vec![r(7), r(4), r(3), r(2), r(1)]);
        let new_id = graph.merge_simple_path(&[f(1), f(2), f(3), f(4)]);
        assert_eq!(graph.paths().get("rev"), Some(&vec![r(7), r(new_id)]));
    }

    #[test]
    fn merge_weights_depth_by_length() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(10.0, "ACGTAC"));
        graph.insert_segment(2, seg(40.0, "TT"));
        graph.add_link(f(1), f(2));
        let new_id = graph.merge_simple_path(&[f(1), f(2)]);
        let depth = graph.segment(new_id).unwrap().depth;
        assert!((depth - 17.5).abs() < 1e-9);
    }

    #[test]
    fn merge_with_overlap_strips_prefix() {
        let mut graph = AssemblyGraph::new(2);
        graph.insert_segment(1, seg(1.0, "AACG"));
        graph.insert_segment(2, seg(1.0, "CGTT"));
        graph.add_link(f(1), f(2));
        let new_id = graph.merge_simple_path(&[f(1), f(2)]);
        assert_eq!(graph.segment(new_id).unwrap().forward_sequence(), "AACGTT");
    }

    #[test]
    fn renumber_orders_by_length() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(5, seg(1.0, "AC"));
        graph.insert_segment(6, seg(1.0, "ACGTAC"));
        graph.insert_segment(9, seg(1.0, "ACGT"));
        graph.add_link(f(5), r(6));
        graph.copy_depths.insert(6, vec![1.0]);
        graph.insert_path("p".to_owned(), vec![f(5), r(6)]);
        graph.renumber_segments();

        assert_eq!(graph.segment(1).unwrap().len(), 6);
        assert_eq!(graph.segment(2).unwrap().len(), 4);
        assert_eq!(graph.segment(3).unwrap().len(), 2);
        assert!(graph.links.contains(f(3), r(1)));
        assert_eq!(graph.copy_depths.get(&1), Some(&vec![1.0]));
        assert_eq!(graph.paths().get("p"), Some(&vec![f(3), r(1)]));

        // Renumbering an already renumbered graph changes nothing.
        let before = graph.clone();
        graph.renumber_segments();
        assert_eq!(
            graph.segments().keys().collect::<Vec<_>>(),
            before.segments().keys().collect::<Vec<_>>()
        );
        assert_eq!(graph.paths(), before.paths());
        assert!(graph.links.contains(f(3), r(1)));
    }

    #[test]
    fn junction_repair_inserts_bridge_segment() {
        // A,B -> C,D with overlap 3; all four share the junction sequence.
        let mut graph = AssemblyGraph::new(3);
        graph.insert_segment(1, seg(4.0, "TTACG"));
        graph.insert_segment(2, seg(6.0, "GGACG"));
        graph.insert_segment(3, seg(5.0, "ACGAA"));
        graph.insert_segment(4, seg(5.0, "ACGCC"));
        for (a, b) in [(1, 3), (1, 4), (2, 3), (2, 4)] {
            graph.add_link(f(a), f(b));
        }
        graph.insert_path("p".to_owned(), vec![f(1), f(4)]);

        graph.repair_multi_way_junctions();

        let bridge_id = 5;
        let bridge = graph.segment(bridge_id).unwrap();
        assert_eq!(bridge.forward_sequence(), "ACG");
        assert!((bridge.depth - 10.0).abs() < 1e-9);
        for a in [1, 2] {
            assert_eq!(graph.links.outgoing(f(a)), &[f(bridge_id)]);
        }
        for b in [3, 4] {
            assert_eq!(graph.links.incoming(f(b)), &[f(bridge_id)]);
        }
        assert_eq!(graph.paths().get("p"), Some(&vec![f(1), f(bridge_id), f(4)]));
    }

    #[test]
    fn partial_junction_is_left_alone() {
        // 1 -> 3,4 but 2 -> 3 only: not a full bipartite junction.
        let mut graph = AssemblyGraph::new(0);
        for id in 1..=4 {
            graph.insert_segment(id, seg(1.0, "ACGT"));
        }
        for (a, b) in [(1, 3), (1, 4), (2, 3)] {
            graph.add_link(f(a), f(b));
        }
        graph.repair_multi_way_junctions();
        assert_eq!(graph.segments().len(), 4);
        assert!(graph.links.contains(f(1), f(3)));
    }

    #[test]
    fn median_depth_is_length_weighted() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(5.0, &"A".repeat(10)));
        graph.insert_segment(2, seg(20.0, &"C".repeat(90)));
        assert_eq!(graph.median_read_depth(), 20.0);
        graph.normalise_read_depths();
        assert_eq!(graph.segment(2).unwrap().depth, 1.0);
        assert_eq!(graph.segment(1).unwrap().depth, 0.25);
    }

    #[test]
    fn path_length_counts_overlaps_once() {
        let mut graph = AssemblyGraph::new(2);
        graph.insert_segment(1, seg(1.0, "AACG"));
        graph.insert_segment(2, seg(1.0, "CGTT"));
        graph.add_link(f(1), f(2));
        assert_eq!(graph.path_length(&[f(1), f(2)]), 6);
        assert_eq!(graph.path_length(&[f(1), f(9)]), 0);
        assert_eq!(graph.path_length(&[]), 0);
    }
}
