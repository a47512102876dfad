use log::{debug, info};

use crate::{graph::AssemblyGraph, seg::SegId};

impl AssemblyGraph {
    /// Runs the graph repairs, filters and normalisations that prepare a
    /// freshly loaded graph: junction repair, depth filtering, homopolymer
    /// removal, merging of simple paths and depth normalisation.
    pub fn clean(&mut self, read_depth_filter: f64) {
        info!("cleaning graph ({} segments)", self.segments.len());
        self.repair_multi_way_junctions();
        self.filter_by_read_depth(read_depth_filter);
        self.filter_homopolymer_loops();
        self.merge_all_possible();
        self.normalise_read_depths();
        info!("cleaned graph ({} segments)", self.segments.len());
    }

    /// Removes segments below a relative depth cutoff. A segment is below
    /// the cutoff if its depth is less than `relative_depth_cutoff` times
    /// either the whole-graph median or its connected component's median.
    /// To be removed, one of the following must also hold:
    ///   1) the segment has at least one dead end,
    ///   2) every segment in its component is below the whole-graph cutoff,
    ///   3) deleting it would not create any dead ends.
    pub fn filter_by_read_depth(&mut self, relative_depth_cutoff: f64) {
        let mut to_remove: Vec<SegId> = vec![];
        let whole_graph_cutoff = self.median_read_depth() * relative_depth_cutoff;
        for component in self.connected_components() {
            let component_cutoff =
                self.median_read_depth_of(&component) * relative_depth_cutoff;
            for &id in &component {
                let depth = self.segments[&id].depth;
                if depth >= whole_graph_cutoff && depth >= component_cutoff {
                    continue;
                }
                if self.dead_end_count(id) > 0
                    || self.all_segments_below_depth(&component, whole_graph_cutoff)
                    || self.dead_end_change_if_deleted(id) <= 0
                {
                    to_remove.push(id);
                }
            }
        }
        if !to_remove.is_empty() {
            debug!("depth filter removing segments: {to_remove:?}");
        }
        self.remove_segments(&to_remove);
    }

    /// Drops connected components made of nothing but one repeated base.
    /// These are a common artefact in short-read assembly graphs.
    pub fn filter_homopolymer_loops(&mut self) {
        let mut to_remove: Vec<SegId> = vec![];
        for component in self.connected_components() {
            if self.component_is_one_base(&component) {
                to_remove.extend(component);
            }
        }
        if !to_remove.is_empty() {
            debug!("removing homopolymer components: {to_remove:?}");
        }
        self.remove_segments(&to_remove);
    }

    /// True if every segment in the component repeats one and the same base
    /// on either strand.
    fn component_is_one_base(&self, ids: &[SegId]) -> bool {
        let mut non_empty = ids
            .iter()
            .map(|id| &self.segments[id])
            .filter(|s| !s.is_empty())
            .peekable();
        let Some(first) = non_empty.peek() else {
            return false;
        };
        let base = first.forward_sequence().as_bytes()[0].to_ascii_lowercase();
        non_empty.all(|segment| {
            let forward = segment.forward_sequence().as_bytes()[0].to_ascii_lowercase();
            let reverse = segment.reverse_sequence().as_bytes()[0].to_ascii_lowercase();
            segment.is_homopolymer() && (forward == base || reverse == base)
        })
    }

    /// Merges every simple, unbranching path in the graph, then renumbers
    /// the segments longest-first.
    pub fn merge_all_possible(&mut self) {
        'merge: loop {
            let ids: Vec<SegId> = self.segments.keys().copied().collect();
            for id in ids {
                let path = self.simple_path(crate::seg::SignedSeg::forward(id));
                if path.len() > 1 {
                    self.merge_simple_path(&path);
                    continue 'merge;
                }
            }
            break;
        }
        self.renumber_segments();
    }

    /// Removes small connected components orphaned by bridging. Components
    /// containing a bridge-originated segment are kept.
    pub fn remove_small_components(&mut self, min_component_size: usize) {
        let mut to_remove: Vec<SegId> = vec![];
        for component in self.connected_components() {
            let component_length: usize = component
                .iter()
                .map(|id| self.segments[id].len())
                .sum();
            if component_length >= min_component_size {
                continue;
            }
            if component.iter().any(|id| self.segments[id].origin().is_some()) {
                continue;
            }
            to_remove.extend(component);
        }
        if !to_remove.is_empty() {
            debug!("removed small components: {to_remove:?}");
        }
        self.remove_segments(&to_remove);
    }

    /// Iteratively removes short segments whose deletion strictly decreases
    /// the graph's dead end count.
    pub fn remove_small_dead_ends(&mut self, min_dead_end_size: usize) {
        let mut removed: Vec<SegId> = vec![];
        'scan: loop {
            let ids: Vec<SegId> = self.segments.keys().copied().collect();
            for id in ids {
                if self.segments[&id].len() >= min_dead_end_size {
                    continue;
                }
                if self.dead_end_change_if_deleted(id) < 0 {
                    self.remove_segments(&[id]);
                    removed.push(id);
                    continue 'scan;
                }
            }
            break;
        }
        if !removed.is_empty() {
            debug!("removed small dead ends: {removed:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seg::{Segment, SignedSeg, Strand};

    fn f(id: SegId) -> SignedSeg {
        SignedSeg::forward(id)
    }
    fn seg(depth: f64, sequence: &str) -> Segment {
        Segment::new(depth, sequence.to_owned(), Strand::Forward)
    }

    #[test]
    fn depth_filter_removes_low_depth_dead_ends() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(100.0, &"A".repeat(100)));
        graph.insert_segment(2, seg(100.0, &"C".repeat(100)));
        // A shallow spur hanging off the main chain.
        graph.insert_segment(3, seg(2.0, &"G".repeat(10)));
        graph.add_link(f(1), f(2));
        graph.add_link(f(1), f(3));
        graph.filter_by_read_depth(0.25);
        assert!(!graph.has_segment(3));
        assert!(graph.has_segment(1));
        assert!(graph.has_segment(2));
    }

    #[test]
    fn depth_filter_keeps_load_bearing_segments() {
        // The low-depth segment is the only connection between its
        // neighbours, so deleting it would create dead ends.
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(100.0, &"A".repeat(100)));
        graph.insert_segment(2, seg(2.0, &"C".repeat(100)));
        graph.insert_segment(3, seg(100.0, &"G".repeat(100)));
        graph.add_link(f(1), f(2));
        graph.add_link(f(2), f(3));
        graph.add_link(f(3), f(1));
        graph.filter_by_read_depth(0.25);
        assert!(graph.has_segment(2));
    }

    #[test]
    fn homopolymer_components_are_dropped() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(1.0, "ACGT"));
        graph.insert_segment(2, seg(1.0, "AAAA"));
        graph.insert_segment(3, seg(1.0, "aaa"));
        graph.add_link(f(2), f(3));
        graph.filter_homopolymer_loops();
        assert!(graph.has_segment(1));
        assert!(!graph.has_segment(2));
        assert!(!graph.has_segment(3));
    }

    #[test]
    fn mixed_component_survives_homopolymer_filter() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(1.0, "AAAA"));
        graph.insert_segment(2, seg(1.0, "ACGT"));
        graph.add_link(f(1), f(2));
        graph.filter_homopolymer_loops();
        assert_eq!(graph.segments().len(), 2);
    }

    #[test]
    fn merge_all_collapses_chains_and_renumbers() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(1.0, "AC"));
        graph.insert_segment(2, seg(1.0, "GT"));
        graph.insert_segment(3, seg(1.0, "C"));
        graph.add_link(f(1), f(2));
        graph.merge_all_possible();
        // The chain is merged and the longest segment takes id 1.
        assert_eq!(graph.segments().len(), 2);
        assert_eq!(graph.segment(1).unwrap().forward_sequence(), "ACGT");
        assert_eq!(graph.segment(2).unwrap().forward_sequence(), "C");
    }

    #[test]
    fn small_dead_ends_are_pruned() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(1.0, &"A".repeat(100)));
        graph.insert_segment(2, seg(1.0, &"C".repeat(100)));
        graph.insert_segment(3, seg(1.0, "GG"));
        graph.add_link(f(1), f(2));
        graph.add_link(f(1), f(3));
        graph.remove_small_dead_ends(10);
        assert!(!graph.has_segment(3));
        assert!(graph.has_segment(2));
    }

    #[test]
    fn small_components_without_bridges_are_pruned() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(1.0, &"A".repeat(100)));
        graph.insert_segment(2, seg(1.0, "CC"));
        graph.remove_small_components(50);
        assert!(graph.has_segment(1));
        assert!(!graph.has_segment(2));
    }

    #[test]
    fn small_components_with_bridge_segments_survive() {
        use crate::bridge::{BridgeKind, BridgeOrigin};
        let mut graph = AssemblyGraph::new(0);
        let origin = BridgeOrigin {
            kind: BridgeKind::LongRead,
            graph_path: vec![],
        };
        graph.insert_segment(1, Segment::with_origin(1.0, "CC".to_owned(), origin));
        graph.remove_small_components(50);
        assert!(graph.has_segment(1));
    }
}
