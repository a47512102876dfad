use std::collections::BTreeSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    graph::AssemblyGraph,
    seg::{SegId, Segment, SignedSeg},
};

/// Which bridging strategy produced a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(Serialize, Deserialize)]
pub enum BridgeKind {
    Contig,
    LoopUnrolling,
    LongRead,
}

impl BridgeKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Contig => "SPAdes contig bridge",
            Self::LoopUnrolling => "Loop unrolling bridge",
            Self::LongRead => "Long read bridge",
        }
    }
}

/// Provenance kept on a segment created by applying a bridge: the bridge
/// kind and the interior path it replaced.
#[derive(Debug, Clone, PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct BridgeOrigin {
    pub kind: BridgeKind,
    pub graph_path: Vec<SignedSeg>,
}

impl BridgeOrigin {
    pub fn label(&self) -> String {
        if self.graph_path.is_empty() {
            return self.kind.label().to_owned();
        }
        let path: Vec<String> = self.graph_path.iter().map(SignedSeg::to_string).collect();
        format!("{}: {}", self.kind.label(), path.join(", "))
    }
}

/// An externally constructed plan to replace an ambiguous sub-path of the
/// graph, from `start_segment` through `graph_path` to `end_segment`, with
/// a single new sequence.
#[derive(Debug, Clone)]
#[derive(Serialize, Deserialize)]
pub struct Bridge {
    pub kind: BridgeKind,
    pub start_segment: SignedSeg,
    pub end_segment: SignedSeg,
    /// The interior path, possibly empty, from the start's successor to the
    /// end's predecessor.
    pub graph_path: Vec<SignedSeg>,
    pub bridge_sequence: String,
    pub depth: f64,
    /// In `[0, 1]`; better bridges are applied first.
    pub quality: f64,
}

impl Bridge {
    /// Start, interior and end as one path.
    pub fn full_path(&self) -> Vec<SignedSeg> {
        let mut path = Vec::with_capacity(self.graph_path.len() + 2);
        path.push(self.start_segment);
        path.extend_from_slice(&self.graph_path);
        path.push(self.end_segment);
        path
    }
}

/// The sub-paths of a bridge that can still be applied, given which
/// single-copy segments have already been bridged on which side and which
/// segments prior bridges have consumed.
///
/// Pieces run between single-copy anchors whose relevant side is still
/// unbridged; an interior segment already consumed by another bridge cuts
/// the piece that would span it.
pub fn applicable_pieces(
    bridge: &Bridge,
    single_copy: &BTreeSet<SegId>,
    right_bridged: &BTreeSet<SegId>,
    left_bridged: &BTreeSet<SegId>,
    already_used: &[SegId],
) -> Vec<Vec<SignedSeg>> {
    let full_path = bridge.full_path();
    let can_start = |seg: SignedSeg| {
        single_copy.contains(&seg.id())
            && if seg.is_forward() {
                !right_bridged.contains(&seg.id())
            } else {
                !left_bridged.contains(&seg.id())
            }
    };
    let can_end = |seg: SignedSeg| {
        single_copy.contains(&seg.id())
            && if seg.is_forward() {
                !left_bridged.contains(&seg.id())
            } else {
                !right_bridged.contains(&seg.id())
            }
    };

    let mut pieces = vec![];
    let mut open: Option<usize> = None;
    for (i, &seg) in full_path.iter().enumerate() {
        if single_copy.contains(&seg.id()) {
            if let Some(from) = open {
                if can_end(seg) {
                    pieces.push(full_path[from..=i].to_vec());
                }
                // Whether this anchor closed the piece or blocked it, the
                // piece cannot continue past it.
                open = None;
            }
            if open.is_none() && can_start(seg) && i + 1 < full_path.len() {
                open = Some(i);
            }
        } else if already_used.contains(&seg.id()) {
            open = None;
        }
    }
    pieces
}

impl AssemblyGraph {
    /// Uses the supplied bridges to simplify the graph. Bridges are applied
    /// best quality first, whole where possible and in pieces otherwise;
    /// each segment takes at most one bridge per side. Interior segments
    /// consumed by bridges are then removed wherever doing so does not
    /// increase the graph's dead end count. Returns the created segments.
    pub fn apply_bridges(
        &mut self,
        bridges: Vec<Bridge>,
        min_bridge_qual: f64,
        single_copy_segments: &[SegId],
    ) -> Vec<SegId> {
        let mut right_bridged: BTreeSet<SegId> = BTreeSet::new();
        let mut left_bridged: BTreeSet<SegId> = BTreeSet::new();
        let mut used_in_bridges: Vec<SegId> = vec![];
        let mut single_copy: BTreeSet<SegId> = single_copy_segments.iter().copied().collect();
        let mut new_segs: Vec<SegId> = vec![];

        let mut sorted_bridges = bridges;
        sorted_bridges.sort_by(|a, b| b.quality.total_cmp(&a.quality));

        for bridge in &sorted_bridges {
            let pieces = applicable_pieces(
                bridge,
                &single_copy,
                &right_bridged,
                &left_bridged,
                &used_in_bridges,
            );
            if pieces.is_empty() {
                debug!("unused bridge {} -> {}", bridge.start_segment, bridge.end_segment);
                continue;
            }
            if bridge.quality < min_bridge_qual {
                debug!("rejected bridge {} -> {}", bridge.start_segment, bridge.end_segment);
                continue;
            }

            if pieces.len() == 1 && pieces[0] == bridge.full_path() {
                debug!("applying bridge {} -> {}", bridge.start_segment, bridge.end_segment);
                new_segs.push(self.apply_bridge(
                    bridge,
                    bridge.start_segment,
                    bridge.end_segment,
                    bridge.bridge_sequence.clone(),
                    &bridge.graph_path,
                ));
                for seg in &bridge.graph_path {
                    single_copy.remove(&seg.id());
                }
                add_to_bridged_sets(
                    bridge.start_segment,
                    bridge.end_segment,
                    &mut right_bridged,
                    &mut left_bridged,
                );
                used_in_bridges.extend(bridge.graph_path.iter().map(|s| s.id()));
            } else {
                debug!(
                    "applying {} piece(s) of bridge {} -> {}",
                    pieces.len(),
                    bridge.start_segment,
                    bridge.end_segment
                );
                for piece in pieces {
                    let piece_start = piece[0];
                    let piece_end = piece[piece.len() - 1];
                    let piece_middle = &piece[1..piece.len() - 1];
                    let piece_seq = self.path_sequence(piece_middle);
                    new_segs.push(self.apply_bridge(
                        bridge,
                        piece_start,
                        piece_end,
                        piece_seq,
                        piece_middle,
                    ));
                    for seg in piece_middle {
                        single_copy.remove(&seg.id());
                    }
                    add_to_bridged_sets(
                        piece_start,
                        piece_end,
                        &mut right_bridged,
                        &mut left_bridged,
                    );
                    used_in_bridges.extend(piece_middle.iter().map(|s| s.id()));
                }
            }
            dedup_preserving_order(&mut used_in_bridges);
        }

        self.clean_up_bridged_segments(&used_in_bridges);
        new_segs
    }

    /// Applies one bridge (or piece of a bridge) to the graph: all links
    /// out of `start` and into `end` are removed, a new segment with the
    /// given sequence takes their place, and the bridge depth is taken off
    /// every interior segment.
    fn apply_bridge(
        &mut self,
        bridge: &Bridge,
        start: SignedSeg,
        end: SignedSeg,
        sequence: String,
        graph_path: &[SignedSeg],
    ) -> SegId {
        for link in self.links.outgoing(start).to_vec() {
            self.remove_link(start, link);
        }
        for link in self.links.incoming(end).to_vec() {
            self.remove_link(link, end);
        }

        let new_id = self.next_seg_id();
        let origin = BridgeOrigin {
            kind: bridge.kind,
            graph_path: graph_path.to_vec(),
        };
        self.insert_segment(new_id, Segment::with_origin(bridge.depth, sequence, origin));

        let new_seg = SignedSeg::forward(new_id);
        self.add_link(start, new_seg);
        self.add_link(new_seg, end);

        for &seg in graph_path {
            self.remove_segment_depth(seg, bridge.depth);
        }
        new_id
    }

    /// Removes segments consumed as bridge interiors, where doing so does
    /// not break up the graph. Components consumed in their entirety go
    /// too.
    fn clean_up_bridged_segments(&mut self, used_in_bridges: &[SegId]) {
        let mut removed: Vec<SegId> = vec![];
        'scan: loop {
            for &id in used_in_bridges {
                if !self.has_segment(id) {
                    continue;
                }

                // A segment with a dead end, or whose deletion creates no
                // new dead ends, can simply go.
                if self.dead_end_count(id) > 0 || self.dead_end_change_if_deleted(id) <= 0 {
                    self.remove_segments(&[id]);
                    removed.push(id);
                    continue 'scan;
                }

                // Several used segments may form a chain that is only
                // deletable as a whole: any one deletion would create dead
                // ends, but the full simple path comes out cleanly.
                let path = self.simple_path(SignedSeg::forward(id));
                let unsigned: Vec<SegId> = path.iter().map(|s| s.id()).collect();
                if path.len() > 1
                    && unsigned.iter().all(|u| used_in_bridges.contains(u))
                    && self.dead_end_change_if_path_deleted(&path) <= 0
                {
                    self.remove_segments(&unsigned);
                    removed.extend(unsigned);
                    continue 'scan;
                }
            }
            break;
        }

        // Connected components entirely consumed by bridges are leftovers.
        let mut to_remove: Vec<SegId> = vec![];
        for component in self.connected_components() {
            if component.iter().all(|id| used_in_bridges.contains(id)) {
                to_remove.extend(component);
            }
        }
        self.remove_segments(&to_remove);
        removed.extend(to_remove);
        if !removed.is_empty() {
            debug!("removed bridged segments: {removed:?}");
        }
    }
}

/// Marks the sides of the start and end segments that the applied bridge
/// occupies, respecting strand.
fn add_to_bridged_sets(
    start: SignedSeg,
    end: SignedSeg,
    right_bridged: &mut BTreeSet<SegId>,
    left_bridged: &mut BTreeSet<SegId>,
) {
    if start.is_forward() {
        right_bridged.insert(start.id());
    } else {
        left_bridged.insert(start.id());
    }
    if end.is_forward() {
        left_bridged.insert(end.id());
    } else {
        right_bridged.insert(end.id());
    }
}

fn dedup_preserving_order(ids: &mut Vec<SegId>) {
    let mut seen = BTreeSet::new();
    ids.retain(|&id| seen.insert(id));
}
