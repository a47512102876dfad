use std::collections::BTreeMap;

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    graph::AssemblyGraph,
    seg::{SegId, SignedSeg},
};

/// Cap on the number of candidate partial paths held at once. Pathological
/// graphs can grow the working set exponentially; beyond this it is
/// uniformly downsampled, so enumeration becomes lossy.
const MAX_WORKING_PATHS: usize = 10_000;

impl AssemblyGraph {
    /// All paths connecting `start` to `end` within the length bounds,
    /// sorted so the closest matches to `target_length` come first and
    /// truncated to `max_path_count`. The start and end segments are not
    /// themselves part of the returned paths.
    ///
    /// Loops could contribute unbounded path counts, so each segment may
    /// appear in one path (counting both strands) at most twice its copy
    /// number or its depth relative to the start/end depth, whichever is
    /// larger.
    pub fn all_paths(
        &self,
        start: SignedSeg,
        end: SignedSeg,
        min_length: usize,
        target_length: usize,
        max_length: usize,
        max_path_count: usize,
    ) -> Vec<Vec<SignedSeg>> {
        if self.links.outgoing(start).is_empty() {
            return vec![];
        }

        let start_seg = &self.segments[&start.id()];
        let end_seg = &self.segments[&end.id()];
        let start_weight = start_seg.len_no_overlap(self.overlap) as f64;
        let end_weight = end_seg.len_no_overlap(self.overlap) as f64;
        let start_end_depth = if start_weight + end_weight > 0.0 {
            (start_seg.depth * start_weight + end_seg.depth * end_weight)
                / (start_weight + end_weight)
        } else {
            (start_seg.depth + end_seg.depth) / 2.0
        };

        let mut max_allowed_counts: BTreeMap<SegId, usize> = BTreeMap::new();
        let mut rng = StdRng::seed_from_u64(0);

        let mut working_paths: Vec<Vec<SignedSeg>> = self
            .links
            .outgoing(start)
            .iter()
            .map(|&seg| vec![seg])
            .collect();
        let mut final_paths: Vec<Vec<SignedSeg>> = vec![];
        while !working_paths.is_empty() {
            let mut new_working_paths = vec![];
            for working_path in &working_paths {
                let last_seg = *working_path.last().unwrap();
                if last_seg == end {
                    let potential_result = &working_path[..working_path.len() - 1];
                    if self.path_length(potential_result) >= min_length {
                        final_paths.push(potential_result.to_vec());
                    }
                } else if self.path_length(working_path) <= max_length {
                    for &next_seg in self.links.outgoing(last_seg) {
                        let max_allowed =
                            *max_allowed_counts.entry(next_seg.id()).or_insert_with(|| {
                                let by_copies = self
                                    .copy_depths
                                    .get(&next_seg.id())
                                    .map(Vec::len)
                                    .unwrap_or(1);
                                let depth = self.segments[&next_seg.id()].depth;
                                let by_depth = if start_end_depth > 0.0 {
                                    ((depth / start_end_depth).round() as usize).max(1)
                                } else {
                                    1
                                };
                                2 * by_copies.max(by_depth)
                            });
                        let count_so_far = working_path
                            .iter()
                            .filter(|&&seg| seg == next_seg || seg == -next_seg)
                            .count();
                        if count_so_far < max_allowed {
                            let mut extended = working_path.clone();
                            extended.push(next_seg);
                            new_working_paths.push(extended);
                        }
                    }
                }
            }
            working_paths = new_working_paths;

            if working_paths.len() > MAX_WORKING_PATHS {
                let mut keep =
                    rand::seq::index::sample(&mut rng, working_paths.len(), MAX_WORKING_PATHS)
                        .into_vec();
                keep.sort_unstable();
                working_paths = keep
                    .into_iter()
                    .map(|at| std::mem::take(&mut working_paths[at]))
                    .collect();
            }
        }

        final_paths.sort_by_key(|path| self.path_length(path).abs_diff(target_length));
        final_paths.truncate(max_path_count);
        final_paths
    }

    /// Finds every simple loop `start -> repeat -> middle -> repeat -> end`
    /// in the graph, returned as `(start, end, middle, repeat)` tuples. The
    /// start and end may coincide; middle and repeat never do.
    pub fn find_all_simple_loops(&self) -> Vec<(SignedSeg, SignedSeg, SignedSeg, SignedSeg)> {
        let mut simple_loops = vec![];
        for &middle_id in self.segments.keys() {
            // The middle has exactly one connection on each end, both to
            // the repeat segment.
            let middle = SignedSeg::forward(middle_id);
            let [repeat] = self.links.outgoing(middle) else {
                continue;
            };
            let repeat = *repeat;
            if self.links.incoming(middle) != &[repeat] {
                continue;
            }

            // The repeat has exactly two connections per end; fewer would
            // be a mergeable path, more a loop too complex for this shape.
            let repeat_in = self.links.incoming(repeat);
            let repeat_out = self.links.outgoing(repeat);
            if repeat_in.len() != 2 || repeat_out.len() != 2 {
                continue;
            }

            let mut start = repeat_in[0];
            if start.id() == middle.id() {
                start = repeat_in[1];
            }
            if start.id() == middle.id() || start.id() == repeat.id() {
                continue;
            }

            let mut end = repeat_out[0];
            if end.id() == middle.id() {
                end = repeat_out[1];
            }
            if end.id() == middle.id() || end.id() == repeat.id() {
                continue;
            }

            simple_loops.push((start, end, middle, repeat));
        }
        simple_loops
    }
}
