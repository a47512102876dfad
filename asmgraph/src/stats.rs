use crate::{graph::AssemblyGraph, seg::{SegId, Segment, SignedSeg}};

/// Length metrics over the graph's segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContigStats {
    pub n50: usize,
    pub shortest: usize,
    pub lower_quartile: usize,
    pub median: usize,
    pub upper_quartile: usize,
    pub longest: usize,
}

impl AssemblyGraph {
    pub fn contig_stats(&self) -> ContigStats {
        let mut lengths: Vec<usize> = self.segments.values().map(Segment::len).collect();
        lengths.sort_unstable();
        let Some((&shortest, &longest)) = lengths.first().zip(lengths.last()) else {
            return ContigStats::default();
        };

        let top = (lengths.len() - 1) as f64;
        let lower_quartile = value_from_fractional_index(&lengths, top / 4.0).round() as usize;
        let median = value_from_fractional_index(&lengths, top / 2.0).round() as usize;
        let upper_quartile = value_from_fractional_index(&lengths, top * 3.0 / 4.0).round() as usize;

        let half_total_length: usize = lengths.iter().sum::<usize>() / 2;
        let mut total_so_far = 0;
        let mut n50 = 0;
        for &length in lengths.iter().rev() {
            total_so_far += length;
            if total_so_far >= half_total_length {
                n50 = length;
                break;
            }
        }

        ContigStats {
            n50,
            shortest,
            lower_quartile,
            median,
            upper_quartile,
            longest,
        }
    }

    /// The length for which segments that long and longer make up at least
    /// `n_percent` of the total bases; `n_segment_length(50.0)` is the N50.
    /// Overlaps are not counted.
    pub fn n_segment_length(&self, n_percent: f64) -> usize {
        let target_length = self.total_length_no_overlaps() as f64 * (n_percent / 100.0);
        let mut lengths: Vec<usize> = self
            .segments
            .values()
            .map(|s| s.len_no_overlap(self.overlap))
            .collect();
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        let mut length_so_far = 0;
        for length in lengths {
            length_so_far += length;
            if length_so_far as f64 >= target_length {
                return length;
            }
        }
        0
    }

    /// The number of links in the graph, not counting reverse complement
    /// duplicates.
    pub fn total_link_count(&self) -> usize {
        self.links.count()
    }

    /// Components that are one segment circularised onto itself: a
    /// completed piece of circular DNA.
    pub fn completed_circular_components(&self) -> Vec<Vec<SegId>> {
        self.connected_components()
            .into_iter()
            .filter(|component| {
                let [id] = component[..] else {
                    return false;
                };
                let seg = SignedSeg::forward(id);
                self.links.outgoing(seg) == &[seg] && self.links.incoming(seg) == &[seg]
            })
            .collect()
    }
}

/// Interpolates between adjacent values for a fractional index.
fn value_from_fractional_index(values: &[usize], index: f64) -> f64 {
    match values {
        [] => 0.0,
        [only] => *only as f64,
        _ => {
            let whole_part = index.floor() as i64;
            if whole_part < 0 {
                return values[0] as f64;
            }
            let whole_part = whole_part as usize;
            if whole_part >= values.len() - 1 {
                return values[values.len() - 1] as f64;
            }
            let fractional_part = index - whole_part as f64;
            values[whole_part] as f64 * (1.0 - fractional_part)
                + values[whole_part + 1] as f64 * fractional_part
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seg::Strand;

    fn seg(len: usize) -> Segment {
        Segment::new(1.0, "A".repeat(len), Strand::Forward)
    }

    #[test]
    fn stats_on_empty_graph_are_zero() {
        let graph = AssemblyGraph::new(0);
        assert_eq!(graph.contig_stats(), ContigStats::default());
        assert_eq!(graph.n_segment_length(50.0), 0);
    }

    #[test]
    fn quartiles_interpolate_between_lengths() {
        let mut graph = AssemblyGraph::new(0);
        for (id, len) in [(1, 2), (2, 3), (3, 4), (4, 5)] {
            graph.insert_segment(id, seg(len));
        }
        let stats = graph.contig_stats();
        assert_eq!(stats.shortest, 2);
        assert_eq!(stats.longest, 5);
        assert_eq!(stats.lower_quartile, 3);
        assert_eq!(stats.median, 4);
        assert_eq!(stats.upper_quartile, 4);
        // Total 14, half 7: 5 then 4 reaches it.
        assert_eq!(stats.n50, 4);
    }

    #[test]
    fn n_segment_length_ignores_overlaps() {
        let mut graph = AssemblyGraph::new(10);
        graph.insert_segment(1, seg(110));
        graph.insert_segment(2, seg(60));
        graph.insert_segment(3, seg(60));
        // No-overlap lengths 100, 50, 50; total 200.
        assert_eq!(graph.n_segment_length(50.0), 100);
        assert_eq!(graph.n_segment_length(75.0), 50);
    }

    #[test]
    fn self_circularised_segments_are_completed_components() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(1, seg(100));
        graph.insert_segment(2, seg(100));
        graph.insert_segment(3, seg(100));
        graph.add_link(SignedSeg::forward(1), SignedSeg::forward(1));
        graph.add_link(SignedSeg::forward(2), SignedSeg::forward(3));
        assert_eq!(graph.completed_circular_components(), vec![vec![1]]);
    }
}
