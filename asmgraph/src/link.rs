use std::collections::{BTreeMap, BTreeSet};

use crate::seg::{SegId, SignedSeg};

/// The bidirected link structure of the graph: two mirrored adjacency maps
/// over signed segment ids.
///
/// A link `a -> b` means the 3' end of strand `a` abuts the 5' end of strand
/// `b`. Every mutation inserts or removes a link together with its reverse
/// complement twin `-b -> -a`, so strand symmetry holds by construction.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    forward: BTreeMap<SignedSeg, Vec<SignedSeg>>,
    reverse: BTreeMap<SignedSeg, Vec<SignedSeg>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `start -> end` and its twin. Idempotent on duplicates.
    pub fn add(&mut self, start: SignedSeg, end: SignedSeg) {
        Self::insert(&mut self.forward, start, end);
        Self::insert(&mut self.reverse, end, start);
        Self::insert(&mut self.reverse, -start, -end);
        Self::insert(&mut self.forward, -end, -start);
    }

    /// Removes `start -> end` and its twin wherever they appear.
    pub fn remove(&mut self, start: SignedSeg, end: SignedSeg) {
        Self::delete(&mut self.forward, start, end);
        Self::delete(&mut self.forward, -end, -start);
        Self::delete(&mut self.reverse, end, start);
        Self::delete(&mut self.reverse, -start, -end);
    }

    /// Signed ids reachable from `seg` in one step.
    pub fn outgoing(&self, seg: SignedSeg) -> &[SignedSeg] {
        self.forward.get(&seg).map(Vec::as_slice).unwrap_or(&[])
    }
    /// Signed ids that reach `seg` in one step.
    pub fn incoming(&self, seg: SignedSeg) -> &[SignedSeg] {
        self.reverse.get(&seg).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, start: SignedSeg, end: SignedSeg) -> bool {
        self.outgoing(start).contains(&end)
    }

    /// Unsigned ids of all segments directly connected to `id`, on either
    /// strand and in either direction.
    pub fn connected_ids(&self, id: SegId) -> BTreeSet<SegId> {
        let seg = SignedSeg::forward(id);
        self.outgoing(seg)
            .iter()
            .chain(self.incoming(seg))
            .map(|s| s.id())
            .collect()
    }

    /// Drops every entry that references `±id` for any id in the set.
    pub fn remove_segments(&mut self, ids: &BTreeSet<SegId>) {
        for map in [&mut self.forward, &mut self.reverse] {
            map.retain(|seg, ends| {
                if ids.contains(&seg.id()) {
                    return false;
                }
                ends.retain(|end| !ids.contains(&end.id()));
                !ends.is_empty()
            });
        }
    }

    /// Rebuilds the table with every id translated through `changes`.
    /// Strands are preserved. Every live id must be present in the map.
    pub fn renumbered(&self, changes: &BTreeMap<SegId, SegId>) -> Self {
        let translate = |seg: SignedSeg| SignedSeg::new(changes[&seg.id()], seg.strand());
        let mut renumbered = Self::new();
        for (&start, ends) in &self.forward {
            for &end in ends {
                renumbered.add(translate(start), translate(end));
            }
        }
        renumbered
    }

    /// All links, one entry per stored direction (twins included).
    pub fn iter(&self) -> impl Iterator<Item = (SignedSeg, SignedSeg)> + '_ {
        self.forward
            .iter()
            .flat_map(|(&start, ends)| ends.iter().map(move |&end| (start, end)))
    }

    /// The number of links, not counting reverse complement duplicates.
    pub fn count(&self) -> usize {
        let mut seen = BTreeSet::new();
        for (start, end) in self.iter() {
            if !seen.contains(&(start, end)) && !seen.contains(&(-end, -start)) {
                seen.insert((start, end));
            }
        }
        seen.len()
    }

    fn insert(map: &mut BTreeMap<SignedSeg, Vec<SignedSeg>>, key: SignedSeg, value: SignedSeg) {
        let values = map.entry(key).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    fn delete(map: &mut BTreeMap<SignedSeg, Vec<SignedSeg>>, key: SignedSeg, value: SignedSeg) {
        let Some(values) = map.get_mut(&key) else {
            return;
        };
        if let Some(at) = values.iter().position(|&v| v == value) {
            values.remove(at);
        }
        if values.is_empty() {
            map.remove(&key);
        }
    }
}

/// The 'positive' representative of a reverse complement link pair, used to
/// emit each pair once. A link is positive if both signs are positive, or it
/// is its own reverse complement, or the start has the larger unsigned id.
pub fn is_link_positive(start: SignedSeg, end: SignedSeg) -> bool {
    if start.is_forward() && end.is_forward() {
        return true;
    }
    if !start.is_forward() && !end.is_forward() {
        return false;
    }
    if start == -end {
        return true;
    }
    start.id() > end.id()
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

    #[test]
    fn add_creates_twin() {
        let mut links = LinkTable::new();
        links.add(f(1), r(2));
        assert!(links.contains(f(1), r(2)));
        assert!(links.contains(f(2), r(1)));
        assert_eq!(links.incoming(r(2)), &[f(1)]);
        assert_eq!(links.incoming(r(1)), &[f(2)]);
        assert_eq!(links.count(), 1);
    }

    #[test]
    fn add_is_idempotent() {
        let mut links = LinkTable::new();
        links.add(f(1), f(2));
        links.add(f(1), f(2));
        assert_eq!(links.outgoing(f(1)), &[f(2)]);
        assert_eq!(links.count(), 1);
    }

    #[test]
    fn remove_drops_twin_and_is_noop_when_absent() {
        let mut links = LinkTable::new();
        links.add(f(1), f(2));
        links.remove(f(1), f(2));
        assert_eq!(links.count(), 0);
        assert!(links.outgoing(f(1)).is_empty());
        assert!(links.outgoing(r(2)).is_empty());
        links.remove(f(1), f(2));
        assert_eq!(links.count(), 0);
    }

    #[test]
    fn palindromic_link_is_its_own_twin() {
        let mut links = LinkTable::new();
        links.add(f(3), r(3));
        assert_eq!(links.outgoing(f(3)), &[r(3)]);
        assert_eq!(links.count(), 1);
        links.remove(f(3), r(3));
        assert_eq!(links.count(), 0);
    }

    #[test]
    fn remove_segments_purges_both_maps() {
        let mut links = LinkTable::new();
        links.add(f(1), f(2));
        links.add(f(2), f(3));
        links.remove_segments(&BTreeSet::from([2]));
        assert_eq!(links.count(), 0);
        links.add(f(1), f(3));
        links.remove_segments(&BTreeSet::from([4]));
        assert_eq!(links.count(), 1);
    }

    #[test]
    fn connected_ids_sees_both_strands() {
        let mut links = LinkTable::new();
        links.add(f(1), f(2));
        links.add(r(3), f(1));
        assert_eq!(links.connected_ids(1), BTreeSet::from([2, 3]));
        assert_eq!(links.connected_ids(3), BTreeSet::from([1]));
    }

    #[test]
    fn positive_link_rule() {
        assert!(is_link_positive(f(1), f(2)));
        assert!(!is_link_positive(r(1), r(2)));
        assert!(is_link_positive(f(3), r(3)));
        assert!(is_link_positive(r(5), f(2)));
        assert!(!is_link_positive(r(2), f(5)));
    }
}
