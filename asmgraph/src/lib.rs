//! The assembly graph engine of a hybrid genome-assembly post-processor: a
//! directed, double-stranded sequence graph together with the algorithms
//! that clean it, infer per-segment copy numbers from read depth, and
//! collapse ambiguity by applying bridges.

pub mod bridge;
pub mod clean;
pub mod copy_depth;
pub mod dna;
pub mod error;
pub mod fasta;
pub mod fastg;
pub mod gfa;
pub mod graph;
pub mod link;
pub mod paths;
pub mod search;
pub mod seg;
pub mod stats;

pub use bridge::{Bridge, BridgeKind, BridgeOrigin};
pub use graph::AssemblyGraph;
pub use seg::{SegId, Segment, SignedSeg, Strand};
