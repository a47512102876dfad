use std::{
    collections::BTreeMap,
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::Path,
};

use log::{info, warn};

use crate::{
    error::FileError,
    graph::AssemblyGraph,
    seg::{SegId, Segment, SignedSeg, Strand},
};

#[derive(Debug, thiserror::Error)]
pub enum FastgParseError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: unreadable segment header {header:?}")]
    InvalidHeader { line: usize, header: String },
}

impl AssemblyGraph {
    pub fn from_fastg_path(
        path: impl AsRef<Path>,
        overlap: usize,
    ) -> Result<Self, FileError<FastgParseError>> {
        let path = path.as_ref();
        info!("loading graph from {}", path.display());
        File::open(path)
            .map_err(FastgParseError::from)
            .and_then(|file| Self::from_fastg(BufReader::new(file), overlap))
            .map_err(FileError::new(path))
    }

    /// Loads a graph from a SPAdes-style FASTG file. Both strands of a
    /// segment may carry their own record; whichever is missing is rebuilt
    /// by reverse complement. Reverse complement twin links are synthesized
    /// when a record only declares one direction.
    pub fn from_fastg(reader: impl BufRead, overlap: usize) -> Result<Self, FastgParseError> {
        let mut records: Vec<(usize, String, String)> = vec![];
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('>') {
                records.push((i + 1, header.to_owned(), String::new()));
            } else if let Some((_, _, sequence)) = records.last_mut() {
                sequence.push_str(line);
            }
        }

        let mut graph = Self::new(overlap);

        // First pass: sequences, one or both strands per segment.
        let mut strands: BTreeMap<SegId, (f64, Option<String>, Option<String>)> = BTreeMap::new();
        for (line, header, sequence) in &records {
            // Only the part before any neighbour list names this record.
            let own = header.split(':').next().unwrap_or(header);
            let edge = parse_header_edge(own).ok_or_else(|| FastgParseError::InvalidHeader {
                line: *line,
                header: header.clone(),
            })?;
            let entry = strands.entry(edge.id).or_insert((edge.depth, None, None));
            match edge.strand {
                Strand::Forward => entry.1 = Some(sequence.clone()),
                Strand::Reverse => entry.2 = Some(sequence.clone()),
            }
        }
        for (id, (depth, forward, reverse)) in strands {
            let segment = match (forward, reverse) {
                (Some(forward), _) => Segment::new(depth, forward, Strand::Forward),
                (None, Some(reverse)) => Segment::new(depth, reverse, Strand::Reverse),
                (None, None) => unreachable!(),
            };
            graph.insert_segment(id, segment);
        }

        // Second pass: links from the header neighbour lists.
        for (line, header, _) in &records {
            let err = || FastgParseError::InvalidHeader {
                line: *line,
                header: header.clone(),
            };
            let trimmed = header.strip_suffix(';').unwrap_or(header);
            let Some((start, neighbours)) = trimmed.split_once(':') else {
                continue;
            };
            let start = parse_header_edge(start).ok_or_else(|| err())?.signed();
            for neighbour in neighbours.split(',') {
                let end = parse_header_edge(neighbour).ok_or_else(|| err())?.signed();
                if !graph.has_segment(start.id()) || !graph.has_segment(end.id()) {
                    warn!("dropping link {start} -> {end}: segment not in the graph");
                    continue;
                }
                graph.add_link(start, end);
            }
        }

        info!(
            "loaded {} segments and {} links",
            graph.segments().len(),
            graph.total_link_count()
        );
        Ok(graph)
    }

    pub fn save_fastg_path(&self, path: impl AsRef<Path>) -> Result<(), FileError<io::Error>> {
        let path = path.as_ref();
        info!("saving graph to {}", path.display());
        File::create(path)
            .and_then(|file| self.save_fastg(file))
            .map_err(FileError::new(path))
    }

    /// Writes the whole graph as SPAdes-style FASTG: a record per strand of
    /// each segment, with outgoing links in the header.
    pub fn save_fastg(&self, mut writer: impl Write) -> io::Result<()> {
        for (&id, segment) in &self.segments {
            for strand in [Strand::Forward, Strand::Reverse] {
                writeln!(writer, ">{}", self.fastg_header_with_links(id, strand))?;
                write_wrapped(&mut writer, segment.sequence(strand))?;
            }
        }
        Ok(())
    }

    fn fastg_header_with_links(&self, id: SegId, strand: Strand) -> String {
        let seg = SignedSeg::new(id, strand);
        let mut header = self.fastg_header(seg);
        let outgoing = self.links.outgoing(seg);
        if !outgoing.is_empty() {
            header.push(':');
            let neighbours: Vec<String> =
                outgoing.iter().map(|&next| self.fastg_header(next)).collect();
            header.push_str(&neighbours.join(","));
        }
        header.push(';');
        header
    }

    fn fastg_header(&self, seg: SignedSeg) -> String {
        let segment = &self.segments[&seg.id()];
        let mut header = format!(
            "EDGE_{}_length_{}_cov_{}",
            seg.id(),
            segment.len(),
            segment.depth,
        );
        if !seg.is_forward() {
            header.push('\'');
        }
        header
    }
}

struct HeaderEdge {
    id: SegId,
    depth: f64,
    strand: Strand,
}

impl HeaderEdge {
    fn signed(&self) -> SignedSeg {
        SignedSeg::new(self.id, self.strand)
    }
}

/// Parses one `EDGE_<id>_length_<len>_cov_<depth>['`] header piece. The
/// trailing `;` and any neighbour list must already be stripped.
fn parse_header_edge(header: &str) -> Option<HeaderEdge> {
    let header = header.trim();
    let header = header.strip_suffix(';').unwrap_or(header);
    let (header, strand) = match header.strip_suffix('\'') {
        Some(stripped) => (stripped, Strand::Reverse),
        None => (header, Strand::Forward),
    };
    let mut parts = header.split('_');
    if parts.next() != Some("EDGE") {
        return None;
    }
    let id: SegId = parts.next()?.parse().ok()?;
    if id == 0 || parts.next() != Some("length") {
        return None;
    }
    let _length: usize = parts.next()?.parse().ok()?;
    if parts.next() != Some("cov") {
        return None;
    }
    let depth: f64 = parts.next()?.parse().ok()?;
    Some(HeaderEdge {
        id,
        depth,
        strand,
    })
}

/// Writes a sequence wrapped to 60 columns, ending in a newline.
fn write_wrapped(writer: &mut impl Write, sequence: &str) -> io::Result<()> {
    for chunk in sequence.as_bytes().chunks(60) {
        writer.write_all(chunk)?;
        writer.write_all(b"\n")?;
    }
    if sequence.is_empty() {
        writer.write_all(b"\n")?;
    }
    Ok(())
}
