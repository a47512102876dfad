use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::Path,
};

use log::{info, warn};

use crate::{
    error::FileError,
    graph::AssemblyGraph,
    link::is_link_positive,
    seg::{SegId, Segment, SignedSeg, Strand},
};

#[derive(Debug, thiserror::Error)]
pub enum GfaParseError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: {record} record is missing its {field} field")]
    MissingField {
        line: usize,
        record: char,
        field: &'static str,
    },
    #[error("line {line}: invalid segment id {token:?}")]
    InvalidSegmentId { line: usize, token: String },
    #[error("line {line}: invalid strand {token:?}")]
    InvalidStrand { line: usize, token: String },
    #[error("line {line}: invalid depth tag {token:?}")]
    InvalidDepth { line: usize, token: String },
    #[error("line {line}: invalid overlap CIGAR {token:?}")]
    InvalidOverlap { line: usize, token: String },
    #[error("line {line}: invalid path step {token:?}")]
    InvalidPathStep { line: usize, token: String },
}

/// What to attach to each `S` line beyond length and depth.
#[derive(Debug, Clone, Copy, Default)]
pub enum GfaAnnotation<'a> {
    #[default]
    None,
    /// `LB:z:` copy depth strings and `CL:z:` colours by copy number.
    CopyDepth,
    /// `LB:z:` bridge labels and `CL:z:` colours by segment type.
    SegType { single_copy: &'a [SegId] },
}

impl AssemblyGraph {
    pub fn from_gfa_path(
        path: impl AsRef<Path>,
        overlap: Option<usize>,
    ) -> Result<Self, FileError<GfaParseError>> {
        let path = path.as_ref();
        info!("loading graph from {}", path.display());
        File::open(path)
            .map_err(GfaParseError::from)
            .and_then(|file| Self::from_gfa(BufReader::new(file), overlap))
            .map_err(FileError::new(path))
    }

    /// Loads a graph from GFA. Not any GFA file: segment names must be
    /// integers, depths live in `DP` tags (1.0 when absent), and all link
    /// overlaps are the same. When no overlap is supplied it is taken from
    /// the first `L` line's CIGAR.
    pub fn from_gfa(
        reader: impl BufRead,
        overlap: Option<usize>,
    ) -> Result<Self, GfaParseError> {
        let mut segment_lines = vec![];
        let mut link_lines = vec![];
        let mut path_lines = vec![];
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            match line.chars().next() {
                Some('S') => segment_lines.push((i + 1, line)),
                Some('L') => link_lines.push((i + 1, line)),
                Some('P') => path_lines.push((i + 1, line)),
                _ => {}
            }
        }

        let mut graph = Self::new(overlap.unwrap_or(0));

        for (line, text) in &segment_lines {
            let line = *line;
            let mut parts = text.trim_end().split('\t');
            parts.next();
            let id = parts.next().ok_or(GfaParseError::MissingField {
                line,
                record: 'S',
                field: "name",
            })?;
            let id: SegId = id.parse().map_err(|_| GfaParseError::InvalidSegmentId {
                line,
                token: id.to_owned(),
            })?;
            let sequence = parts.next().ok_or(GfaParseError::MissingField {
                line,
                record: 'S',
                field: "sequence",
            })?;
            let mut depth = 1.0;
            for part in parts {
                if let Some(token) = part.strip_prefix("DP:f:") {
                    depth = token.parse().map_err(|_| GfaParseError::InvalidDepth {
                        line,
                        token: token.to_owned(),
                    })?;
                }
            }
            graph.insert_segment(id, Segment::new(depth, sequence.to_owned(), Strand::Forward));
        }

        for (line, text) in &link_lines {
            let line = *line;
            let parts: Vec<&str> = text.trim_end().split('\t').collect();
            let [_, from, from_strand, to, to_strand, rest @ ..] = &parts[..] else {
                return Err(GfaParseError::MissingField {
                    line,
                    record: 'L',
                    field: "segment",
                });
            };
            let start = parse_step(from, from_strand, line)?;
            let end = parse_step(to, to_strand, line)?;
            if overlap.is_none() && graph.overlap == 0 {
                if let Some(cigar) = rest.first() {
                    let token = cigar.strip_suffix('M').unwrap_or(cigar);
                    graph.overlap =
                        token.parse().map_err(|_| GfaParseError::InvalidOverlap {
                            line,
                            token: (*cigar).to_owned(),
                        })?;
                }
            }
            if !graph.has_segment(start.id()) || !graph.has_segment(end.id()) {
                warn!("dropping link {start} -> {end}: segment not in the graph");
                continue;
            }
            graph.add_link(start, end);
        }

        for (line, text) in &path_lines {
            let line = *line;
            let parts: Vec<&str> = text.trim_end().split('\t').collect();
            let [_, name, steps, ..] = &parts[..] else {
                return Err(GfaParseError::MissingField {
                    line,
                    record: 'P',
                    field: "name",
                });
            };
            let segments = steps
                .split(',')
                .map(|step| {
                    step.parse::<SignedSeg>()
                        .map_err(|e| GfaParseError::InvalidPathStep {
                            line,
                            token: e.from,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            if let Some(missing) = segments.iter().find(|s| !graph.has_segment(s.id())) {
                warn!("dropping path {name}: segment {} is not in the graph", missing.id());
                continue;
            }
            graph.insert_path((*name).to_owned(), segments);
        }

        info!(
            "loaded {} segments and {} links",
            graph.segments().len(),
            graph.total_link_count()
        );
        Ok(graph)
    }

    pub fn save_gfa_path(
        &self,
        path: impl AsRef<Path>,
        annotation: GfaAnnotation<'_>,
    ) -> Result<(), FileError<io::Error>> {
        let path = path.as_ref();
        info!("saving graph to {}", path.display());
        File::create(path)
            .and_then(|file| self.save_gfa(file, annotation))
            .map_err(FileError::new(path))
    }

    /// Writes the whole graph as GFA: segments sorted by id with `LN` and
    /// `DP` tags, one link line per reverse complement pair, and the path
    /// registry with its CIGAR joiners.
    pub fn save_gfa(
        &self,
        mut writer: impl Write,
        annotation: GfaAnnotation<'_>,
    ) -> io::Result<()> {
        for (&id, segment) in &self.segments {
            write!(
                writer,
                "S\t{id}\t{}\tLN:i:{}\tDP:f:{}",
                segment.forward_sequence(),
                segment.len(),
                segment.depth,
            )?;
            match annotation {
                GfaAnnotation::None => {}
                GfaAnnotation::CopyDepth => {
                    if let Some(depths) = self.copy_depths.get(&id) {
                        let labels: Vec<String> =
                            depths.iter().map(|d| format!("{d:.3}")).collect();
                        write!(
                            writer,
                            "\tLB:z:{}\tCL:z:{}",
                            labels.join(", "),
                            copy_number_colour(depths.len()),
                        )?;
                    }
                }
                GfaAnnotation::SegType { single_copy } => {
                    if let Some(origin) = segment.origin() {
                        write!(writer, "\tLB:z:{}", origin.label())?;
                    }
                    let colour = if single_copy.contains(&id) {
                        "forestgreen"
                    } else if segment.origin().is_none() {
                        "grey"
                    } else {
                        "pink"
                    };
                    write!(writer, "\tCL:z:{colour}")?;
                }
            }
            writeln!(writer)?;
        }

        for (start, end) in self.links.iter() {
            if is_link_positive(start, end) {
                writeln!(
                    writer,
                    "L\t{}\t{}\t{}\t{}\t{}M",
                    start.id(),
                    strand_sign(start),
                    end.id(),
                    strand_sign(end),
                    self.overlap,
                )?;
            }
        }

        for (name, segments) in &self.paths {
            let steps: Vec<String> = segments.iter().map(SignedSeg::to_string).collect();
            let joiners = vec![format!("{}M", self.overlap); segments.len().saturating_sub(1)];
            writeln!(writer, "P\t{name}\t{}\t{}", steps.join(","), joiners.join(","))?;
        }
        Ok(())
    }
}

fn parse_step(id: &str, strand: &str, line: usize) -> Result<SignedSeg, GfaParseError> {
    let id: SegId = id.parse().map_err(|_| GfaParseError::InvalidSegmentId {
        line,
        token: id.to_owned(),
    })?;
    let strand = match strand {
        "+" => Strand::Forward,
        "-" => Strand::Reverse,
        _ => {
            return Err(GfaParseError::InvalidStrand {
                line,
                token: strand.to_owned(),
            });
        }
    };
    Ok(SignedSeg::new(id, strand))
}

fn strand_sign(seg: SignedSeg) -> char {
    if seg.is_forward() { '+' } else { '-' }
}

fn copy_number_colour(copies: usize) -> &'static str {
    match copies {
        1 => "forestgreen",
        2 => "gold",
        3 => "darkorange",
        _ => "red",
    }
}
