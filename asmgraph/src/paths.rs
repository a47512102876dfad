use std::io::{self, BufRead};

use log::warn;

use crate::{graph::AssemblyGraph, seg::SignedSeg};

/// Replaces every occurrence of `from` with `to`, in place.
pub(crate) fn replace_value(list: &mut [SignedSeg], from: SignedSeg, to: SignedSeg) {
    for value in list {
        if *value == from {
            *value = to;
        }
    }
}

/// Replaces every contiguous occurrence of `pattern` with `replacement`.
pub(crate) fn find_replace(
    path: &[SignedSeg],
    pattern: &[SignedSeg],
    replacement: &[SignedSeg],
) -> Vec<SignedSeg> {
    if pattern.is_empty() {
        return path.to_vec();
    }
    let mut result = Vec::with_capacity(path.len());
    let mut at = 0;
    while at < path.len() {
        if path[at..].starts_with(pattern) {
            result.extend_from_slice(replacement);
            at += pattern.len();
        } else {
            result.push(path[at]);
            at += 1;
        }
    }
    result
}

/// Inserts `insert` between every adjacent `(first, second)` pair.
pub(crate) fn insert_between(
    path: &[SignedSeg],
    first: SignedSeg,
    second: SignedSeg,
    insert: SignedSeg,
) -> Vec<SignedSeg> {
    let mut result = Vec::with_capacity(path.len());
    for (i, &value) in path.iter().enumerate() {
        result.push(value);
        if value == first && path.get(i + 1) == Some(&second) {
            result.push(insert);
        }
    }
    result
}

/// Splits the path at every element found in `cut`, excluding the cut
/// elements themselves. Fragments of fewer than two segments are discarded;
/// they are not useful as paths.
pub(crate) fn split_path_on(path: &[SignedSeg], cut: &[SignedSeg]) -> Vec<Vec<SignedSeg>> {
    let mut fragments = vec![];
    let mut current = vec![];
    for &value in path {
        if cut.contains(&value) {
            fragments.push(std::mem::take(&mut current));
        } else {
            current.push(value);
        }
    }
    fragments.push(current);
    fragments.retain(|fragment| fragment.len() > 1);
    fragments
}

#[derive(Debug, thiserror::Error)]
pub enum SpadesPathsError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("line {line}: invalid signed segment id {token:?}")]
    InvalidSegment { line: usize, token: String },
}

impl AssemblyGraph {
    /// Loads SPAdes contig paths. Only positive (non-`'`) paths with more
    /// than one segment are kept. Paths do not span gaps: each
    /// `;`-separated fragment becomes its own `_1`, `_2`, ... sub-path.
    pub fn load_spades_paths(&mut self, reader: impl BufRead) -> Result<(), SpadesPathsError> {
        // Block name, starting line and concatenated segment string.
        let mut blocks: Vec<(String, usize, String)> = vec![];
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("NODE") {
                blocks.push((line.to_owned(), i + 1, String::new()));
            } else if let Some((_, _, segment_string)) = blocks.last_mut() {
                segment_string.push_str(line);
            }
        }

        for (name, line, segment_string) in blocks {
            if name.ends_with('\'') {
                continue;
            }
            let mut name_parts = name.split('_');
            let name = match (name_parts.next(), name_parts.next()) {
                (Some(node), Some(num)) => format!("{node}_{num}"),
                _ => continue,
            };
            if segment_string.is_empty() {
                continue;
            }
            let fragments: Vec<&str> = segment_string
                .split(';')
                .filter(|fragment| fragment.split(',').count() > 1)
                .collect();
            for (i, fragment) in fragments.iter().enumerate() {
                let path_name = if fragments.len() > 1 {
                    format!("{name}_{}", i + 1)
                } else {
                    name.clone()
                };
                let segments = fragment
                    .split(',')
                    .map(|token| {
                        token
                            .parse::<SignedSeg>()
                            .map_err(|e| SpadesPathsError::InvalidSegment {
                                line,
                                token: e.from,
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if let Some(missing) = segments.iter().find(|s| !self.has_segment(s.id())) {
                    warn!("dropping path {path_name}: segment {} is not in the graph", missing.id());
                    continue;
                }
                self.paths.insert(path_name, segments);
            }
        }
        Ok(())
    }
}
