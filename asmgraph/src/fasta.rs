use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

use log::info;
use noodles::fasta::{
    self,
    record::{Definition, Sequence},
};

use crate::{error::FileError, graph::AssemblyGraph};

impl AssemblyGraph {
    pub fn save_fasta_path(&self, path: impl AsRef<Path>) -> Result<(), FileError<io::Error>> {
        let path = path.as_ref();
        info!("saving sequences to {}", path.display());
        File::create(path)
            .and_then(|file| self.save_fasta(file))
            .map_err(FileError::new(path))
    }

    /// Writes every segment's forward sequence as FASTA, one record per
    /// segment with the id as its name, 60 bases per line.
    pub fn save_fasta(&self, writer: impl Write) -> io::Result<()> {
        let mut writer = fasta::io::writer::Builder::default()
            .set_line_base_count(60)
            .build_from_writer(writer);
        for (id, segment) in &self.segments {
            let record = fasta::Record::new(
                Definition::new(id.to_string(), None),
                Sequence::from(segment.forward_sequence().as_bytes().to_vec()),
            );
            writer.write_record(&record)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seg::{Segment, Strand};

    #[test]
    fn writes_sorted_wrapped_records() {
        let mut graph = AssemblyGraph::new(0);
        graph.insert_segment(2, Segment::new(1.0, "C".repeat(70), Strand::Forward));
        graph.insert_segment(1, Segment::new(1.0, "ACGT".to_owned(), Strand::Forward));
        let mut saved = vec![];
        graph.save_fasta(&mut saved).unwrap();
        let saved = String::from_utf8(saved).unwrap();
        let lines: Vec<&str> = saved.lines().collect();
        assert_eq!(lines[0], ">1");
        assert_eq!(lines[1], "ACGT");
        assert_eq!(lines[2], ">2");
        assert_eq!(lines[3], "C".repeat(60));
        assert_eq!(lines[4], "C".repeat(10));
    }
}
