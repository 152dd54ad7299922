//! FASTQ input and output.
//!
//! Thin wrappers around `seq_io` for batched FASTQ reading (plain or
//! gzip-compressed) and for writing corrected records back out. The
//! correction engine itself never touches files; producers pull batches of
//! [`ReadRecord`]s from here and consumers hand corrected records back to a
//! [`ShardWriter`].

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use seq_io::fastq::{Reader as SeqReader, Record};

use crate::errors::{KcorError, Result};

/// One sequencing read: name, base sequence and per-base quality string
/// (raw ASCII codes, same length as the sequence).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// Read name (the FASTQ head line without the leading `@`).
    pub name: Vec<u8>,
    /// Base sequence.
    pub sequence: Vec<u8>,
    /// Quality string, same length as `sequence`.
    pub quality: Vec<u8>,
}

impl ReadRecord {
    /// Read name as UTF-8 text for logging.
    #[must_use]
    pub fn name_text(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// Opens a FASTQ file for reading, transparently decompressing `.gz`
/// input.
fn open_fastq(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Batched FASTQ reader feeding one pipeline producer.
pub struct FastqChunkReader {
    reader: SeqReader<Box<dyn Read + Send>>,
    path: PathBuf,
    records_read: u64,
}

impl FastqChunkReader {
    /// Opens the given FASTQ path (plain or gzip).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<FastqChunkReader> {
        let path = path.as_ref().to_path_buf();
        let inner = open_fastq(&path)?;
        Ok(FastqChunkReader { reader: SeqReader::new(inner), path, records_read: 0 })
    }

    /// Reads up to `max` records. An empty vector means the input is
    /// exhausted.
    ///
    /// # Errors
    /// Fails on malformed FASTQ and on records whose quality string length
    /// differs from the sequence length.
    pub fn next_batch(&mut self, max: usize) -> Result<Vec<ReadRecord>> {
        let mut batch = Vec::with_capacity(max);
        while batch.len() < max {
            let Some(result) = self.reader.next() else {
                break;
            };
            let record = result.map_err(|e| KcorError::InvalidFileFormat {
                file_type: "FASTQ".to_string(),
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
            let sequence = record.seq().to_vec();
            let quality = record.qual().to_vec();
            if sequence.len() != quality.len() {
                return Err(KcorError::InvalidFileFormat {
                    file_type: "FASTQ".to_string(),
                    path: self.path.display().to_string(),
                    reason: format!(
                        "record '{}' has {} bases but {} quality values",
                        String::from_utf8_lossy(record.head()),
                        sequence.len(),
                        quality.len()
                    ),
                });
            }
            self.records_read += 1;
            batch.push(ReadRecord { name: record.head().to_vec(), sequence, quality });
        }
        Ok(batch)
    }

    /// Number of records read so far.
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

/// Serializes one record in four-line FASTQ form.
pub fn write_record<W: Write>(writer: &mut W, record: &ReadRecord) -> std::io::Result<()> {
    writer.write_all(b"@")?;
    writer.write_all(&record.name)?;
    writer.write_all(b"\n")?;
    writer.write_all(&record.sequence)?;
    writer.write_all(b"\n+\n")?;
    writer.write_all(&record.quality)?;
    writer.write_all(b"\n")
}

/// Per-shard output sink: the corrected FASTQ plus a tab-separated
/// corrections sidecar. One consumer at a time writes through it, guarded
/// by the pipeline's per-shard mutex.
pub struct ShardWriter {
    fastq: BufWriter<File>,
    corrections: BufWriter<File>,
}

impl ShardWriter {
    /// Creates `<stem>.corrected.fastq` and `<stem>.corrections.tsv` in
    /// `output_dir`, where `<stem>` is the input file name without its
    /// (possibly doubled, e.g. `.fastq.gz`) extension.
    pub fn create(input: &Path, output_dir: &Path) -> Result<ShardWriter> {
        let stem = shard_stem(input);
        let fastq_path = output_dir.join(format!("{stem}.corrected.fastq"));
        let tsv_path = output_dir.join(format!("{stem}.corrections.tsv"));
        let mut corrections = BufWriter::new(File::create(&tsv_path)?);
        corrections
            .write_all(b"read\tpos\torig_pos\tremoved\tinserted\tprobability\tkind\n")?;
        Ok(ShardWriter { fastq: BufWriter::new(File::create(&fastq_path)?), corrections })
    }

    /// Writes one corrected read and its corrections.
    pub fn write(&mut self, record: &ReadRecord, corrections: &[CorrectionRow]) -> Result<()> {
        write_record(&mut self.fastq, record)?;
        for row in corrections {
            writeln!(
                self.corrections,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.read, row.pos, row.orig_pos, row.removed, row.inserted, row.probability,
                row.kind
            )?;
        }
        Ok(())
    }

    /// Flushes both output files.
    pub fn finish(&mut self) -> Result<()> {
        self.fastq.flush()?;
        self.corrections.flush()?;
        Ok(())
    }
}

/// One row of the corrections sidecar.
#[derive(Debug, Clone)]
pub struct CorrectionRow {
    /// Read name.
    pub read: String,
    /// Position in the corrected sequence at application time.
    pub pos: usize,
    /// Position in the original read.
    pub orig_pos: usize,
    /// Removed substring.
    pub removed: String,
    /// Inserted substring.
    pub inserted: String,
    /// Probability of the corrected error.
    pub probability: f64,
    /// Error kind token.
    pub kind: String,
}

/// Input file name without `.fastq`/`.fq`/`.gz` extensions, used to name
/// the per-shard outputs.
#[must_use]
pub fn shard_stem(input: &Path) -> String {
    let name = input.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    let mut stem = name.as_str();
    for suffix in [".gz", ".fastq", ".fq"] {
        if let Some(trimmed) = stem.strip_suffix(suffix) {
            stem = trimmed;
        }
    }
    stem.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_shard_stem() {
        assert_eq!(shard_stem(Path::new("/data/sample1.fastq")), "sample1");
        assert_eq!(shard_stem(Path::new("sample2.fq")), "sample2");
        assert_eq!(shard_stem(Path::new("sample3.fastq.gz")), "sample3");
        assert_eq!(shard_stem(Path::new("plain")), "plain");
    }

    #[test]
    fn test_read_batches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.fastq");
        let mut file = File::create(&path).unwrap();
        for i in 0..5 {
            writeln!(file, "@read{i}\nACGTACGT\n+\nIIIIIIII").unwrap();
        }
        drop(file);

        let mut reader = FastqChunkReader::open(&path).unwrap();
        let first = reader.next_batch(3).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].name, b"read0".to_vec());
        assert_eq!(first[0].sequence, b"ACGTACGT".to_vec());
        let second = reader.next_batch(3).unwrap();
        assert_eq!(second.len(), 2);
        assert!(reader.next_batch(3).unwrap().is_empty());
        assert_eq!(reader.records_read(), 5);
    }

    #[test]
    fn test_quality_length_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.fastq");
        std::fs::write(&path, "@r1\nACGT\n+\nII\n").unwrap();
        let mut reader = FastqChunkReader::open(&path).unwrap();
        assert!(reader.next_batch(10).is_err());
    }

    #[test]
    fn test_write_record_round_trip() {
        let record = ReadRecord {
            name: b"r1 extra".to_vec(),
            sequence: b"ACGT".to_vec(),
            quality: b"IIII".to_vec(),
        };
        let mut buf = Vec::new();
        write_record(&mut buf, &record).unwrap();
        assert_eq!(buf, b"@r1 extra\nACGT\n+\nIIII\n".to_vec());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("round.fastq");
        std::fs::write(&path, &buf).unwrap();
        let mut reader = FastqChunkReader::open(&path).unwrap();
        let back = reader.next_batch(1).unwrap();
        assert_eq!(back[0], record);
    }

    #[test]
    fn test_shard_writer() {
        let dir = tempfile::tempdir().unwrap();
        let input = Path::new("sample.fastq");
        let mut writer = ShardWriter::create(input, dir.path()).unwrap();
        let record = ReadRecord {
            name: b"r1".to_vec(),
            sequence: b"ACGT".to_vec(),
            quality: b"IIII".to_vec(),
        };
        let row = CorrectionRow {
            read: "r1".to_string(),
            pos: 2,
            orig_pos: 2,
            removed: "G".to_string(),
            inserted: "T".to_string(),
            probability: 0.9,
            kind: "sub_from_T".to_string(),
        };
        writer.write(&record, &[row]).unwrap();
        writer.finish().unwrap();

        let fastq = std::fs::read_to_string(dir.path().join("sample.corrected.fastq")).unwrap();
        assert!(fastq.contains("@r1"));
        let tsv = std::fs::read_to_string(dir.path().join("sample.corrections.tsv")).unwrap();
        assert!(tsv.starts_with("read\tpos"));
        assert!(tsv.contains("sub_from_T"));
    }
}
