// Read sources for the alignment pipeline
//
// This module provides the `ReadSource` capability and its file-backed
// implementation over bio::io::{fastq, fasta}:
// - Single-end FASTQ/FASTA and paired-end FASTQ
// - Gzip (including bgzip) detected by the 1f 8b magic bytes
// - Sequential read ids starting at 0
// - Progress from the fraction of (compressed) input bytes consumed

use crate::core::types::{Read, SequenceRecord, SequenceWithQuality};
use bio::io::{fasta, fastq};
use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Quality assigned to every base of a FASTA record
pub const FASTA_QUALITY: u8 = b'I';

const BUFFER_SIZE: usize = 4 * 1024 * 1024; // 4MB buffer

/// Lazy, ordered supplier of reads.
///
/// Ids of consecutive reads must be unique and strictly increasing; gaps are
/// allowed.
pub trait ReadSource: Send {
    /// Next read, or `None` at end of input
    fn next_read(&mut self) -> io::Result<Option<Read>>;

    /// Number of reads produced so far
    fn number_of_reads(&self) -> u64;

    /// Fraction of input consumed, if known
    fn progress(&self) -> Option<f64>;

    fn is_paired(&self) -> bool;
}

impl<S: ReadSource + ?Sized> ReadSource for &mut S {
    fn next_read(&mut self) -> io::Result<Option<Read>> {
        (**self).next_read()
    }

    fn number_of_reads(&self) -> u64 {
        (**self).number_of_reads()
    }

    fn progress(&self) -> Option<f64> {
        (**self).progress()
    }

    fn is_paired(&self) -> bool {
        (**self).is_paired()
    }
}

impl<S: ReadSource + ?Sized> ReadSource for Box<S> {
    fn next_read(&mut self) -> io::Result<Option<Read>> {
        (**self).next_read()
    }

    fn number_of_reads(&self) -> u64 {
        (**self).number_of_reads()
    }

    fn progress(&self) -> Option<f64> {
        (**self).progress()
    }

    fn is_paired(&self) -> bool {
        (**self).is_paired()
    }
}

// ============================================================================
// COUNT LIMIT
// ============================================================================

/// Truncates a source after `limit` reads
pub struct CountLimitedSource<S> {
    inner: S,
    limit: u64,
    taken: u64,
}

impl<S: ReadSource> CountLimitedSource<S> {
    pub fn new(inner: S, limit: u64) -> Self {
        Self {
            inner,
            limit,
            taken: 0,
        }
    }
}

impl<S: ReadSource> ReadSource for CountLimitedSource<S> {
    fn next_read(&mut self) -> io::Result<Option<Read>> {
        if self.taken >= self.limit {
            return Ok(None);
        }
        let read = self.inner.next_read()?;
        if read.is_some() {
            self.taken += 1;
        }
        Ok(read)
    }

    fn number_of_reads(&self) -> u64 {
        self.taken
    }

    fn progress(&self) -> Option<f64> {
        let by_count = if self.limit == 0 {
            1.0
        } else {
            self.taken as f64 / self.limit as f64
        };
        // The input may run out before the limit
        Some(self.inner.progress().map_or(by_count, |p| p.max(by_count)))
    }

    fn is_paired(&self) -> bool {
        self.inner.is_paired()
    }
}

// ============================================================================
// FILE INPUT
// ============================================================================

/// `io::Read` wrapper counting the bytes pulled from the underlying file
struct CountingReader<R> {
    inner: R,
    consumed: Arc<AtomicU64>,
}

impl<R: io::Read> io::Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[derive(Clone)]
struct ProgressCounter {
    consumed: Arc<AtomicU64>,
    total: u64,
}

impl ProgressCounter {
    fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.consumed.load(Ordering::Relaxed) as f64 / self.total as f64).min(1.0)
    }
}

/// Gzip member header magic
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

type Input = BufReader<Box<dyn io::Read + Send>>;

/// Open a (possibly gzipped) input file with byte-level progress tracking
fn open_input(path: &Path) -> io::Result<(Box<dyn io::Read + Send>, ProgressCounter)> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("Error opening {}: {}", path.display(), e))
    })?;
    let counter = ProgressCounter {
        consumed: Arc::new(AtomicU64::new(0)),
        total: file.metadata()?.len(),
    };
    let counting = CountingReader {
        inner: file,
        consumed: Arc::clone(&counter.consumed),
    };

    let mut buffered = BufReader::with_capacity(BUFFER_SIZE, counting);
    let is_gz = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);
    let reader: Box<dyn io::Read + Send> = if is_gz {
        log::debug!("Detected gzip input: {}", path.display());
        // BGZF is a series of gzip members
        Box::new(MultiGzDecoder::new(buffered))
    } else {
        Box::new(buffered)
    };
    Ok((reader, counter))
}

/// FASTA is chosen by a `.fasta`/`.fa` extension (before an optional `.gz`)
fn is_fasta_path(path: &Path) -> bool {
    let name = path.to_string_lossy();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.ends_with(".fasta") || name.ends_with(".fa")
}

fn to_invalid_data<E: std::error::Error + Send + Sync + 'static>(e: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn join_description(id: &str, desc: Option<&str>) -> String {
    match desc {
        Some(d) if !d.is_empty() => format!("{} {}", id, d),
        _ => id.to_string(),
    }
}

/// Record stream of one input file
enum MateRecords {
    Fastq(fastq::Records<Input>),
    Fasta(fasta::Records<Input>),
}

impl MateRecords {
    fn open(path: &Path) -> io::Result<(Self, ProgressCounter)> {
        let (reader, counter) = open_input(path)?;
        let records = if is_fasta_path(path) {
            MateRecords::Fasta(fasta::Reader::with_capacity(BUFFER_SIZE, reader).records())
        } else {
            MateRecords::Fastq(fastq::Reader::with_capacity(BUFFER_SIZE, reader).records())
        };
        Ok((records, counter))
    }

    fn next_record(&mut self) -> io::Result<Option<SequenceRecord>> {
        match self {
            MateRecords::Fastq(records) => match records.next() {
                None => Ok(None),
                Some(Err(e)) => Err(to_invalid_data(e)),
                Some(Ok(record)) => Ok(Some(SequenceRecord {
                    description: join_description(record.id(), record.desc()),
                    data: SequenceWithQuality::new(record.seq(), record.qual()),
                })),
            },
            MateRecords::Fasta(records) => match records.next() {
                None => Ok(None),
                Some(Err(e)) => Err(e),
                Some(Ok(record)) => {
                    let seq = record.seq().to_ascii_uppercase();
                    let qual = vec![FASTA_QUALITY; seq.len()];
                    Ok(Some(SequenceRecord {
                        description: join_description(record.id(), record.desc()),
                        data: SequenceWithQuality::new(seq, qual),
                    }))
                }
            },
        }
    }
}

/// Single-end or paired-end reads from FASTQ/FASTA files
pub struct FileReadSource {
    r1: MateRecords,
    r2: Option<MateRecords>,
    progress: ProgressCounter,
    next_id: u64,
}

impl FileReadSource {
    /// Open a single-end FASTQ or FASTA file (auto-detects gzip by .gz extension)
    pub fn single(path: &Path) -> io::Result<Self> {
        let (r1, progress) = MateRecords::open(path)?;
        Ok(Self {
            r1,
            r2: None,
            progress,
            next_id: 0,
        })
    }

    /// Open a pair of R1/R2 files
    pub fn paired(r1_path: &Path, r2_path: &Path) -> io::Result<Self> {
        let (r1, progress) = MateRecords::open(r1_path)?;
        let (r2, _) = MateRecords::open(r2_path)?;
        Ok(Self {
            r1,
            r2: Some(r2),
            progress,
            next_id: 0,
        })
    }
}

impl ReadSource for FileReadSource {
    fn next_read(&mut self) -> io::Result<Option<Read>> {
        let r1 = self.r1.next_record()?;
        let read = match (&mut self.r2, r1) {
            (None, None) => None,
            (None, Some(r1)) => Some(Read::single(self.next_id, r1)),
            (Some(r2_records), r1) => match (r1, r2_records.next_record()?) {
                (None, None) => None,
                (Some(r1), Some(r2)) => Some(Read::paired(self.next_id, r1, r2)),
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "R1 and R2 files contain different numbers of reads (after {} pairs)",
                            self.next_id
                        ),
                    ))
                }
            },
        };
        if read.is_some() {
            self.next_id += 1;
        }
        Ok(read)
    }

    fn number_of_reads(&self) -> u64 {
        self.next_id
    }

    fn progress(&self) -> Option<f64> {
        Some(self.progress.fraction())
    }

    fn is_paired(&self) -> bool {
        self.r2.is_some()
    }
}
