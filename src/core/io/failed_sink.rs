// Sinks for reads that failed alignment
//
// Not-aligned reads are written back as FASTQ so they can be inspected or
// re-processed. Paired reads go to an R1/R2 file pair. Output is gzipped when
// the file name ends in `.gz`, and file I/O runs on a background thread.

use crate::core::io::async_writer::{AsyncChannelWriter, FinishWrite, WriteStatus};
use crate::core::types::{Read, SequenceRecord};
use bio::io::fastq;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io;
use std::path::Path;

/// Destination for reads that could not be aligned
pub trait FailedReadSink {
    fn write(&mut self, read: &Read) -> io::Result<()>;

    /// Complete the output and report any deferred write error
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FailedReadSink for Vec<Read> {
    fn write(&mut self, read: &Read) -> io::Result<()> {
        self.push(read.clone());
        Ok(())
    }
}

fn create_output(path: &Path) -> io::Result<Box<dyn FinishWrite>> {
    let file = File::create(path).map_err(|e| {
        io::Error::new(e.kind(), format!("Error creating {}: {}", path.display(), e))
    })?;
    if path.extension().map_or(false, |e| e == "gz") {
        Ok(Box::new(GzEncoder::new(file, Compression::default())))
    } else {
        Ok(Box::new(file))
    }
}

/// One FASTQ file written on a background thread
struct FastqOutput {
    writer: Option<fastq::Writer<AsyncChannelWriter>>,
    status: WriteStatus,
}

impl FastqOutput {
    fn create(path: &Path) -> io::Result<Self> {
        let inner = AsyncChannelWriter::new(create_output(path)?);
        let status = inner.status();
        Ok(Self {
            writer: Some(fastq::Writer::new(inner)),
            status,
        })
    }

    fn write_mate(&mut self, mate: &SequenceRecord) -> io::Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "failed-read output already closed")
        })?;
        let (id, desc) = match mate.description.split_once(' ') {
            Some((id, desc)) => (id, Some(desc)),
            None => (mate.description.as_str(), None),
        };
        writer.write(id, desc, &mate.data.sequence, &mate.data.quality)
    }

    /// Flush, complete the file (gzip trailer included) and join the writer
    /// thread. Errors the thread hit at any point are returned here.
    fn close(&mut self) -> io::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            let flushed = writer.flush();
            drop(writer);
            flushed?;
        }
        self.status.check()
    }
}

/// FASTQ sink for single-end (R1 only) or paired-end (R1 + R2) reads
pub struct FastqFailedSink {
    r1: FastqOutput,
    r2: Option<FastqOutput>,
}

impl FastqFailedSink {
    pub fn single(path: &Path) -> io::Result<Self> {
        Ok(Self {
            r1: FastqOutput::create(path)?,
            r2: None,
        })
    }

    pub fn paired(r1_path: &Path, r2_path: &Path) -> io::Result<Self> {
        Ok(Self {
            r1: FastqOutput::create(r1_path)?,
            r2: Some(FastqOutput::create(r2_path)?),
        })
    }
}

impl FailedReadSink for FastqFailedSink {
    fn write(&mut self, read: &Read) -> io::Result<()> {
        match (&mut self.r2, read.is_paired()) {
            (None, false) => self.r1.write_mate(read.mate(0)),
            (Some(r2), true) => {
                self.r1.write_mate(read.mate(0))?;
                r2.write_mate(read.mate(1))
            }
            (None, true) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "paired read written to a single-end failed-read sink",
            )),
            (Some(_), false) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "single-end read written to a paired failed-read sink",
            )),
        }
    }

    fn finish(&mut self) -> io::Result<()> {
        let r1 = self.r1.close();
        let r2 = self.r2.as_mut().map_or(Ok(()), FastqOutput::close);
        r1.and(r2)
    }
}
