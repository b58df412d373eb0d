use crossbeam_channel::{bounded, Receiver, Sender};
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

// Messages sent to the background writer thread
enum OutMsg {
    Bytes(Vec<u8>),
    Flush,
}

/// Output with a completion step (trailer, final flush) run once after the
/// last byte has been written
pub trait FinishWrite: Write + Send {
    fn finish_output(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl FinishWrite for File {}

impl<W: Write + Send> FinishWrite for GzEncoder<W> {
    fn finish_output(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

impl<W: FinishWrite + ?Sized> FinishWrite for Box<W> {
    fn finish_output(&mut self) -> io::Result<()> {
        (**self).finish_output()
    }
}

/// First error hit by a background writer thread.
///
/// The error is sticky: every check after the failure reports it, including
/// checks made after the writer itself has been dropped.
#[derive(Clone, Default)]
pub struct WriteStatus(Arc<Mutex<Option<io::Error>>>);

impl WriteStatus {
    fn record(&self, result: io::Result<()>) -> bool {
        let Err(e) = result else {
            return true;
        };
        if let Ok(mut slot) = self.0.lock() {
            slot.get_or_insert(e);
        }
        false
    }

    /// `Err` with a copy of the recorded error, if any
    pub fn check(&self) -> io::Result<()> {
        let slot = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "background writer panicked"))?;
        match slot.as_ref() {
            Some(e) => Err(io::Error::new(e.kind(), e.to_string())),
            None => Ok(()),
        }
    }
}

/// AsyncChannelWriter: implements Write by enqueueing bytes to a background writer thread
///
/// - Wrap any `FinishWrite` output with `AsyncChannelWriter::new(inner)`
/// - The first I/O error hit by the background thread is reported by every
///   later `write`/`flush` call, by `finish`, and by `status().check()`
/// - On close (drop or `finish`) the thread completes the output with
///   `finish_output` and is joined
pub struct AsyncChannelWriter {
    tx: Option<Sender<OutMsg>>,
    handle: Option<JoinHandle<()>>,
    status: WriteStatus,
}

const CHANNEL_CAPACITY: usize = 1024;

impl AsyncChannelWriter {
    /// Create a new asynchronous writer, owning the provided inner writer.
    pub fn new<W: FinishWrite + 'static>(mut inner: W) -> Self {
        // Bounded channel provides backpressure
        let (tx, rx): (Sender<OutMsg>, Receiver<OutMsg>) = bounded(CHANNEL_CAPACITY);
        let status = WriteStatus::default();
        let thread_status = status.clone();

        let handle = thread::spawn(move || {
            for msg in rx.iter() {
                let ok = match msg {
                    OutMsg::Bytes(buf) => thread_status.record(inner.write_all(&buf)),
                    OutMsg::Flush => thread_status.record(inner.flush()),
                };
                if !ok {
                    // Dropping rx makes subsequent sends fail
                    return;
                }
            }
            thread_status.record(inner.finish_output());
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
            status,
        }
    }

    /// Handle on the background error, usable after the writer is dropped
    pub fn status(&self) -> WriteStatus {
        self.status.clone()
    }

    fn send(&self, msg: OutMsg) -> io::Result<()> {
        self.status.check()?;
        let sent = self.tx.as_ref().map(|tx| tx.send(msg).is_ok());
        match sent {
            Some(true) => Ok(()),
            _ => {
                self.status.check()?;
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "background writer stopped"))
            }
        }
    }

    /// Complete the output, stop the background thread and report any
    /// deferred error.
    pub fn finish(mut self) -> io::Result<()> {
        self.shutdown();
        self.status.check()
    }

    fn shutdown(&mut self) {
        // Closing the channel ends the writer loop, which completes the output
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                self.status.record(Err(io::Error::new(
                    io::ErrorKind::Other,
                    "background writer panicked",
                )));
            }
        }
    }
}

impl Write for AsyncChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(OutMsg::Bytes(buf.to_vec()))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send(OutMsg::Flush)
    }
}

impl Drop for AsyncChannelWriter {
    fn drop(&mut self) {
        self.shutdown();
    }
}
