// Chunked dispatch of reads to a worker pool with ordered delivery
//
// Three stages connected by bounded crossbeam channels:
//
//   dispatcher thread    reads -> batches of `batch_size`, each tagged with
//                        the sequence number of its first read -> batch channel
//   worker stage         rayon pool drains the batch channel via par_bridge,
//                        one (seq, AlignmentResult) per read -> results channel
//   calling thread       OrderedReceiver keyed on seq -> consumer callback
//
// Sequence numbers are assigned by the dispatcher and are contiguous, so the
// read ids themselves only need to be increasing. At most
// `in_flight_batches()` batches are between the reader and the consumer: the
// dispatcher takes a credit per batch and the consumer returns it once the
// batch's last read has been consumed. This bounds the reorder buffer.
//
// If the consumer fails, dropping the results receiver makes worker sends
// fail, which closes the batch channel and stops the dispatcher. All threads
// are joined before returning.

use crate::core::io::{CountLimitedSource, ReadSource};
use crate::core::types::{AlignmentResult, Read};
use crate::defaults::{PREFETCH_BATCHES, PROGRESS_INTERVAL, READS_PER_BATCH, RESULT_BATCHES_PER_THREAD};
use crate::error::{AlignError, Result};
use crate::pipelines::vdjc::collaborators::VdjcAligner;
use crate::pipelines::vdjc::ordering::OrderedReceiver;
use crossbeam_channel::{bounded, Receiver, Sender};
use rayon::prelude::*;
use std::io;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Alignment worker threads
    pub threads: usize,
    /// Reads per batch
    pub batch_size: usize,
    /// Batches buffered between the reader and the workers
    pub prefetch_depth: usize,
    /// Stop after this many reads
    pub limit: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            batch_size: READS_PER_BATCH,
            prefetch_depth: PREFETCH_BATCHES,
            limit: None,
        }
    }
}

impl DispatchConfig {
    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads,
            ..Self::default()
        }
    }

    /// Clamp zero values to 1
    fn normalized(&self) -> Self {
        Self {
            threads: self.threads.max(1),
            batch_size: self.batch_size.max(1),
            prefetch_depth: self.prefetch_depth.max(1),
            limit: self.limit,
        }
    }

    fn results_capacity(&self) -> usize {
        self.batch_size * self.threads * RESULT_BATCHES_PER_THREAD
    }

    /// Batches dispatched but not yet fully consumed, at most
    pub fn in_flight_batches(&self) -> usize {
        self.prefetch_depth
            .max(self.threads * RESULT_BATCHES_PER_THREAD)
            .max(1)
    }
}

/// Counters from one dispatch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Reads pulled from the source
    pub reads: u64,
    pub batches: u64,
    /// Largest number of results waiting for an earlier read
    pub peak_buffered: usize,
}

/// Align every read of `source` on a pool of `config.threads` workers and
/// hand the results to `consume` in input order.
///
/// Returns the first error among consumer, reader and pipeline threads, in
/// that order. An aligner whose `align_batch` does not return exactly one
/// result per read, in read order, fails the run when that batch's turn
/// comes.
///
/// # Arguments
/// * `source` - Read supplier, truncated to `config.limit` if set
/// * `aligner` - Shared engine; only `align_batch` is called, concurrently
/// * `config` - Pool and batching configuration
/// * `consume` - Called once per read, on the calling thread
pub fn run_ordered<S, A, F>(
    source: &mut S,
    aligner: &A,
    config: &DispatchConfig,
    consume: F,
) -> Result<DispatchSummary>
where
    S: ReadSource + ?Sized,
    A: VdjcAligner + ?Sized,
    F: FnMut(AlignmentResult) -> Result<()>,
{
    let config = config.normalized();
    match config.limit {
        Some(limit) => run_stages(&mut CountLimitedSource::new(source, limit), aligner, &config, consume),
        None => run_stages(source, aligner, &config, consume),
    }
}

fn run_stages<S, A, F>(
    source: &mut S,
    aligner: &A,
    config: &DispatchConfig,
    mut consume: F,
) -> Result<DispatchSummary>
where
    S: ReadSource + ?Sized,
    A: VdjcAligner + ?Sized,
    F: FnMut(AlignmentResult) -> Result<()>,
{
    // An empty source needs no pool
    let Some(first) = source.next_read()? else {
        log::debug!("Read source is empty");
        return Ok(DispatchSummary::default());
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .thread_name(|i| format!("align-worker-{}", i))
        .build()?;
    let window = config.in_flight_batches();
    log::debug!(
        "Dispatching batches of {} reads to {} workers (prefetch {}, at most {} batches in flight)",
        config.batch_size,
        config.threads,
        config.prefetch_depth,
        window
    );

    let (batch_tx, batch_rx) = bounded::<(u64, Vec<Read>)>(config.prefetch_depth);
    let (result_tx, result_rx) = bounded::<(u64, Result<AlignmentResult>)>(config.results_capacity());
    let (credit_tx, credit_rx) = bounded::<()>(window);
    let batch_size = config.batch_size;

    std::thread::scope(|scope| {
        let dispatcher = std::thread::Builder::new()
            .name("align-dispatcher".to_string())
            .spawn_scoped(scope, move || {
                dispatch_batches(source, first, batch_size, window, credit_rx, batch_tx)
            })?;

        let workers = std::thread::Builder::new()
            .name("align-workers".to_string())
            .spawn_scoped(scope, move || {
                pool.install(|| {
                    batch_rx
                        .into_iter()
                        .par_bridge()
                        .try_for_each_with(result_tx, |tx, (first_seq, batch)| {
                            let ids: Vec<u64> = batch.iter().map(|read| read.id).collect();
                            let results = aligner.align_batch(batch);
                            if let Err(e) = check_batch(&ids, &results) {
                                // Delivered in place of the batch's first result
                                return tx.send((first_seq, Err(e))).map_err(drop);
                            }
                            for (seq, result) in (first_seq..).zip(results) {
                                // Receiver gone: the consumer has stopped
                                tx.send((seq, Ok(result))).map_err(drop)?;
                            }
                            Ok::<(), ()>(())
                        })
                })
            })?;

        let mut ordered = OrderedReceiver::new(result_rx, 0);
        let consumed: Result<()> = ordered.by_ref().try_for_each(|(seq, result)| {
            consume(result?)?;
            if (seq + 1) % batch_size as u64 == 0 {
                // Dispatcher gone once the source is exhausted
                let _ = credit_tx.try_send(());
            }
            Ok(())
        });
        let peak_buffered = ordered.peak_buffered();
        // Unblocks a dispatcher waiting on a credit and workers waiting on a send
        drop(ordered);
        drop(credit_tx);

        let workers = workers.join();
        let dispatched = dispatcher.join();

        consumed?;
        if workers.is_err() {
            return Err(AlignError::PipelinePanicked("align-workers"));
        }
        let (reads, batches) = dispatched.map_err(|_| AlignError::PipelinePanicked("align-dispatcher"))??;

        Ok(DispatchSummary {
            reads,
            batches,
            peak_buffered,
        })
    })
}

/// Fail unless `results` holds exactly one result per id of `ids`, in order
fn check_batch(ids: &[u64], results: &[AlignmentResult]) -> Result<()> {
    if ids.len() != results.len() {
        return Err(AlignError::ResultCountMismatch {
            expected: ids.len(),
            returned: results.len(),
        });
    }
    match ids.iter().zip(results).find(|(id, result)| **id != result.read.id) {
        Some((&expected, result)) => Err(AlignError::ResultOrderMismatch {
            expected,
            found: result.read.id,
        }),
        None => Ok(()),
    }
}

/// Pull reads into batches until the source is exhausted or the workers
/// stop accepting batches. Once `window` batches are in flight, each new
/// batch waits for a credit. Returns (reads pulled, batches sent).
fn dispatch_batches<S: ReadSource + ?Sized>(
    source: &mut S,
    first: Read,
    batch_size: usize,
    window: usize,
    credits: Receiver<()>,
    batch_tx: Sender<(u64, Vec<Read>)>,
) -> io::Result<(u64, u64)> {
    let mut progress = ProgressLog::new(PROGRESS_INTERVAL);
    let mut batches = 0u64;
    let mut next_seq = 0u64;
    let mut pending = Some(first);

    loop {
        let mut batch = Vec::with_capacity(batch_size);
        batch.extend(pending.take());
        while batch.len() < batch_size {
            match source.next_read()? {
                Some(read) => batch.push(read),
                None => break,
            }
        }
        let exhausted = batch.len() < batch_size;

        if !batch.is_empty() {
            if batches >= window as u64 && credits.recv().is_err() {
                log::debug!("Consumer stopped; dispatcher exiting after {} batches", batches);
                break;
            }
            let len = batch.len() as u64;
            if batch_tx.send((next_seq, batch)).is_err() {
                log::debug!("Workers stopped; dispatcher exiting after {} batches", batches);
                break;
            }
            next_seq += len;
            batches += 1;
        }
        progress.tick(source.progress());

        if exhausted {
            break;
        }
    }
    Ok((source.number_of_reads(), batches))
}

/// Rate-limited "Alignment: NN.N%" log lines
struct ProgressLog {
    interval: Duration,
    last: Instant,
}

impl ProgressLog {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    fn tick(&mut self, fraction: Option<f64>) {
        if self.last.elapsed() < self.interval {
            return;
        }
        self.last = Instant::now();
        if let Some(fraction) = fraction {
            log::info!("Alignment: {:.1}%", 100.0 * fraction.clamp(0.0, 1.0));
        }
    }
}
