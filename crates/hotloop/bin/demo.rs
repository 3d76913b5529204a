//! Streams a counter through a `ringguard` ring between two threads.
//!
//! Run with: `cargo run -p hotloop --features demo --bin demo --release -- --count 50000000`
//!
//! The producer pushes `0..count`; the consumer (main thread) checks every
//! value arrives in order, logs progress on an `AtomicTicker`, and prints the
//! throughput at the end. `--deadline-ms` cancels both loops early.
//!
//! `--compare` first streams the same count through the std baseline (a
//! `sync_channel` with a `ChannelCanceler` and a `StdTicker`), then through the
//! ring, and logs the speedup.

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use hotloop::{AtomicCanceler, AtomicTicker, Canceler, ChannelCanceler, StdTicker, Ticker};
use ringguard::{Backoff, ChannelQueue, RingBuffer};
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(about = "SPSC ring throughput demo")]
struct Args {
    /// Number of messages to send.
    #[arg(short, long, default_value_t = 10_000_000)]
    count: u64,

    /// Ring capacity (rounded up to a power of two).
    #[arg(long, default_value_t = ringguard::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Progress report interval in milliseconds.
    #[arg(short, long, default_value_t = 250)]
    report_ms: u64,

    /// Cancel both threads after this many milliseconds.
    #[arg(short, long)]
    deadline_ms: Option<u64>,

    /// Also run the std channel baseline and report the speedup.
    #[arg(long)]
    compare: bool,
}

/// Outcome of one producer/consumer run.
#[derive(Debug, Clone, Copy)]
struct Run {
    received: u64,
    elapsed: Duration,
    cancelled: bool,
}

impl Run {
    fn ns_per_op(&self) -> f64 {
        if self.received == 0 {
            return 0.0;
        }
        self.elapsed.as_nanos() as f64 / self.received as f64
    }

    fn mops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.received as f64 / secs / 1e6
        } else {
            0.0
        }
    }

    fn report(&self, name: &str) {
        if self.cancelled {
            warn!(run = name, received = self.received, "cancelled before completion");
        }
        info!(
            run = name,
            received = self.received,
            elapsed_ms = self.elapsed.as_millis() as u64,
            ns_per_op = self.ns_per_op(),
            mops_per_sec = self.mops_per_sec(),
            "done, all values in order"
        );
    }
}

fn main() -> Result<()> {
    ringguard::init_tracing();
    let args = Args::parse();
    let report = Duration::from_millis(args.report_ms);

    info!(
        count = args.count,
        capacity = args.capacity,
        report_ms = args.report_ms,
        deadline_ms = ?args.deadline_ms,
        compare = args.compare,
        "starting"
    );

    let baseline = if args.compare {
        let run = run_channel(&args, report)?;
        run.report("channel");
        Some(run)
    } else {
        None
    };

    let ring = run_ring(&args, report)?;
    ring.report("ring");

    if let Some(baseline) = baseline {
        let speedup = if ring.ns_per_op() > 0.0 {
            baseline.ns_per_op() / ring.ns_per_op()
        } else {
            0.0
        };
        info!(
            channel_ns_per_op = baseline.ns_per_op(),
            ring_ns_per_op = ring.ns_per_op(),
            speedup,
            "comparison"
        );
    }
    Ok(())
}

/// Cancels `cancel` after `ms`. Detached: the process exits with main whether
/// or not it fired.
fn spawn_deadline<C>(cancel: &Arc<C>, ms: Option<u64>) -> Result<()>
where
    C: Canceler + Send + Sync + 'static,
{
    let Some(ms) = ms else {
        return Ok(());
    };
    let cancel = Arc::clone(cancel);
    thread::Builder::new()
        .name("deadline".into())
        .spawn(move || {
            thread::sleep(Duration::from_millis(ms));
            cancel.cancel();
        })
        .context("failed to spawn deadline thread")?;
    Ok(())
}

// =============================================================================
// Ring
// =============================================================================

fn run_ring(args: &Args, report: Duration) -> Result<Run> {
    let ring = Arc::new(RingBuffer::<u64>::new(args.capacity));
    let cancel = Arc::new(AtomicCanceler::new());
    let ticker = AtomicTicker::try_new(report).context("invalid --report-ms")?;
    spawn_deadline(&cancel, args.deadline_ms)?;

    let start = Instant::now();
    let producer = {
        let ring = Arc::clone(&ring);
        let cancel = Arc::clone(&cancel);
        let count = args.count;
        thread::Builder::new()
            .name("producer".into())
            .spawn(move || produce(&ring, &*cancel, count))
            .context("failed to spawn producer thread")?
    };

    let received = match consume(&ring, &*cancel, &ticker, args.count, start) {
        Ok(received) => received,
        Err(e) => {
            // Unblock the producer before bailing out
            cancel.cancel();
            return Err(e);
        }
    };

    let sent = producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;

    // After a cancel the producer may have pushed a few more before noticing
    let mut received = received;
    while let Some(v) = ring.pop() {
        ensure!(v == received, "out of order: expected {}, got {}", received, v);
        received += 1;
    }
    ensure!(
        received == sent,
        "lost messages: producer sent {}, consumer received {}",
        sent,
        received
    );

    Ok(Run {
        received,
        elapsed: start.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}

/// Pushes `0..count`, backing off while the ring is full. Returns how many
/// values were accepted before completion or cancellation.
fn produce(ring: &RingBuffer<u64>, cancel: &impl Canceler, count: u64) -> u64 {
    let backoff = Backoff::new();
    for i in 0..count {
        if cancel.is_cancelled() {
            return i;
        }
        while !ring.push(i) {
            if cancel.is_cancelled() {
                return i;
            }
            backoff.snooze();
        }
        backoff.reset();
    }
    count
}

/// Pops until `count` values arrived in order or `cancel` fires while the
/// ring is empty. Returns the number received.
fn consume(
    ring: &RingBuffer<u64>,
    cancel: &impl Canceler,
    ticker: &impl Ticker,
    count: u64,
    start: Instant,
) -> Result<u64> {
    let backoff = Backoff::new();
    let mut received = 0u64;

    while received < count {
        if ticker.tick() {
            let secs = start.elapsed().as_secs_f64();
            info!(
                received,
                backlog = ring.len(),
                msgs_per_sec = (received as f64 / secs) as u64,
                "progress"
            );
        }

        match ring.pop() {
            Some(v) => {
                if v != received {
                    bail!("out of order: expected {}, got {}", received, v);
                }
                received += 1;
                backoff.reset();
            }
            None => {
                if cancel.is_cancelled() {
                    break;
                }
                backoff.snooze();
            }
        }
    }
    Ok(received)
}

// =============================================================================
// Channel baseline
// =============================================================================

fn run_channel(args: &Args, report: Duration) -> Result<Run> {
    let (tx, rx) = ChannelQueue::<u64>::new(args.capacity).into_split();
    let cancel = Arc::new(ChannelCanceler::new());
    let ticker = StdTicker::try_new(report).context("invalid --report-ms")?;
    spawn_deadline(&cancel, args.deadline_ms)?;

    let start = Instant::now();
    let producer = {
        let cancel = Arc::clone(&cancel);
        let count = args.count;
        thread::Builder::new()
            .name("producer".into())
            .spawn(move || produce_channel(&tx, &*cancel, count))
            .context("failed to spawn producer thread")?
    };

    let received = match consume_channel(&rx, &*cancel, &ticker, args.count, start) {
        Ok(received) => received,
        Err(e) => {
            cancel.cancel();
            return Err(e);
        }
    };

    let sent = producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;

    let mut received = received;
    while let Ok(v) = rx.try_recv() {
        ensure!(v == received, "out of order: expected {}, got {}", received, v);
        received += 1;
    }
    ensure!(
        received == sent,
        "lost messages: producer sent {}, consumer received {}",
        sent,
        received
    );

    Ok(Run {
        received,
        elapsed: start.elapsed(),
        cancelled: cancel.is_cancelled(),
    })
}

fn produce_channel(tx: &SyncSender<u64>, cancel: &impl Canceler, count: u64) -> u64 {
    let backoff = Backoff::new();
    for i in 0..count {
        if cancel.is_cancelled() {
            return i;
        }
        loop {
            match tx.try_send(i) {
                Ok(()) => break,
                Err(TrySendError::Full(_)) => {
                    if cancel.is_cancelled() {
                        return i;
                    }
                    backoff.snooze();
                }
                Err(TrySendError::Disconnected(_)) => return i,
            }
        }
        backoff.reset();
    }
    count
}

fn consume_channel(
    rx: &Receiver<u64>,
    cancel: &impl Canceler,
    ticker: &impl Ticker,
    count: u64,
    start: Instant,
) -> Result<u64> {
    let backoff = Backoff::new();
    let mut received = 0u64;

    while received < count {
        if ticker.tick() {
            let secs = start.elapsed().as_secs_f64();
            info!(
                received,
                msgs_per_sec = (received as f64 / secs) as u64,
                "progress"
            );
        }

        match rx.try_recv() {
            Ok(v) => {
                if v != received {
                    bail!("out of order: expected {}, got {}", received, v);
                }
                received += 1;
                backoff.reset();
            }
            Err(TryRecvError::Empty) => {
                if cancel.is_cancelled() {
                    break;
                }
                backoff.snooze();
            }
            Err(TryRecvError::Disconnected) => break,
        }
    }
    Ok(received)
}
