//! Integration tests: cancellation and tickers driving real ring loops.

use hotloop::{
    AtomicCanceler, AtomicTicker, BatchTicker, Canceler, ChannelCanceler, HotLoopError,
    ManualClock, MonotonicClock, StdTicker, Ticker,
};
use ringguard::{Backoff, ChannelQueue, Queue, RingBuffer};
use std::sync::mpsc::TrySendError;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_cancel_stops_spsc_pair() {
    let ring = Arc::new(RingBuffer::<u64>::new(64));
    let cancel = Arc::new(AtomicCanceler::new());

    let producer = {
        let ring = Arc::clone(&ring);
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            let backoff = Backoff::new();
            let mut sent = 0u64;
            while !cancel.is_cancelled() {
                if ring.push(sent) {
                    sent += 1;
                    backoff.reset();
                } else {
                    backoff.snooze();
                }
            }
            sent
        })
    };

    let consumer = {
        let ring = Arc::clone(&ring);
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            let mut received = 0u64;
            while !cancel.is_cancelled() {
                if let Some(v) = ring.pop() {
                    assert_eq!(v, received);
                    received += 1;
                }
            }
            received
        })
    };

    thread::sleep(Duration::from_millis(20));
    cancel.cancel();

    let sent = producer.join().unwrap();
    let mut received = consumer.join().unwrap();

    // Both threads have exited: the main thread may now take the consumer role
    while let Some(v) = ring.pop() {
        assert_eq!(v, received);
        received += 1;
    }
    assert_eq!(received, sent);
    assert!(sent > 0, "producer made no progress in 20ms");
}

#[test]
fn test_ticker_paces_consumer_reports() {
    let clock = ManualClock::new();
    let ticker = AtomicTicker::with_clock(Duration::from_millis(10), &clock).unwrap();
    let ring = RingBuffer::<u32>::new(16);

    // Each iteration moves one value and 1ms of simulated time
    let mut reports = Vec::new();
    for i in 0..100u32 {
        assert!(ring.push(i));
        assert_eq!(ring.pop(), Some(i));
        clock.advance(Duration::from_millis(1));
        if ticker.tick() {
            reports.push(i);
        }
    }

    assert_eq!(reports.len(), 10);
    assert_eq!(reports[0], 9);
    assert!(reports.windows(2).all(|w| w[1] - w[0] == 10));
}

#[test]
fn test_batch_ticker_in_loop_fires_late_by_at_most_every() {
    let clock = ManualClock::new();
    let ticker = BatchTicker::with_clock(Duration::from_millis(5), 8, &clock).unwrap();

    let mut first_fire = None;
    for i in 0..64u64 {
        clock.advance(Duration::from_millis(1));
        if ticker.tick() {
            first_fire = Some(i);
            break;
        }
    }

    // Interval elapses at i = 4; the clock is next consulted on call 8
    assert_eq!(first_fire, Some(7));
}

#[test]
fn test_monotonic_ticker_fires_in_real_time() {
    let ticker = AtomicTicker::new(Duration::from_millis(5));
    let deadline = Instant::now() + Duration::from_secs(5);

    let mut fired = false;
    while !fired && Instant::now() < deadline {
        fired = ticker.tick();
        thread::sleep(Duration::from_millis(1));
    }
    assert!(fired, "ticker never fired within 5s");
}

#[test]
fn test_shared_ticker_fires_once_per_interval_across_threads() {
    let clock = Arc::new(ManualClock::new());
    let ticker = Arc::new(
        AtomicTicker::with_clock(Duration::from_millis(1), Arc::clone(&clock)).unwrap(),
    );

    let mut total = 0;
    for _ in 0..5 {
        clock.advance(Duration::from_millis(1));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ticker = Arc::clone(&ticker);
                thread::spawn(move || (0..50).filter(|_| ticker.tick()).count())
            })
            .collect();
        total += handles.into_iter().map(|h| h.join().unwrap()).sum::<usize>();
    }

    assert_eq!(total, 5);
}

#[test]
fn test_constructor_errors_convert_to_boxed_error() {
    fn build(interval: Duration) -> Result<AtomicTicker<MonotonicClock>, Box<dyn std::error::Error>> {
        Ok(AtomicTicker::try_new(interval)?)
    }

    let err = build(Duration::ZERO).unwrap_err();
    assert_eq!(err.to_string(), HotLoopError::ZeroInterval.to_string());
    assert!(build(Duration::from_millis(1)).is_ok());
}

#[test]
fn test_canceler_generic_over_trait() {
    fn drain_until_cancelled(ring: &RingBuffer<u8>, cancel: &impl Canceler) -> usize {
        let mut n = 0;
        while !cancel.is_cancelled() {
            match ring.pop() {
                Some(_) => n += 1,
                None => cancel.cancel(),
            }
        }
        n
    }

    let ring = RingBuffer::new(8);
    for i in 0..5 {
        assert!(ring.push(i));
    }
    let cancel = AtomicCanceler::new();
    assert_eq!(drain_until_cancelled(&ring, &cancel), 5);
    assert!(cancel.is_cancelled());
}

// =============================================================================
// Std baselines
// =============================================================================

#[test]
fn test_channel_canceler_stops_channel_pair() {
    let (tx, rx) = ChannelQueue::<u64>::new(64).into_split();
    let cancel = Arc::new(ChannelCanceler::new());

    let producer = {
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || {
            let backoff = Backoff::new();
            let mut sent = 0u64;
            while !cancel.is_cancelled() {
                match tx.try_send(sent) {
                    Ok(()) => {
                        sent += 1;
                        backoff.reset();
                    }
                    Err(TrySendError::Full(_)) => backoff.snooze(),
                    Err(TrySendError::Disconnected(_)) => panic!("receiver dropped early"),
                }
            }
            sent
        })
    };

    let mut received = 0u64;
    let deadline = Instant::now() + Duration::from_millis(20);
    while Instant::now() < deadline {
        if let Ok(v) = rx.try_recv() {
            assert_eq!(v, received);
            received += 1;
        }
    }
    cancel.cancel();

    let sent = producer.join().unwrap();
    while let Ok(v) = rx.try_recv() {
        assert_eq!(v, received);
        received += 1;
    }
    assert_eq!(received, sent);
    assert!(sent > 0, "producer made no progress in 20ms");
}

#[test]
fn test_baseline_and_optimized_loops_move_same_values() {
    fn run(q: &impl Queue<u32>, cancel: &dyn Canceler, ticker: &dyn Ticker) -> (Vec<u32>, u32) {
        let mut out = Vec::new();
        let mut reports = 0;
        let mut next = 0u32;
        while !cancel.is_cancelled() {
            if ticker.tick() {
                reports += 1;
            }
            if next < 100 && q.push(next) {
                next += 1;
            }
            match q.pop() {
                Some(v) => out.push(v),
                None if next == 100 => cancel.cancel(),
                None => {}
            }
        }
        (out, reports)
    }

    // Intervals long enough that neither ticker fires during the run
    let interval = Duration::from_secs(3600);
    let (ring_out, ring_reports) = run(
        &RingBuffer::<u32>::new(4),
        &AtomicCanceler::new(),
        &AtomicTicker::new(interval),
    );
    let (chan_out, chan_reports) = run(
        &ChannelQueue::<u32>::new(4),
        &ChannelCanceler::new(),
        &StdTicker::new(interval),
    );

    assert_eq!(ring_out, (0..100).collect::<Vec<_>>());
    assert_eq!(chan_out, ring_out);
    assert_eq!((ring_reports, chan_reports), (0, 0));
}

#[test]
fn test_std_ticker_paces_reports_like_atomic() {
    fn count_ticks(ticker: &dyn Ticker, run_for: Duration) -> u32 {
        let start = Instant::now();
        let mut ticks = 0;
        while start.elapsed() < run_for {
            if ticker.tick() {
                ticks += 1;
            }
            thread::sleep(Duration::from_millis(1));
        }
        ticks
    }

    let interval = Duration::from_millis(20);
    let run_for = Duration::from_millis(200);
    let std_ticks = count_ticks(&StdTicker::new(interval), run_for);
    let atomic_ticks = count_ticks(&AtomicTicker::new(interval), run_for);

    // ~10 each; wide bounds for loaded CI machines
    for ticks in [std_ticks, atomic_ticks] {
        assert!((2..=11).contains(&ticks), "got {} ticks in {:?}", ticks, run_for);
    }
}
