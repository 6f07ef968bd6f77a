//! # Pipe — The Shared Prime Stream
//!
//! A bounded single-producer / N-consumer queue of 64-bit primes in
//! strictly increasing order. The feeder is the only caller of the sieve;
//! workers block on an empty pipe, the feeder blocks on a full one, and
//! end-of-stream is the all-ones sentinel (surfaced by `PrimePipe::next`
//! once the feeder hangs up).

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};

use crate::report::Report;
use crate::sieve::primes_in_range;

/// Bounded pipe capacity.
pub const PIPE_CAPACITY: usize = 1024;
/// End-of-stream sentinel: all ones.
pub const END_OF_PIPE: u64 = u64::MAX;
/// Feeder sieve segment.
const SEGMENT: u64 = 1 << 20;

/// Worker-side handle.
pub struct PrimePipe {
    rx: Receiver<u64>,
}

impl PrimePipe {
    pub fn new(rx: Receiver<u64>) -> PrimePipe {
        PrimePipe { rx }
    }

    /// Next prime, or the all-ones sentinel once the stream ends.
    pub fn next(&self) -> u64 {
        self.rx.recv().unwrap_or(END_OF_PIPE)
    }
}

/// Create the pipe endpoints.
pub fn create() -> (Sender<u64>, Receiver<u64>) {
    bounded(PIPE_CAPACITY)
}

/// Feed every prime in [start, pmax] into the pipe in segments, bailing
/// out when the run aborts or every consumer is gone. Dropping the
/// sender is what delivers the sentinel.
pub fn feed(tx: Sender<u64>, start: u64, pmax: u64, rep: &Report) {
    let mut lo = start.max(2);
    while lo <= pmax {
        let hi = pmax.min(lo.saturating_add(SEGMENT - 1));
        for p in primes_in_range(lo, hi) {
            let mut item = p;
            loop {
                match tx.send_timeout(item, Duration::from_millis(100)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(v)) => {
                        if rep.aborted() {
                            return;
                        }
                        item = v;
                    }
                    Err(SendTimeoutError::Disconnected(_)) => return,
                }
            }
        }
        if hi == u64::MAX {
            return;
        }
        lo = hi + 1;
    }
}

/// Unconditional feeder for tests and single-shot drives.
pub fn feed_all(tx: Sender<u64>, start: u64, pmax: u64) {
    let mut lo = start.max(2);
    while lo <= pmax {
        let hi = pmax.min(lo.saturating_add(SEGMENT - 1));
        for p in primes_in_range(lo, hi) {
            if tx.send(p).is_err() {
                return;
            }
        }
        if hi == u64::MAX {
            return;
        }
        lo = hi + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Primes arrive in strictly increasing order and the sentinel
    /// follows the last one.
    #[test]
    fn pipe_delivers_ordered_primes_then_sentinel() {
        let (tx, rx) = create();
        let h = std::thread::spawn(move || feed_all(tx, 2, 100));
        let pipe = PrimePipe::new(rx);
        let mut last = 0u64;
        let mut count = 0;
        loop {
            let p = pipe.next();
            if p == END_OF_PIPE {
                break;
            }
            assert!(p > last);
            last = p;
            count += 1;
        }
        assert_eq!(count, 25); // pi(100)
        assert_eq!(last, 97);
        h.join().unwrap();
        // the sentinel repeats forever after the end
        assert_eq!(pipe.next(), END_OF_PIPE);
    }

    /// Multiple consumers partition the stream without loss or overlap.
    #[test]
    fn pipe_partitions_across_consumers() {
        let (tx, rx) = create();
        let h = std::thread::spawn(move || feed_all(tx, 2, 10_000));
        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let rx = rx.clone();
                std::thread::spawn(move || {
                    let pipe = PrimePipe::new(rx);
                    let mut got = Vec::new();
                    loop {
                        let p = pipe.next();
                        if p == END_OF_PIPE {
                            return got;
                        }
                        got.push(p);
                    }
                })
            })
            .collect();
        h.join().unwrap();
        let mut all: Vec<u64> = consumers
            .into_iter()
            .flat_map(|c| c.join().unwrap())
            .collect();
        all.sort_unstable();
        let want = crate::sieve::generate_primes(10_000);
        assert_eq!(all, want);
    }

    /// A mid-range start produces exactly the tail of the prime list.
    #[test]
    fn feed_honors_start() {
        let (tx, rx) = create();
        std::thread::spawn(move || feed_all(tx, 90, 120));
        let pipe = PrimePipe::new(rx);
        let mut got = Vec::new();
        loop {
            let p = pipe.next();
            if p == END_OF_PIPE {
                break;
            }
            got.push(p);
        }
        assert_eq!(got, vec![97, 101, 103, 107, 109, 113]);
    }
}
