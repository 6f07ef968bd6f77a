//! # Report — Counters, Vetoes, and the Checkpoint Frontier
//!
//! Shared sink for everything the workers emit. Four aggregate counters
//! drive the per-run accounting: `pcnt` (primes with cube roots), `ccnt`
//! (total cube roots), `dcnt` (divisors processed), `rcnt` (progression
//! counts). Workers accumulate deltas lock-free in their own `Counts`
//! (inside the per-worker workspace) and the shared state is touched once
//! per prime, in `report_p`.
//!
//! Checkpoint semantics: a prime's deltas fold into the committed totals
//! only once every prime below it is finished (the pipe hands primes out
//! in increasing order, so anything below the smallest in-flight prime is
//! complete). The checkpoint file therefore always describes an exact
//! prefix of the run, which is what makes resume idempotent.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use rug::Integer;
use tracing::{info, warn};

use crate::checkpoint::{self, Checkpoint};

/// Aggregate counter block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub pcnt: u64,
    pub ccnt: u64,
    pub dcnt: u64,
    pub rcnt: u64,
}

impl Counts {
    fn add(&mut self, other: &Counts) {
        self.pcnt += other.pcnt;
        self.ccnt += other.ccnt;
        self.dcnt += other.dcnt;
        self.rcnt += other.rcnt;
    }
}

/// A reported candidate solution.
#[derive(Clone, Debug)]
pub struct Hit {
    pub x: String,
    pub y: String,
    pub z: String,
    pub d: u64,
    pub w: u128,
}

/// The run stages, in order. Prime and BigPrime share a gate level: both
/// are the "d must be prime" tail and option 6 runs them together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Precompute,
    Cached,
    Uncached,
    Cocached,
    NearPrime,
    Prime,
    BigPrime,
}

impl Phase {
    pub fn name(self) -> &'static str {
        match self {
            Phase::Precompute => "precompute",
            Phase::Cached => "cached",
            Phase::Uncached => "uncached",
            Phase::Cocached => "cocached",
            Phase::NearPrime => "nearprime",
            Phase::Prime => "prime",
            Phase::BigPrime => "bigprime",
        }
    }

    /// Option level required to run the phase after this one.
    fn next_gate(self) -> u32 {
        match self {
            Phase::Precompute => 2,
            Phase::Cached => 3,
            Phase::Uncached => 4,
            Phase::Cocached => 5,
            Phase::NearPrime => 6,
            Phase::Prime => 6,
            Phase::BigPrime => 7,
        }
    }
}

/// Checkpoint identity for this run; the five fields a resume must match.
#[derive(Clone, Debug)]
pub struct CheckpointCfg {
    pub path: PathBuf,
    pub pmin: u64,
    pub pmax: u64,
    pub dmax: u64,
    pub zmax: u128,
}

const SAVE_INTERVAL_SECS: u64 = 60;

struct Inner {
    /// In-flight prime per worker; u64::MAX when idle or done.
    current: Vec<u64>,
    /// Finished primes whose deltas are not yet folded.
    done: BTreeMap<u64, Counts>,
    committed: Counts,
    last_prime: u64,
    last_save: Instant,
}

pub struct Report {
    opts: u32,
    abort: AtomicBool,
    resume_after: u64,
    ckpt: Option<CheckpointCfg>,
    inner: Mutex<Inner>,
    hits: Mutex<Vec<Hit>>,
    /// Verification aid: every d passed to report_d, when enabled.
    d_log: Option<Mutex<Vec<u64>>>,
}

impl Report {
    pub fn new(
        opts: u32,
        cores: usize,
        ckpt: Option<CheckpointCfg>,
        resume: Option<&Checkpoint>,
    ) -> Report {
        let (committed, last_prime) = match resume {
            Some(c) => (
                Counts {
                    pcnt: c.pcnt,
                    ccnt: c.ccnt,
                    dcnt: c.dcnt,
                    rcnt: c.rcnt,
                },
                c.last_prime,
            ),
            None => (Counts::default(), 0),
        };
        Report {
            opts,
            abort: AtomicBool::new(false),
            resume_after: last_prime,
            ckpt,
            inner: Mutex::new(Inner {
                current: vec![u64::MAX; cores],
                done: BTreeMap::new(),
                committed,
                last_prime,
                last_save: Instant::now(),
            }),
            hits: Mutex::new(Vec::new()),
            d_log: None,
        }
    }

    /// A report that additionally records every divisor processed, for
    /// verification runs and tests.
    pub fn with_d_capture(opts: u32, cores: usize) -> Report {
        let mut rep = Report::new(opts, cores, None, None);
        rep.d_log = Some(Mutex::new(Vec::new()));
        rep
    }

    pub fn take_d_log(&self) -> Vec<u64> {
        self.d_log
            .as_ref()
            .map(|m| std::mem::take(&mut *m.lock().unwrap()))
            .unwrap_or_default()
    }

    pub fn set_abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// A worker starts prime p: commit the previous prime's deltas, track
    /// the new in-flight prime, and maybe fold/save. Returns false to veto
    /// (abort requested, or p already covered by the resumed prefix).
    pub fn report_p(&self, wid: usize, p: u64, pending: &mut Counts) -> bool {
        tracing::debug!(worker = wid, p, "starting prime");
        let mut inner = self.inner.lock().unwrap();
        let prev = inner.current[wid];
        if prev != u64::MAX {
            let delta = std::mem::take(pending);
            inner.done.insert(prev, delta);
        }
        inner.current[wid] = p;
        self.fold(&mut inner);
        drop(inner);
        *pending = Counts::default();
        !self.aborted() && p > self.resume_after
    }

    /// Cube roots found for the current prime: counts the prime as
    /// processed. Returns false to veto further work on it.
    pub fn report_c(&self, pending: &mut Counts, n: u32) -> bool {
        pending.pcnt = 1;
        pending.ccnt += n as u64;
        !self.aborted()
    }

    /// A divisor d with c progressions is about to be processed.
    pub fn report_d(&self, pending: &mut Counts, d: u64, c: u64) -> bool {
        tracing::trace!(d, c, "processing divisor");
        pending.dcnt += 1;
        pending.rcnt += c;
        if let Some(log) = &self.d_log {
            log.lock().unwrap().push(d);
        }
        !self.aborted()
    }

    /// A candidate (x, y, z) with x³+y³+z³ = k was completed for divisor d.
    pub fn report_hit(&self, x: &Integer, y: &Integer, z: &Integer, d: u64, w: u128) {
        info!(%x, %y, %z, d, "candidate hit");
        self.hits.lock().unwrap().push(Hit {
            x: x.to_string(),
            y: y.to_string(),
            z: z.to_string(),
            d,
            w,
        });
    }

    /// A phase finished; returns whether the next one may run under the
    /// phase-restriction option (0 = unrestricted).
    pub fn report_phase(&self, ph: Phase) -> bool {
        info!(phase = ph.name(), "phase complete");
        self.opts == 0 || ph.next_gate() <= self.opts
    }

    /// A worker is done: commit its last prime and mark it idle.
    pub fn worker_done(&self, wid: usize, pending: &mut Counts) {
        let mut inner = self.inner.lock().unwrap();
        let prev = inner.current[wid];
        if prev != u64::MAX {
            let delta = std::mem::take(pending);
            inner.done.insert(prev, delta);
            inner.current[wid] = u64::MAX;
        }
        self.fold(&mut inner);
    }

    /// Fold everything, save the final checkpoint, return the totals.
    pub fn finalize(&self) -> Counts {
        let mut inner = self.inner.lock().unwrap();
        inner.current.iter_mut().for_each(|c| *c = u64::MAX);
        self.fold(&mut inner);
        if self.ckpt.is_some() {
            self.save(&mut inner, true);
        }
        inner.committed
    }

    pub fn take_hits(&self) -> Vec<Hit> {
        std::mem::take(&mut *self.hits.lock().unwrap())
    }

    /// Fold finished primes below the smallest in-flight prime into the
    /// committed prefix; save on the checkpoint cadence.
    fn fold(&self, inner: &mut Inner) {
        let safe = inner.current.iter().copied().min().unwrap_or(u64::MAX);
        while let Some((&p, _)) = inner.done.first_key_value() {
            if p >= safe {
                break;
            }
            let delta = inner.done.remove(&p).unwrap();
            inner.committed.add(&delta);
            inner.last_prime = p;
        }
        if self.ckpt.is_some()
            && inner.last_save.elapsed().as_secs() >= SAVE_INTERVAL_SECS
        {
            self.save(inner, false);
        }
    }

    fn save(&self, inner: &mut Inner, force: bool) {
        let cfg = self.ckpt.as_ref().unwrap();
        if !force && inner.last_prime == 0 {
            return;
        }
        let c = Checkpoint {
            pmin: cfg.pmin,
            pmax: cfg.pmax,
            dmax: cfg.dmax,
            zmax: cfg.zmax,
            phase: self.opts,
            last_prime: inner.last_prime,
            pcnt: inner.committed.pcnt,
            ccnt: inner.committed.ccnt,
            dcnt: inner.committed.dcnt,
            rcnt: inner.committed.rcnt,
        };
        if let Err(e) = checkpoint::save(&cfg.path, &c) {
            warn!(error = %e, "checkpoint save failed");
        }
        inner.last_save = Instant::now();
    }
}
