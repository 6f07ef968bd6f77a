//! # Coordinator — Worker Fan-Out and Supervision
//!
//! Loads the shared tables, spawns one feeder plus N workers over the
//! prime pipe, and supervises. The tables are loaded once and shared
//! read-only; each worker owns its scratch (cube-root arena, progression
//! buffers, square filters), acquired at start and released on every exit
//! path by scope.
//!
//! Failure policy mirrors the process model it replaces: a worker panic
//! (an invariant failure) flips the shared abort flag, every other worker
//! drains its pipe without doing work, and the run exits non-zero with a
//! trailer naming the first worker that died. No recovery happens inside
//! the enumeration paths.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::checkpoint;
use crate::params::RunParams;
use crate::pipe::{self, PrimePipe};
use crate::report::{CheckpointCfg, Counts, Hit, Phase, Report};
use crate::tables::{inverse_table, Tables, CUBEROOT_BUFSIZE};
use crate::worker::{process_primes, process_subprimes};
use crate::zcheck::Workspace;

pub struct Summary {
    pub counts: Counts,
    pub hits: Vec<Hit>,
    pub d_log: Option<Vec<u64>>,
}

/// Run a full search.
pub fn run(params: &RunParams) -> Result<Summary> {
    // subprime precompute covers the fixed outer prime's range
    let (tp_min, tp_max) = if params.p0 > 1 {
        (params.p0, params.p0)
    } else {
        (params.pmin, params.pmax)
    };
    let tables = Arc::new(Tables::load(
        params.k,
        params.dmax,
        params.zmax,
        tp_min,
        tp_max,
    ));

    let resume = match &params.checkpoint {
        Some(path) => match checkpoint::load(path) {
            Some(c) => {
                c.validate(
                    params.pmin,
                    params.pmax,
                    params.dmax,
                    params.zmax,
                    params.opts,
                )?;
                info!(last_prime = c.last_prime, "resuming from checkpoint");
                Some(c)
            }
            None => None,
        },
        None => None,
    };
    let ckpt_cfg = params.checkpoint.as_ref().map(|path| CheckpointCfg {
        path: path.clone(),
        pmin: params.pmin,
        pmax: params.pmax,
        dmax: params.dmax,
        zmax: params.zmax,
    });

    let report = if params.capture_d {
        Arc::new(Report::with_d_capture(params.opts, params.cores))
    } else {
        Arc::new(Report::new(
            params.opts,
            params.cores,
            ckpt_cfg,
            resume.as_ref(),
        ))
    };

    if !report.report_phase(Phase::Precompute) {
        let counts = report.finalize();
        return Ok(Summary {
            counts,
            hits: Vec::new(),
            d_log: None,
        });
    }

    let itabp0 = if params.p0 > 1 {
        inverse_table(params.p0 as u32)
    } else {
        Vec::new()
    };
    let start = resume
        .as_ref()
        .map(|c| c.last_prime + 1)
        .unwrap_or(params.pmin)
        .max(params.pmin);

    let (tx, rx) = pipe::create();
    let first_failure = AtomicUsize::new(usize::MAX);

    std::thread::scope(|s| {
        let feeder = {
            let rep = Arc::clone(&report);
            let pmax = params.pmax;
            s.spawn(move || pipe::feed(tx, start, pmax, &rep))
        };
        let workers: Vec<_> = (0..params.cores)
            .map(|wid| {
                let rx = rx.clone();
                let rep = Arc::clone(&report);
                let tab = Arc::clone(&tables);
                let itabp0 = &itabp0;
                let ff = &first_failure;
                let params = params.clone();
                s.spawn(move || {
                    let result = catch_unwind(AssertUnwindSafe(|| {
                        let mut ws = Workspace::new();
                        let mut rbuf = vec![0u64; CUBEROOT_BUFSIZE];
                        let pipe = PrimePipe::new(rx);
                        if params.p0 > 1 {
                            process_subprimes(
                                &tab,
                                &rep,
                                &pipe,
                                &mut ws,
                                &mut rbuf,
                                wid,
                                params.p0,
                                itabp0,
                                params.pmax,
                            );
                        } else {
                            process_primes(
                                &tab,
                                &rep,
                                &pipe,
                                &mut ws,
                                &mut rbuf,
                                wid,
                                start,
                                params.pmax,
                            );
                        }
                        rep.worker_done(wid, &mut ws.pending);
                    }));
                    if result.is_err() {
                        let _ = ff.compare_exchange(
                            usize::MAX,
                            wid,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                        rep.set_abort();
                        error!(worker = wid, "worker aborted on an invariant failure");
                    }
                })
            })
            .collect();
        // every worker holds its own receiver clone; dropping this one
        // lets the feeder see disconnection when workers finish early
        drop(rx);
        for w in workers {
            let _ = w.join();
        }
        let _ = feeder.join();
    });

    let failed = first_failure.load(Ordering::SeqCst);
    if failed != usize::MAX {
        bail!("worker {} terminated abnormally; run aborted", failed);
    }

    let counts = report.finalize();
    info!(
        pcnt = counts.pcnt,
        ccnt = counts.ccnt,
        dcnt = counts.dcnt,
        rcnt = counts.rcnt,
        "search complete"
    );

    // cross-check predicted totals from the command line
    let mut mismatch = false;
    for (name, want, got) in [
        ("pcnt", params.expect.pcnt, counts.pcnt),
        ("ccnt", params.expect.ccnt, counts.ccnt),
        ("dcnt", params.expect.dcnt, counts.dcnt),
        ("rcnt", params.expect.rcnt, counts.rcnt),
    ] {
        if let Some(want) = want {
            if want != got {
                error!(counter = name, expected = want, actual = got, "counter mismatch");
                mismatch = true;
            }
        }
    }
    if mismatch {
        bail!("final counters do not match the expected values");
    }

    let d_log = params.capture_d.then(|| report.take_d_log());
    Ok(Summary {
        counts,
        hits: report.take_hits(),
        d_log,
    })
}
