//! # Worker — The Per-Worker Prime Driver
//!
//! Each worker consumes primes from the shared pipe and processes every
//! admissible d whose largest (coprime-to-k) prime factor is that prime.
//! The driver is a state machine over six phases gated by the thresholds
//! from the precompute; the pipe's end-of-stream sentinel (all ones)
//! exceeds every threshold, so each phase loop terminates even when the
//! pipe runs dry mid-phase:
//!
//! 1. **Cached** (p ≤ cpmax): cube roots come from the table; powers of p
//!    are walked and smaller primes tacked on with `enum_d`.
//! 2. **Uncached** (p < cdmin): roots computed on the fly, then `enum_d`.
//! 3. **Cocached** (p < sdmin): roots on the fly, cofactors all cached —
//!    `enum_cd` directly.
//! 4. **Nearprime** (p < pdmin): cofactors have full inverse tables; walk
//!    the small-cofactor table in decreasing order.
//! 5. **Prime** (p < bpmin): d = p, nothing else fits.
//! 6. **Bigprime** (p ≥ bpmin): d = p and the progression length l is
//!    small; l is cached across primes while it stays valid, with a
//!    parallel (mi7, m7, l7) track when k ≡ ±2 (mod 7).
//!
//! The subprime variant fixes the largest prime to p0 and drives the
//! cached phase over the second-largest prime from the pipe.

use tracing::info;

use crate::cuberoots::cuberoots_modp;
use crate::dispatch::{procd_bigprime, procd_coprime, prockd};
use crate::enumerate::{enum_cd, enum_d, tab_roots};
use crate::modarith::{b32_crt64, b32_inv, b32_red};
use crate::pipe::PrimePipe;
use crate::report::{Phase, Report};
use crate::tables::Tables;
use crate::zcheck::Workspace;

/// Main loop for one worker: all six phases over the pipe's primes.
#[allow(clippy::too_many_arguments)]
pub fn process_primes(
    tab: &Tables,
    rep: &Report,
    pipe: &PrimePipe,
    ws: &mut Workspace,
    rbuf: &mut [u64],
    wid: usize,
    start: u64,
    pmax: u64,
) {
    let mut z = [0u64; 3];
    let mut zz = [0u64; 3];
    let mut p = pipe.next();
    if p > pmax {
        return;
    }

    // Phase 1: cached primes. Cofactor prime powers always have cached
    // cube roots here.
    if p <= tab.cpmax {
        let mut pi = tab.pimaxp(start, 1).max(1);
        while p <= tab.cpmax && p <= pmax {
            if !rep.report_p(wid, p, &mut ws.pending) {
                p = pipe.next();
                continue;
            }
            while pi < tab.cptab.len() && tab.cptab[pi].p < p {
                pi += 1;
            }
            if pi >= tab.cptab.len() || tab.cptab[pi].p > p {
                // no cube roots of k mod p
                p = pipe.next();
                continue;
            }
            let mut e = 1u32;
            let mut q = p;
            while q as u128 * p as u128 <= tab.dmax as u128 {
                q *= p;
                e += 1;
            }
            let n = tab_roots(tab, pi, e, &mut z);
            assert!(n > 0);
            if !rep.report_c(&mut ws.pending, n as u32) {
                p = pipe.next();
                continue;
            }
            let mut pp = p;
            while pp < q {
                for i in 0..n {
                    zz[i] = z[i] % pp;
                }
                prockd(tab, rep, ws, pp, &zz[..n]);
                enum_d(tab, rep, ws, pp, p, &zz[..n], rbuf);
                pp *= p;
            }
            prockd(tab, rep, ws, q, &z[..n]);
            enum_d(tab, rep, ws, q, p, &z[..n], rbuf);
            p = pipe.next();
        }
    }
    if !rep.report_phase(Phase::Cached) || p > pmax {
        return;
    }

    // From here on every d is a prime p > √dmax times a smooth cofactor.
    debug_assert!(p as u128 * p as u128 > tab.dmax as u128);

    // Phase 2: uncached primes; recursive enumeration over cofactors.
    while p < tab.cdmin && p <= pmax {
        if rep.report_p(wid, p, &mut ws.pending) {
            let n = cuberoots_modp(tab.k, p, &mut z);
            if n > 0 && rep.report_c(&mut ws.pending, n as u32) {
                prockd(tab, rep, ws, p, &z[..n]);
                enum_d(tab, rep, ws, p, p, &z[..n], rbuf);
            }
        }
        p = pipe.next();
    }
    if !rep.report_phase(Phase::Uncached) || p > pmax {
        return;
    }

    // Phase 3: cofactors all have cached cube roots; walk the chain.
    while p < tab.sdmin && p <= pmax {
        if rep.report_p(wid, p, &mut ws.pending) {
            let n = cuberoots_modp(tab.k, p, &mut z);
            if n > 0 && rep.report_c(&mut ws.pending, n as u32) {
                prockd(tab, rep, ws, p, &z[..n]);
                enum_cd(tab, rep, ws, p, p, &z[..n], rbuf);
            }
        }
        p = pipe.next();
    }
    if !rep.report_phase(Phase::Cocached) || p > pmax {
        return;
    }

    // Phase 4: cofactors have cached inverses too; direct CRT walk of the
    // small-cofactor table in decreasing order.
    let mut pimax = tab.sdtab.len() - 1;
    while p < tab.pdmin && p <= pmax {
        if rep.report_p(wid, p, &mut ws.pending) {
            let n = cuberoots_modp(tab.k, p, &mut z);
            if n > 0 && rep.report_c(&mut ws.pending, n as u32) {
                prockd(tab, rep, ws, p, &z[..n]);
                while pimax > 0 && p as u128 * tab.sdtab[pimax].d as u128 > tab.dmax as u128 {
                    pimax -= 1;
                }
                for xi in (1..=pimax).rev() {
                    let x = &tab.sdtab[xi];
                    let pinvb = tab.sdinvs[x.i as usize + b32_red(p, x.d, x.dinv) as usize];
                    let cnt = n * x.n as usize;
                    let mut s = 0;
                    for &zv in &z[..n] {
                        for j in 0..x.n as usize {
                            rbuf[s] = b32_crt64(
                                zv,
                                p,
                                tab.sdroots[x.r as usize + j],
                                x.d,
                                pinvb,
                                x.dinv,
                            );
                            s += 1;
                        }
                    }
                    prockd(tab, rep, ws, p * x.d as u64, &rbuf[..cnt]);
                }
            }
        }
        p = pipe.next();
    }
    if !rep.report_phase(Phase::NearPrime) || p > pmax {
        return;
    }

    // Phase 5: d = p, no cofactor fits.
    while p < tab.bpmin && p <= pmax {
        if rep.report_p(wid, p, &mut ws.pending) {
            let n = cuberoots_modp(tab.k, p, &mut z);
            if n > 0 && rep.report_c(&mut ws.pending, n as u32) {
                procd_coprime(tab, rep, ws, p, &z[..n]);
            }
        }
        p = pipe.next();
    }
    if !rep.report_phase(Phase::Prime) || p > pmax {
        return;
    }

    // Phase 6: d = p and the progression length is small enough that
    // splitting never pays; cache l across primes while it stays valid.
    let mi = (tab.k & 1) as usize;
    let m = tab.km[mi] as u128;
    let mut l = tab.ap_bound(p as u128 * m);
    let mut lpmax = bigprime_lpmax(tab, m, l, pmax);

    if !tab.has7 {
        while p <= pmax {
            if rep.report_p(wid, p, &mut ws.pending) {
                let n = cuberoots_modp(tab.k, p, &mut z);
                if n > 0 && rep.report_c(&mut ws.pending, n as u32) {
                    let si = tab.sgnz_index(p);
                    if p > lpmax {
                        l = tab.ap_bound(p as u128 * m);
                        lpmax = bigprime_lpmax(tab, m, l, pmax);
                    }
                    procd_bigprime(tab, rep, ws, p, &z[..n], si, mi, l);
                }
            }
            p = pipe.next();
        }
    } else {
        let mi7 = mi + 2;
        let m7 = tab.km[mi7] as u128;
        let mut l7 = tab.ap_bound(p as u128 * m7);
        let mut lpmax7 = bigprime_lpmax(tab, m7, l7, pmax);
        while p <= pmax {
            if rep.report_p(wid, p, &mut ws.pending) {
                let n = cuberoots_modp(tab.k, p, &mut z);
                if n > 0 && rep.report_c(&mut ws.pending, n as u32) {
                    let si = tab.sgnz_index(p);
                    if tab.onezmod7(p, si) {
                        if p > lpmax7 {
                            l7 = tab.ap_bound(p as u128 * m7);
                            lpmax7 = bigprime_lpmax(tab, m7, l7, pmax);
                        }
                        procd_bigprime(tab, rep, ws, p, &z[..n], si, mi7, l7);
                    } else {
                        if p > lpmax {
                            l = tab.ap_bound(p as u128 * m);
                            lpmax = bigprime_lpmax(tab, m, l, pmax);
                        }
                        procd_bigprime(tab, rep, ws, p, &z[..n], si, mi, l);
                    }
                }
            }
            p = pipe.next();
        }
    }
    rep.report_phase(Phase::BigPrime);
}

/// Largest prime for which a cached progression length l stays an upper
/// bound: beyond it, ⌈zmax/(p·m)⌉ drops below l.
fn bigprime_lpmax(tab: &Tables, m: u128, l: u128, pmax: u64) -> u64 {
    if l > 1 && (l - 1) * m * pmax as u128 > tab.zmax {
        u64::try_from(tab.zmax_fudged / (m * (l - 1)) + 1).unwrap_or(pmax)
    } else {
        pmax
    }
}

/// Subprime mode: the largest prime of every d is fixed to p0; the pipe
/// supplies the second-largest prime. All primes involved are cached.
#[allow(clippy::too_many_arguments)]
pub fn process_subprimes(
    tab: &Tables,
    rep: &Report,
    pipe: &PrimePipe,
    ws: &mut Workspace,
    rbuf: &mut [u64],
    wid: usize,
    p0: u64,
    itabp0: &[u32],
    pmax: u64,
) {
    assert!(pmax <= p0 && p0 <= tab.cpmax);

    let pi0 = tab.pimaxp(p0, 1);
    if pi0 == 0 || tab.cptab[pi0].p != p0 {
        info!(p0, "nothing to do: p0 is not prime or k has no cube roots mod p0");
        return;
    }

    let dmax0 = tab.dmax / p0;
    let p0inv = b32_inv(p0 as u32);
    let mut z = [0u64; 3];
    let mut zz = [0u64; 3];
    let n0 = tab.cached_roots_modq(pi0, 1, &mut z);
    assert!(n0 > 0);
    let mut z0 = [0u32; 3];
    for i in 0..n0 {
        z0[i] = z[i] as u32;
    }

    let mut p = pipe.next();
    let mut pi = tab.pimaxp(p.min(p0), p0).max(1);
    let pmax = if pmax == p0 { pmax - 1 } else { pmax };

    while p <= pmax && p < p0 {
        // reported for checkpointing only; pcnt counts p0 alone here
        if !rep.report_p(wid, p, &mut ws.pending) {
            p = pipe.next();
            continue;
        }
        while pi < tab.cptab.len() && tab.cptab[pi].p < p {
            pi += 1;
        }
        if pi >= tab.cptab.len() || tab.cptab[pi].p > p {
            p = pipe.next();
            continue;
        }
        let mut e = 1u32;
        let mut q = p;
        while q as u128 * p as u128 <= dmax0 as u128 {
            q *= p;
            e += 1;
        }
        let n = tab_roots(tab, pi, e, &mut z);
        assert!(n > 0);
        let m = n * n0;
        let mut pp = p;
        loop {
            for i in 0..n {
                zz[i] = z[i] % pp;
            }
            let qinvp0 = itabp0[b32_red(pp, p0 as u32, p0inv) as usize];
            let mut s = 0;
            for i in 0..n {
                for j in 0..n0 {
                    rbuf[s] = b32_crt64(zz[i], pp, z0[j], p0 as u32, qinvp0, p0inv);
                    s += 1;
                }
            }
            let (cur, rest) = rbuf.split_at_mut(m);
            prockd(tab, rep, ws, pp * p0, cur);
            enum_d(tab, rep, ws, pp * p0, p, cur, rest);
            if pp == q {
                break;
            }
            pp *= p;
        }
        p = pipe.next();
    }

    // when p0 itself pops out of the pipe, handle d = p0 and d divisible
    // by p0^2 as the terminating step
    if p == p0 {
        if !rep.report_p(wid, p0, &mut ws.pending) {
            return;
        }
        let mut e = 1u32;
        let mut q = p0;
        while q as u128 * p0 as u128 <= tab.dmax as u128 {
            q *= p0;
            e += 1;
        }
        let n = tab_roots(tab, pi0, e, &mut z);
        assert!(n > 0);
        if !rep.report_c(&mut ws.pending, n as u32) {
            return;
        }
        let mut pp = p0;
        loop {
            for i in 0..n {
                zz[i] = z[i] % pp;
            }
            prockd(tab, rep, ws, pp, &zz[..n]);
            // d = p0 times smaller primes was handled by the main loop
            if pp > p0 {
                enum_d(tab, rep, ws, pp, p0, &zz[..n], rbuf);
            }
            if pp == q {
                break;
            }
            pp *= p0;
        }
    }
}
