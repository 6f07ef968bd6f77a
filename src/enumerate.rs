//! # Enumerate — Divisor Enumeration over Smooth Cofactors
//!
//! Given a divisor d whose largest prime factor is p (with its cube roots
//! zd), produce every admissible multiple d·d' ≤ dmax whose extra prime
//! factors are all smaller than p, CRT-ing the cube roots along.
//!
//! Two regimes:
//! - [`enum_d`] — d still small: recurse over prime powers q^e with q < p
//!   from the cached-prime table, batching up to IBATCH cofactors for a
//!   single grouped Montgomery inversion before the per-cofactor CRT.
//! - [`enum_cd`] — d ≥ cdmin, so every remaining cofactor is in the
//!   cached-cofactor table: walk its chain in decreasing cofactor order,
//!   taking the fully-tabled inverse for small cofactors and batching the
//!   rest.
//!
//! Buffer discipline: `r` is the per-worker cube-root arena. Each level
//! writes its CRT-lifted roots at the front of its slice and hands the
//! rest to the recursion, so siblings never trample children.

use crate::cuberoots::cuberoots_modq;
use crate::dispatch::prockd;
use crate::modarith::{b32_crt64, fcrt64, b32_red, MontgomeryCtx};
use crate::report::Report;
use crate::tables::{Tables, IBATCH};
use crate::zcheck::Workspace;

/// Cube roots of k mod cptab[pi]^e: cached when e is within the cached
/// range, Hensel-lifted on the fly otherwise.
pub fn tab_roots(tab: &Tables, pi: usize, e: u32, out: &mut [u64; 3]) -> usize {
    if e <= tab.cached_e(pi) {
        tab.cached_roots_modq(pi, e, out)
    } else {
        cuberoots_modq(tab.k, tab.cptab[pi].p, e, out)
    }
}

/// Recursively enumerate admissible multiples of d by tacking on prime
/// powers q^e, q < p, in decreasing prime order. zd holds the cube roots
/// of k mod d; r is the workspace for CRT-lifted roots.
pub fn enum_d(
    tab: &Tables,
    rep: &Report,
    ws: &mut Workspace,
    d: u64,
    p: u64,
    zd: &[u64],
    r: &mut [u64],
) {
    if d >= tab.cdmin {
        enum_cd(tab, rep, ws, d, p, zd, r);
        return;
    }
    let mut pi = tab.pimaxp(p - 1, d);
    if pi == 0 {
        return;
    }
    let ctx = MontgomeryCtx::new(d);

    let mut qq = [0u64; IBATCH];
    let mut qpi = [0usize; IBATCH];
    let mut qe = [0u32; IBATCH];
    let mut ai = [0u64; IBATCH];
    let mut qz = [0u64; 3];

    let mut q = tab.cptab[pi].p;
    let mut e = 1u32;
    let mut m = 0usize;
    loop {
        if pi == 0 || m == IBATCH {
            if m == 0 {
                return;
            }
            ctx.inv_array(&mut ai[..m]);
            for i in 0..m {
                let a = qq[i];
                // a ≤ dmax/d keeps a·a⁻¹ below dmax
                let u = a * ctx.from_mont(ai[i]) - 1;
                let ab = a * d;
                let qn = tab_roots(tab, qpi[i], qe[i], &mut qz);
                let cnt = qn * zd.len();
                let (cur, rest) = r.split_at_mut(cnt);
                let mut s = 0;
                for &za in &qz[..qn] {
                    for &zdv in zd {
                        cur[s] = fcrt64(u, za, zdv, ab);
                        s += 1;
                    }
                }
                prockd(tab, rep, ws, ab, cur);
                let qp = tab.cptab[qpi[i]].p;
                if ab >= tab.cdmin {
                    enum_cd(tab, rep, ws, ab, qp, cur, rest);
                } else {
                    enum_d(tab, rep, ws, ab, qp, cur, rest);
                }
            }
            if pi == 0 {
                return;
            }
            m = 0;
        }
        debug_assert!(d as u128 * q as u128 <= tab.dmax as u128);
        qq[m] = q;
        qpi[m] = pi;
        qe[m] = e;
        ai[m] = ctx.to_mont(q);
        m += 1;
        match q.checked_mul(tab.cptab[pi].p) {
            Some(nq) if d as u128 * nq as u128 <= tab.dmax as u128 => {
                q = nq;
                e += 1;
            }
            _ => {
                pi -= 1;
                if pi > 0 {
                    q = tab.cptab[pi].p;
                    e = 1;
                }
            }
        }
    }
}

/// Enumerate multiples of d ≥ cdmin through the cached-cofactor chain:
/// every admissible d' with largest prime < p and d·d' ≤ dmax.
pub fn enum_cd(
    tab: &Tables,
    rep: &Report,
    ws: &mut Workspace,
    d: u64,
    p: u64,
    zd: &[u64],
    r: &mut [u64],
) {
    debug_assert!(d >= tab.cdmin);
    let mut idx = tab.cdentry(p - 1, d);
    if idx == 0 {
        return;
    }
    // the batch path only fires for cofactors above sdmax, which forces
    // d below sdmin; at or past sdmin every cofactor is fully tabled
    let ctx = if d < tab.sdmin {
        Some(MontgomeryCtx::new(d))
    } else {
        None
    };

    let mut zi = [0usize; IBATCH];
    let mut ai = [0u64; IBATCH];
    let mut m = 0usize;
    loop {
        let at_end = tab.cdtab[idx].d == 0;
        if at_end || m == IBATCH {
            if m > 0 {
                let ctx = ctx.as_ref().expect("batch inversion needs d < sdmin");
                ctx.inv_array(&mut ai[..m]);
                for i in 0..m {
                    let rec = &tab.cdtab[zi[i]];
                    let a = rec.d as u64;
                    let u = a * ctx.from_mont(ai[i]) - 1;
                    let ab = a * d;
                    let cnt = rec.n as usize * zd.len();
                    let mut s = 0;
                    for j in 0..rec.n as usize {
                        let za = tab.cdroots[rec.r as usize + j] as u64;
                        for &zdv in zd {
                            r[s] = fcrt64(u, za, zdv, ab);
                            s += 1;
                        }
                    }
                    prockd(tab, rep, ws, ab, &r[..cnt]);
                }
                m = 0;
            }
            if at_end {
                return;
            }
        }
        let rec = &tab.cdtab[idx];
        debug_assert!((rec.p as u64) < p);
        debug_assert!(rec.d as u128 * d as u128 <= tab.dmax as u128);
        if rec.sdpi != 0 {
            // fully tabled: look the inverse up instead of batching
            let y = &tab.sdtab[rec.sdpi as usize];
            let dinvsd = tab.sdinvs[y.i as usize + b32_red(d, y.d, y.dinv) as usize];
            let cnt = zd.len() * y.n as usize;
            let mut s = 0;
            for &zdv in zd {
                for j in 0..y.n as usize {
                    r[s] = b32_crt64(zdv, d, tab.sdroots[y.r as usize + j], y.d, dinvsd, y.dinv);
                    s += 1;
                }
            }
            prockd(tab, rep, ws, d * y.d as u64, &r[..cnt]);
        } else {
            let ctx = ctx.as_ref().expect("batch inversion needs d < sdmin");
            ai[m] = ctx.to_mont(rec.d as u64);
            zi[m] = idx;
            m += 1;
        }
        loop {
            idx -= 1;
            if (tab.cdtab[idx].p as u64) < p {
                break;
            }
        }
    }
}
