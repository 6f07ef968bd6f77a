//! # Dispatch — Per-Divisor Classification and Checker Hand-Off
//!
//! Every divisor the enumerator produces lands here. The dispatcher
//! computes the auxiliary modulus b = m·b2·b7 from the reciprocity
//! tables, stages the |z| residues (lifting to even representatives and
//! to z ≡ 0 (mod 7) as the structure of d demands), estimates the
//! progression length, and picks the cheapest feasible checker:
//!
//! - n_ap ≤ ZSHORT, or n_ap·ca ≤ ZFEW: progressions are enumerated
//!   directly (`zrcheckone` when a·b already exceeds zmax).
//! - otherwise: `zrchecklift` splits the progressions further with
//!   auxiliary primes before enumerating.
//!
//! `prockd` fans a divisor out over the admissible divisors of k; no CRT
//! is needed for those because the reciprocity tables are keyed by d and
//! the per-divisor root counts are precomputed.

use crate::modarith::{b32_red, crt7, inv7};
use crate::report::Report;
use crate::tables::{lift_even, lift_zero7, Tables, ZFEW, ZSHORT};
use crate::zcheck::{zrcheckafew, zrcheckone, zrchecklift, Workspace};

/// Stage the auxiliary data for d = a·kd via the reciprocity table entry:
/// residues into ws.zb, returning (b, ainvb, binv).
fn stage_rectab_aux(
    tab: &Tables,
    ws: &mut Workspace,
    fi: usize,
    a: u64,
    d: u64,
    si: u32,
) -> (u32, u32, u64) {
    let x = &tab.rectab[fi];
    let m = x.m;
    let b7: u32 = if tab.onezmod7(d, si) { 7 } else { 1 };
    let b2: u32 = 1 + (m as u64 & 1 & d) as u32;

    let dm = b32_red(d, m, x.minv[0]) as usize;
    let cb = x.zcnt[dm] as usize;
    debug_assert!(cb > 0, "no admissible |z| residues for d={} mod {}", d, m);
    ws.zb.clear();
    for j in 0..cb {
        ws.zb.push(x.zs[x.zoff[dm] as usize + j] as u32);
    }

    let mut ainvb = x.itab[b32_red(a, m, x.minv[0]) as usize];
    debug_assert!(ainvb != 0, "a={} not invertible mod {}", a, m);
    if b2 > 1 {
        lift_even(&mut ws.zb, m);
        if ainvb & 1 == 0 {
            ainvb += m;
        }
    }
    let binv = x.minv[2 * (b7 > 1) as usize + (b2 - 1) as usize];
    if b7 > 1 {
        let b2m = b2 * m;
        lift_zero7(&mut ws.zb, b2m);
        ainvb = crt7(ainvb, b2m, inv7(a));
    }
    (m * b2 * b7, ainvb, binv)
}

/// Process d = a·kdtab[ki].d, where a is coprime to k and za holds the
/// cube roots of k mod a.
pub fn procd(tab: &Tables, rep: &Report, ws: &mut Workspace, ki: usize, a: u64, za: &[u64]) {
    let kd = &tab.kdtab[ki];
    let d = a * kd.d;
    let ca = za.len() as u64;
    if !rep.report_d(&mut ws.pending, d, ca * kd.n as u64) {
        return;
    }
    let si = tab.sgnz_index(d);
    let (b, ainvb, binv) = stage_rectab_aux(tab, ws, kd.fi, a, d, si);

    let n_ap = tab.ap_bound(a as u128 * b as u128);
    if n_ap <= ZSHORT || n_ap * ca as u128 <= ZFEW {
        if a as u128 * b as u128 > tab.zmax {
            zrcheckone(tab, rep, ws, d, si, a, za, b, ainvb, binv);
        } else {
            zrcheckafew(tab, rep, ws, d, si, a, za, b, ainvb, binv, n_ap);
        }
    } else {
        zrchecklift(tab, rep, ws, d, si, a, za, b, ainvb);
    }
}

/// Process d coprime to k. The fast-path tables give a single |z| residue
/// mod the full auxiliary modulus, so no lifting is needed.
pub fn procd_coprime(tab: &Tables, rep: &Report, ws: &mut Workspace, d: u64, z: &[u64]) {
    let c = z.len() as u64;
    if !rep.report_d(&mut ws.pending, d, c) {
        return;
    }
    let si = tab.sgnz_index(d);
    let mi = ((tab.k & d & 1) + 2 * tab.onezmod7(d, si) as u64) as usize;
    let km = &tab.kmtab[mi];
    let b = km.b;

    let db = b32_red(d, b, km.binv) as usize;
    debug_assert_eq!(km.zcnt[db], 1, "d={} mod {}", d, b);
    ws.zb.clear();
    for j in 0..km.zcnt[db] as usize {
        ws.zb.push(km.zs[km.zoff[db] as usize + j] as u32);
    }
    let dinvb = km.itab[db];
    debug_assert!(dinvb != 0);

    let l = tab.ap_bound(d as u128 * b as u128);
    if l <= ZSHORT || l * c as u128 <= ZFEW {
        if d as u128 * b as u128 > tab.zmax {
            zrcheckone(tab, rep, ws, d, si, d, z, b, dinvb, km.binv);
        } else {
            zrcheckafew(tab, rep, ws, d, si, d, z, b, dinvb, km.binv, l);
        }
    } else {
        zrchecklift(tab, rep, ws, d, si, d, z, b, dinvb);
    }
}

/// Process a large prime d close to zmax: the progression length l has
/// been computed (and is cached) by the caller, and splitting is never
/// worthwhile.
#[allow(clippy::too_many_arguments)]
pub fn procd_bigprime(
    tab: &Tables,
    rep: &Report,
    ws: &mut Workspace,
    d: u64,
    z: &[u64],
    si: u32,
    mi: usize,
    l: u128,
) {
    debug_assert!(mi < 4 && tab.km[mi] > 0);
    if !rep.report_d(&mut ws.pending, d, z.len() as u64) {
        return;
    }
    let km = &tab.kmtab[mi];
    let b = km.b;
    let db = b32_red(d, b, km.binv) as usize;
    debug_assert_eq!(km.zcnt[db], 1);
    ws.zb.clear();
    for j in 0..km.zcnt[db] as usize {
        ws.zb.push(km.zs[km.zoff[db] as usize + j] as u32);
    }
    let dinvb = km.itab[db];

    if l == 1 {
        zrcheckone(tab, rep, ws, d, si, d, z, b, dinvb, km.binv);
    } else {
        zrcheckafew(tab, rep, ws, d, si, d, z, b, dinvb, km.binv, l);
    }
}

/// Process d and all multiples d·m with m an admissible divisor of k
/// (automatically coprime to d).
pub fn prockd(tab: &Tables, rep: &Report, ws: &mut Workspace, d: u64, zd: &[u64]) {
    procd_coprime(tab, rep, ws, d, zd);
    for ki in 1..tab.kdtab.len() {
        if d > tab.kdmax[ki] {
            break;
        }
        procd(tab, rep, ws, ki, d, zd);
    }
}
