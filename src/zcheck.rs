//! # Zcheck — Arithmetic-Progression Candidate Checking
//!
//! The back end of the dispatcher: given a divisor d (with its k-coprime
//! part a and cube roots za), an auxiliary modulus b and its |z| residues
//! zb, enumerate every |z| ≤ zmax in the merged progressions mod a·b and
//! test each one for an integer (x, y) completion.
//!
//! Three entry points, chosen by the dispatcher:
//! - [`zrcheckone`] — a·b exceeds zmax, each progression holds at most one
//!   value.
//! - [`zrcheckafew`] — short progressions, enumerated directly.
//! - [`zrchecklift`] — long progressions; sharpened with auxiliary primes
//!   (brute-forced cube-sum constraints mod r) until the projected
//!   enumeration cost stops improving, then enumerated.
//!
//! ## The per-candidate test
//!
//! With D the signed x+y (the branch fixes D = ±d) and z = ±|z|, a
//! candidate completes iff 3D divides D³ − k + z³ with quotient c = xy and
//! D² − 4c is a perfect square s² with s ≡ D (mod 2). Two bitmap filters
//! (squares mod 2^16 on a 2-adic image when d is odd, squares mod SQF_M1
//! on a CRT image when gcd(d, SQF_M1) = 1) reject almost everything before
//! the exact big-integer confirmation runs.

use rug::ops::Pow;
use rug::Integer;

use crate::modarith::{b32_inv, b32_red, gcd, inv_mod};
use crate::report::{Counts, Report};
use crate::sieve::BitSieve;
use crate::tables::{Tables, ZBUFBITS};

/// Odd square-filter modulus: 5·7·11·13·17.
pub const SQF_M1: u64 = 85085;

/// Auxiliary primes tried by the lifting checker, in order.
const AUX_PRIMES: [u32; 12] = [5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

/// Square-filter bitmaps, built once per worker.
pub struct SquareFilters {
    sq16: BitSieve,
    sqm1: BitSieve,
}

impl SquareFilters {
    pub fn new() -> SquareFilters {
        let mut sq16 = BitSieve::new_all_clear(1 << 16);
        for s in 0u64..(1 << 16) {
            sq16.set((s * s % (1 << 16)) as usize);
        }
        let mut sqm1 = BitSieve::new_all_clear(SQF_M1 as usize);
        for s in 0..SQF_M1 {
            sqm1.set((s * s % SQF_M1) as usize);
        }
        SquareFilters { sq16, sqm1 }
    }
}

impl Default for SquareFilters {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-worker scratch: progression buffers, square filters, and the
/// pending per-prime counters. Allocated at worker start, never shared.
pub struct Workspace {
    /// Branch-adjusted cube roots mod a.
    pub wa: Vec<u64>,
    /// Auxiliary |z| residues mod the (possibly lifted) modulus B.
    pub zb: Vec<u32>,
    /// Lift target for the residue ping-pong.
    pub zb_alt: Vec<u32>,
    pub filters: SquareFilters,
    pub pending: Counts,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace {
            wa: Vec::with_capacity(1 << ZBUFBITS),
            zb: Vec::with_capacity(1 << ZBUFBITS),
            zb_alt: Vec::with_capacity(1 << ZBUFBITS),
            filters: SquareFilters::new(),
            pending: Counts::default(),
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Positive inverse of odd x mod 2^64 by Hensel lifting.
#[inline]
fn inv64(x: u64) -> u64 {
    debug_assert!(x & 1 == 1);
    let mut inv: u64 = 1;
    for _ in 0..6 {
        inv = inv.wrapping_mul(2u64.wrapping_sub(x.wrapping_mul(inv)));
    }
    inv
}

/// Per-d candidate tester: cheap modular images first, exact rug
/// confirmation last.
struct CandTest<'a> {
    k: u64,
    d: u64,
    si: u32,
    /// (3D)⁻¹ mod 2^64, defined when d is odd.
    inv3d_64: Option<u64>,
    /// D mod SQF_M1 and (3D)⁻¹ mod SQF_M1, when gcd(d, SQF_M1) = 1.
    m1: Option<(u64, u64)>,
    filters: &'a SquareFilters,
}

impl<'a> CandTest<'a> {
    fn new(tab: &Tables, filters: &'a SquareFilters, d: u64, si: u32) -> CandTest<'a> {
        // D = x+y: +d on the negative-z branch, −d on the positive
        let d64 = if si == 1 { d } else { d.wrapping_neg() };
        let inv3d_64 = if d & 1 == 1 {
            Some(inv64(3u64.wrapping_mul(d64)))
        } else {
            None
        };
        let m1 = if gcd(d % SQF_M1, SQF_M1) == 1 {
            let dm = if si == 1 {
                d % SQF_M1
            } else {
                (SQF_M1 - d % SQF_M1) % SQF_M1
            };
            Some((dm, inv_mod(3 * dm % SQF_M1, SQF_M1).unwrap()))
        } else {
            None
        };
        CandTest {
            k: tab.k,
            d,
            si,
            inv3d_64,
            m1,
            filters,
        }
    }

    /// Test one |z| candidate; emit a hit when (x, y) completes.
    fn test(&self, w: u128, zmax: u128, rep: &Report) {
        if w == 0 || w > zmax {
            return;
        }
        let d = self.d;

        // d | k − z³ (only the a·b part of d is guaranteed by construction)
        let wd = (w % d as u128) as u64;
        let c3 = mulmod(mulmod(wd, wd, d), wd, d);
        let ok = if self.si == 1 {
            (c3 + self.k % d) % d == 0
        } else {
            c3 == self.k % d
        };
        if !ok {
            return;
        }

        // 2-adic image: s² mod 2^64, low 16 bits must be a square residue
        let w64 = w as u64;
        if let Some(inv3d) = self.inv3d_64 {
            let d64 = if self.si == 1 { d } else { d.wrapping_neg() };
            let z3 = w64.wrapping_mul(w64).wrapping_mul(w64);
            let z3 = if self.si == 1 { z3.wrapping_neg() } else { z3 };
            let t = d64
                .wrapping_mul(d64)
                .wrapping_mul(d64)
                .wrapping_sub(self.k)
                .wrapping_add(z3);
            let c = t.wrapping_mul(inv3d);
            let s2 = d64.wrapping_mul(d64).wrapping_sub(c.wrapping_mul(4));
            if !self.filters.sq16.get((s2 & 0xFFFF) as usize) {
                return;
            }
        }

        // odd CRT image mod SQF_M1
        if let Some((dm, inv3d)) = self.m1 {
            let m = SQF_M1;
            let wm = (w % m as u128) as u64;
            let z3 = wm * wm % m * wm % m;
            let z3 = if self.si == 1 { (m - z3) % m } else { z3 };
            let t = (dm * dm % m * dm % m + m - self.k % m + z3) % m;
            let c = t * inv3d % m;
            let s2 = (dm * dm % m + 4 * m - 4 * c % m) % m;
            if !self.filters.sqm1.get(s2 as usize) {
                return;
            }
        }

        self.confirm(w, rep);
    }

    /// Exact confirmation: 3D | D³ − k + z³, D² − 4c a perfect square of
    /// the right parity. Survivors become reported candidates.
    fn confirm(&self, w: u128, rep: &Report) {
        let z = if self.si == 1 {
            -Integer::from(w)
        } else {
            Integer::from(w)
        };
        let dsig = if self.si == 1 {
            Integer::from(self.d)
        } else {
            -Integer::from(self.d)
        };
        let t = dsig.clone().pow(3) - self.k + z.clone().pow(3);
        let (c, r) = t.div_rem(Integer::from(3) * &dsig);
        if r != 0 {
            return;
        }
        let s2 = dsig.clone().square() - Integer::from(4) * c;
        if s2 < 0 || !s2.is_perfect_square() {
            return;
        }
        let s = s2.sqrt();
        if Integer::from(&dsig - &s).is_odd() {
            return;
        }
        let x: Integer = Integer::from(&dsig + &s) / 2;
        let y: Integer = Integer::from(&dsig - &s) / 2;
        debug_assert_eq!(
            x.clone().pow(3) + y.clone().pow(3) + z.clone().pow(3),
            self.k,
            "completion identity broken for d={}",
            self.d
        );
        rep.report_hit(&x, &y, &z, self.d, w);
    }
}

#[inline]
fn mulmod(a: u64, b: u64, m: u64) -> u64 {
    (a as u128 * b as u128 % m as u128) as u64
}

/// Fill the branch-adjusted roots: |z| ≡ za on the positive branch,
/// |z| ≡ a − za on the negative.
fn fill_wa(ws: &mut Workspace, si: u32, a: u64, za: &[u64]) {
    ws.wa.clear();
    if si == 1 {
        ws.wa.extend(za.iter().map(|&r| (a - r) % a));
    } else {
        ws.wa.extend(za.iter().copied());
    }
}

/// Enumerate the merged progressions w ≡ wa (mod a), w ≡ zb (mod B) up to
/// zmax, testing every value. `cap` bounds the per-progression count.
#[allow(clippy::too_many_arguments)]
fn enumerate_merged(
    tab: &Tables,
    rep: &Report,
    ws: &Workspace,
    d: u64,
    si: u32,
    a: u64,
    big_b: u32,
    ainvb: u32,
    binv: u64,
    cap: u128,
) {
    let test = CandTest::new(tab, &ws.filters, d, si);
    let step = a as u128 * big_b as u128;
    for &wa in &ws.wa {
        let wab = b32_red(wa, big_b, binv) as u64;
        for &zb in &ws.zb {
            let mut t = zb as u64 + big_b as u64 - wab;
            if t >= big_b as u64 {
                t -= big_b as u64;
            }
            let t = b32_red(t * ainvb as u64, big_b, binv);
            let mut w = wa as u128 + a as u128 * t as u128;
            if w == 0 {
                w = step;
            }
            let mut left = cap;
            while w <= tab.zmax && left > 0 {
                test.test(w, tab.zmax, rep);
                w += step;
                left -= 1;
            }
        }
    }
}

/// Progression length is effectively one: a·b exceeds zmax, so each
/// (za, zb) pair contributes at most a single candidate.
#[allow(clippy::too_many_arguments)]
pub fn zrcheckone(
    tab: &Tables,
    rep: &Report,
    ws: &mut Workspace,
    d: u64,
    si: u32,
    a: u64,
    za: &[u64],
    b: u32,
    ainvb: u32,
    binv: u64,
) {
    fill_wa(ws, si, a, za);
    enumerate_merged(tab, rep, ws, d, si, a, b, ainvb, binv, 1);
}

/// Short progressions: enumerate at most n values per (za, zb) pair.
#[allow(clippy::too_many_arguments)]
pub fn zrcheckafew(
    tab: &Tables,
    rep: &Report,
    ws: &mut Workspace,
    d: u64,
    si: u32,
    a: u64,
    za: &[u64],
    b: u32,
    ainvb: u32,
    binv: u64,
    n: u128,
) {
    fill_wa(ws, si, a, za);
    enumerate_merged(tab, rep, ws, d, si, a, b, ainvb, binv, n);
}

/// Admissible |z| residues mod the auxiliary prime r, brute-forced from
/// the cube-sum congruence with the branch's signed x+y.
fn admissible_mod_r(k: u64, d: u64, si: u32, r: u32) -> Vec<u32> {
    let r = r as u64;
    let sd = if si == 1 { d % r } else { (r - d % r) % r };
    let cube = |x: u64| x * x % r * x % r;
    let mut ok = vec![false; r as usize];
    for x in 0..r {
        let y = (sd + r - x) % r;
        let target = (k % r + 2 * r - cube(x) - cube(y)) % r;
        for w in 0..r {
            let zc = cube(w);
            let zc = if si == 1 { (r - zc) % r } else { zc };
            if zc == target {
                ok[w as usize] = true;
            }
        }
    }
    (0..r as u32).filter(|&w| ok[w as usize]).collect()
}

/// Long progressions: sharpen the auxiliary side with successive primes
/// while the projected enumeration cost improves and the residue buffer
/// holds, then enumerate.
#[allow(clippy::too_many_arguments)]
pub fn zrchecklift(
    tab: &Tables,
    rep: &Report,
    ws: &mut Workspace,
    d: u64,
    si: u32,
    a: u64,
    za: &[u64],
    b: u32,
    ainvb: u32,
) {
    let cap = 1usize << ZBUFBITS;
    let mut big_b = b;
    let mut ainv = ainvb as u64;

    for &r in &AUX_PRIMES {
        if big_b % r == 0 || a % r as u64 == 0 {
            continue;
        }
        let Some(lifted_b) = big_b.checked_mul(r) else {
            break;
        };
        let wr = admissible_mod_r(tab.k, d, si, r);
        if wr.is_empty() {
            // the whole progression family is dead
            ws.zb.clear();
            break;
        }
        if wr.len() == r as usize {
            continue;
        }
        let new_cb = ws.zb.len() * wr.len();
        if new_cb > cap {
            break;
        }
        let old_len = tab.ap_bound(a as u128 * big_b as u128);
        let new_len = tab.ap_bound(a as u128 * lifted_b as u128);
        let old_cost = ws.zb.len() as u128 * old_len;
        let new_cost = new_cb as u128 * (new_len + 1);
        if new_cost >= old_cost {
            continue;
        }

        // lift residues and the inverse of a onto the new modulus B·r
        let binv_r = inv_mod(big_b as u64 % r as u64, r as u64).unwrap() as u32;
        ws.zb_alt.clear();
        for &z in &ws.zb {
            let zr = z % r;
            for &t in &wr {
                let step = (t + r - zr) % r * binv_r % r;
                ws.zb_alt.push(z + big_b * step);
            }
        }
        std::mem::swap(&mut ws.zb, &mut ws.zb_alt);
        let ar_inv = inv_mod(a % r as u64, r as u64).unwrap();
        let step = (ar_inv + r as u64 - ainv % r as u64) % r as u64 * binv_r as u64 % r as u64;
        ainv += big_b as u64 * step;
        big_b = lifted_b;
        debug_assert_eq!(ainv % r as u64, ar_inv);
        debug_assert_eq!(
            (a % big_b as u64) as u128 * ainv as u128 % big_b as u128,
            1
        );
        if a as u128 * big_b as u128 > tab.zmax {
            break;
        }
    }

    let binv = b32_inv(big_b);
    let n = tab.ap_bound(a as u128 * big_b as u128);
    fill_wa(ws, si, a, za);
    enumerate_merged(tab, rep, ws, d, si, a, big_b, ainv as u32, binv, n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Report;
    use crate::tables::Tables;

    fn setup(k: u64, dmax: u64, zmax: u128) -> (Tables, Report, Workspace) {
        let t = Tables::load(k, dmax, zmax, 2, dmax);
        let r = Report::new(0, 1, None, None);
        let w = Workspace::new();
        (t, r, w)
    }

    // ── Square filters ─────────────────────────────────────────────────

    /// Every perfect square passes both bitmaps; most non-squares fail.
    #[test]
    fn square_filters_accept_squares() {
        let f = SquareFilters::new();
        for s in 0u64..5000 {
            let sq = s * s;
            assert!(f.sq16.get((sq % (1 << 16)) as usize), "s={}", s);
            assert!(f.sqm1.get((sq % SQF_M1) as usize), "s={}", s);
        }
        let rejected = (0..10_000u64)
            .filter(|&t| !f.sq16.get((t % (1 << 16)) as usize) || !f.sqm1.get((t % SQF_M1) as usize))
            .count();
        assert!(rejected > 9000, "filters too weak: {} rejected", rejected);
    }

    // ── Candidate test ─────────────────────────────────────────────────

    /// The known solution 7³ + 10³ + (−11)³ = 12 is confirmed from its
    /// (d, |z|) pair, on the correct branch only.
    #[test]
    fn candidate_test_confirms_known_solution() {
        let (t, r, w) = setup(12, 100, 1_000_000);
        let d = 17u64;
        let si = t.sgnz_index(d);
        assert_eq!(si, 1);
        let ct = CandTest::new(&t, &w.filters, d, si);
        ct.test(11, t.zmax, &r);
        let hits = r.take_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].z, "-11");
        // x, y in some order
        let mut xy = vec![hits[0].x.clone(), hits[0].y.clone()];
        xy.sort();
        assert_eq!(xy, vec!["10".to_string(), "7".to_string()]);
    }

    /// Non-solutions in the same progression are rejected.
    #[test]
    fn candidate_test_rejects_non_solutions() {
        let (t, r, w) = setup(12, 100, 1_000_000);
        let ct = CandTest::new(&t, &w.filters, 17, 1);
        for w_cand in [11u128 + 17, 11 + 34, 11 + 51, 11 + 17 * 5] {
            ct.test(w_cand, t.zmax, &r);
        }
        assert!(r.take_hits().is_empty());
    }

    /// (−23)³ + (−26)³ + 31³ = 48: positive branch, even d = 49.
    #[test]
    fn candidate_test_positive_branch() {
        let (t, r, w) = setup(48, 100, 1_000_000);
        let d = 49u64;
        let si = t.sgnz_index(d);
        assert_eq!(si, 0);
        let ct = CandTest::new(&t, &w.filters, d, si);
        ct.test(31, t.zmax, &r);
        let hits = r.take_hits();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].z, "31");
    }

    // ── Enumeration ────────────────────────────────────────────────────

    /// zrcheckafew finds the k = 12 solution when handed the real cube
    /// roots mod a = d = 17 and the auxiliary residues the tables give.
    #[test]
    fn afew_finds_solution_through_merge() {
        let (t, r, mut ws) = setup(12, 100, 1_000_000);
        let d = 17u64;
        let si = t.sgnz_index(d); // 1
        // cube roots of 12 mod 17: brute force
        let za: Vec<u64> = (0..17u64).filter(|&x| x * x * x % 17 == 12).collect();
        assert!(!za.is_empty());
        // coprime path auxiliary data
        let mi = ((t.k & d & 1) + 2 * t.onezmod7(d, si) as u64) as usize;
        let km = &t.kmtab[mi];
        let db = b32_red(d, km.b, km.binv) as usize;
        ws.zb.clear();
        for j in 0..km.zcnt[db] as usize {
            ws.zb.push(km.zs[km.zoff[db] as usize + j] as u32);
        }
        let ainvb = km.itab[db];
        let n = t.ap_bound(d as u128 * km.b as u128);
        zrcheckafew(&t, &r, &mut ws, d, si, d, &za, km.b, ainvb, km.binv, n);
        let hits = r.take_hits();
        assert!(
            hits.iter().any(|h| h.z == "-11"),
            "the (7, 10, -11) hit must come out of the merged progression"
        );
    }

    /// With zmax below |z| the same setup finds nothing.
    #[test]
    fn afew_respects_zmax() {
        let (t, r, mut ws) = setup(12, 100, 10);
        let d = 17u64;
        let za: Vec<u64> = (0..17u64).filter(|&x| x * x * x % 17 == 12).collect();
        let mi = 0usize;
        let km = &t.kmtab[mi];
        let db = b32_red(d, km.b, km.binv) as usize;
        ws.zb.clear();
        for j in 0..km.zcnt[db] as usize {
            ws.zb.push(km.zs[km.zoff[db] as usize + j] as u32);
        }
        let n = t.ap_bound(d as u128 * km.b as u128);
        zrcheckafew(&t, &r, &mut ws, d, si_of(&t, d), d, &za, km.b, km.itab[db], km.binv, n);
        assert!(r.take_hits().is_empty());
    }

    fn si_of(t: &Tables, d: u64) -> u32 {
        t.sgnz_index(d)
    }

    // ── Auxiliary-prime constraints ────────────────────────────────────

    /// admissible_mod_r is sound: the |z| of a known solution is always
    /// admissible mod every prime.
    #[test]
    fn aux_residues_are_sound() {
        // (k, d, si, |z|): 12 = 7³+10³−11³ and 48 = −23³−26³+31³
        for &(k, d, w) in &[(12u64, 17u64, 11u64), (48, 49, 31)] {
            let t = Tables::load(k, 100, 1_000_000, 2, 100);
            let si = t.sgnz_index(d);
            for &r in &AUX_PRIMES {
                let set = admissible_mod_r(k, d, si, r);
                assert!(
                    set.contains(&((w % r as u64) as u32)),
                    "k={}, d={}, r={}",
                    k,
                    d,
                    r
                );
            }
        }
    }

    /// The constraint is nontrivial for most primes (it must actually cut
    /// the progression count down).
    #[test]
    fn aux_residues_cut_something() {
        let t = Tables::load(33, 1000, 1u128 << 40, 2, 1000);
        let d = 101u64;
        let si = t.sgnz_index(d);
        let cut = AUX_PRIMES
            .iter()
            .filter(|&&r| admissible_mod_r(33, d, si, r).len() < r as usize)
            .count();
        assert!(cut >= 6, "only {} of {} primes cut", cut, AUX_PRIMES.len());
    }

    /// zrchecklift still finds the solution after lifting.
    #[test]
    fn lift_preserves_solutions() {
        let (t, r, mut ws) = setup(12, 100, 1u128 << 30);
        let d = 17u64;
        let si = t.sgnz_index(d);
        let za: Vec<u64> = (0..17u64).filter(|&x| x * x * x % 17 == 12).collect();
        let mi = ((t.k & d & 1) + 2 * t.onezmod7(d, si) as u64) as usize;
        let km = &t.kmtab[mi];
        let db = b32_red(d, km.b, km.binv) as usize;
        ws.zb.clear();
        for j in 0..km.zcnt[db] as usize {
            ws.zb.push(km.zs[km.zoff[db] as usize + j] as u32);
        }
        zrchecklift(&t, &r, &mut ws, d, si, d, &za, km.b, km.itab[db]);
        let hits = r.take_hits();
        assert!(
            hits.iter().any(|h| h.z == "-11"),
            "lifting lost the known solution"
        );
    }
}
