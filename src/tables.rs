//! # Tables — Shared Read-Only Precompute
//!
//! Everything the workers share: the admissible divisors of k, cached
//! primes with their cube roots, the cubic-reciprocity residue tables that
//! sharpen arithmetic progressions, the small-cofactor tables with full
//! inverse tables, and the derived phase thresholds. Loaded once before
//! the workers start and never mutated (workers hold an `Arc<Tables>`).
//!
//! ## Reciprocity tables
//!
//! The auxiliary modulus b is composed as m·b2·b7: a base modulus m that
//! depends on k (9 for odd k, 18 for even k, 81 for k = 3, halved for even
//! divisors of k), doubled when m and d are both odd (|z| is then even),
//! and multiplied by 7 when k ≡ ±2 (mod 7) and d forces z ≡ 0 (mod 7).
//! The admissible |z| residues per residue class of d are derived by brute
//! force from the cube-sum congruence modulo 54 (or 378 with the 7-part,
//! or 486 for k = 3 where the Cassels condition x ≡ y ≡ z (mod 9) is
//! imposed). Working modulo 27 pins |z| mod 9 to a single class per d, so
//! the coprime-d fast path sees exactly one residue per class.

use std::collections::BTreeSet;

use tracing::info;

use crate::cuberoots::{cuberoots_modq, has_cuberoots_modp};
use crate::modarith::{b32_inv, crt7, gcd, inv_mod};
use crate::sieve::{generate_primes, next_prime};

/// Largest dmax the build supports (dmax must stay below 2^63).
pub const DMAX: u64 = 1 << 62;
/// zmax must stay below 2^ZMAXBITS.
pub const ZMAXBITS: u32 = 96;
/// Largest cached prime-power modulus for cube roots.
pub const CQMAX: u64 = 1 << 20;
/// Largest cofactor with a full inverse table.
pub const SDMAX: u64 = 1 << 11;
/// Largest cached cofactor.
pub const CDMAX: u64 = 1 << 20;
/// Progressions at most this long are enumerated directly.
pub const ZSHORT: u128 = 64;
/// ... or when length times progression count stays below this.
pub const ZFEW: u128 = 4096;
/// Batch size for grouped modular inversions.
pub const IBATCH: usize = 256;
/// 1 + 3 + 3² + … + 3^10: max cube roots of k mod d for d < 2^63, k ≤ 1000.
pub const CUBEROOT_BUFSIZE: usize = 88573;
/// Residue ping-pong buffers hold 2^ZBUFBITS entries.
pub const ZBUFBITS: u32 = 16;

/// Admissible divisor of k (product of full prime-power parts, no 3-part).
#[derive(Clone, Debug)]
pub struct KdRec {
    pub d: u64,
    /// Number of cube roots of k modulo d.
    pub n: u32,
    /// Reciprocity-table variant keeping the auxiliary modulus coprime to d.
    pub fi: usize,
}

/// Cached prime with cube roots of k stored mod p^e.
#[derive(Clone, Debug)]
pub struct CpRec {
    pub p: u64,
    /// Largest cached exponent: p^e ≤ min(dmax, CQMAX).
    pub e: u32,
    pub n: u32,
    /// Offset into `cproots`.
    pub r: u32,
}

/// Reciprocity table for one base modulus m.
#[derive(Clone, Debug)]
pub struct RecTab {
    pub m: u32,
    /// Barrett reciprocals for m, 2m, 7m, 14m.
    pub minv: [u64; 4],
    /// Per residue d mod m: offset into `zs`.
    pub zoff: Vec<u32>,
    /// Per residue d mod m: number of admissible |z| residues.
    pub zcnt: Vec<u8>,
    pub zs: Vec<u16>,
    /// Inverse of x mod m per residue (0 when non-invertible).
    pub itab: Vec<u32>,
}

/// Coprime-d fast path table for one full auxiliary modulus b = km[mi].
#[derive(Clone, Debug)]
pub struct KmTab {
    pub b: u32,
    pub binv: u64,
    pub zoff: Vec<u32>,
    pub zcnt: Vec<u8>,
    pub zs: Vec<u16>,
    pub itab: Vec<u32>,
}

/// Small cofactor with cube roots and a full inverse table.
#[derive(Clone, Debug)]
pub struct SdRec {
    pub d: u32,
    pub dinv: u64,
    pub n: u32,
    /// Offset into `sdroots`.
    pub r: u32,
    /// Offset into `sdinvs` (table of length d).
    pub i: u32,
}

/// Cached cofactor record for the cocached phase.
#[derive(Clone, Debug)]
pub struct CdRec {
    pub d: u32,
    /// Largest prime factor.
    pub p: u32,
    pub n: u32,
    /// Offset into `cdroots`.
    pub r: u32,
    /// Index into `sdtab` when d ≤ sdmax, else 0.
    pub sdpi: u32,
}

pub struct Tables {
    pub k: u64,
    pub dmax: u64,
    pub zmax: u128,
    /// zmax·(1 + 2^-62) + 1: the fudged numerator for upper-bound ceilings.
    pub zmax_fudged: u128,

    pub cpmax: u64,
    pub cqmax: u64,
    pub sdmax: u64,
    pub cdmax: u64,
    pub cdmin: u64,
    pub sdmin: u64,
    pub pdmin: u64,
    pub bpmin: u64,

    pub kdtab: Vec<KdRec>,
    pub kdmax: Vec<u64>,
    /// Smallest admissible divisor of k above 1 (0 when none).
    pub kdmin: u64,

    /// 1-indexed, cptab[0] is a sentinel.
    pub cptab: Vec<CpRec>,
    pub cproots: Vec<u64>,

    pub rectab: Vec<RecTab>,
    pub km: [u32; 4],
    pub kmtab: Vec<KmTab>,
    /// True when k ≡ ±2 (mod 7), enabling the z ≡ 0 (mod 7) branch.
    pub has7: bool,

    /// 1-indexed, sdtab[0] is a sentinel.
    pub sdtab: Vec<SdRec>,
    pub sdroots: Vec<u32>,
    pub sdinvs: Vec<u32>,

    /// 1-indexed and ascending by d, cdtab[0] is a sentinel.
    pub cdtab: Vec<CdRec>,
    pub cdroots: Vec<u32>,
}

/// k admissible: positive, ≤ 1000, ≡ 3 or 6 (mod 9).
pub fn goodk(k: u64) -> bool {
    k >= 1 && k <= 1000 && (k % 9 == 3 || k % 9 == 6)
}

fn isqrt(n: u64) -> u64 {
    let mut r = (n as f64).sqrt() as u64;
    while r > 0 && r.checked_mul(r).map_or(true, |s| s > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).map_or(false, |s| s <= n) {
        r += 1;
    }
    r
}

fn lcm(a: u64, b: u64) -> u64 {
    a / gcd(a, b) * b
}

impl Tables {
    /// Build every table for a run. Pure and deterministic; invariant
    /// violations are programming errors and abort.
    pub fn load(k: u64, dmax: u64, zmax: u128, pmin: u64, pmax: u64) -> Tables {
        assert!(goodk(k), "inadmissible k={}", k);
        assert!(dmax < (1 << 63) && dmax <= DMAX);
        assert!(zmax < (1u128 << ZMAXBITS));

        let zmax_fudged = zmax + (zmax >> 62) + 1;
        let cpmax = next_prime(isqrt(dmax)).max(3);
        let cqmax = CQMAX.min(dmax);
        let sdmax = SDMAX.min(dmax);
        let cdmax = CDMAX.min(dmax);

        let (kdtab, kdmax, kdmin) = build_kdtab(k, dmax);
        let (cptab, cproots) = build_cptab(k, dmax, cpmax, cqmax);
        let (rectab, km, kmtab, has7) = build_reciprocity(k);
        let (sdtab, sdroots, sdinvs) = build_sdtab(k, &cptab, &cproots, sdmax, cqmax);
        let (cdtab, cdroots) = build_cdtab(k, &cptab, &cproots, &sdtab, cdmax, cqmax);

        let cdmin = dmax.div_ceil(cdmax).max(2).max(cpmax);
        let sdmin = dmax.div_ceil(sdmax).max(cdmin);
        let q1 = cptab.get(1).map(|r| r.p).unwrap_or(0);
        let mmin = match (kdmin, q1) {
            (0, 0) => 0,
            (0, q) => q,
            (kd, 0) => kd,
            (kd, q) => kd.min(q),
        };
        let mut pdmin = if mmin == 0 { 2 } else { 1 + dmax / mmin };
        if pdmin <= k {
            pdmin = k + 1;
        }
        let pdmin = pdmin.max(sdmin);
        let m_default = km[(k & 1) as usize] as u128;
        let bound = (zmax_fudged / (m_default * ZSHORT)) + 1;
        let mut bpmin = u64::try_from(bound).unwrap_or(u64::MAX).max(pdmin);
        if bpmin <= 7 {
            bpmin = 11;
        }

        let tables = Tables {
            k,
            dmax,
            zmax,
            zmax_fudged,
            cpmax,
            cqmax,
            sdmax,
            cdmax,
            cdmin,
            sdmin,
            pdmin,
            bpmin,
            kdtab,
            kdmax,
            kdmin,
            cptab,
            cproots,
            rectab,
            km,
            kmtab,
            has7,
            sdtab,
            sdroots,
            sdinvs,
            cdtab,
            cdroots,
        };
        info!(
            pmin,
            pmax,
            dmax,
            zmax = %zmax,
            cpmax = tables.cpmax,
            cqmax = tables.cqmax,
            cdmax = tables.cdmax,
            cdmin = tables.cdmin,
            sdmin = tables.sdmin,
            pdmin = tables.pdmin,
            bpmin = tables.bpmin,
            "LIMITS"
        );
        tables
    }

    /// Upper bound on ⌈zmax / x⌉ via the fudged numerator.
    #[inline]
    pub fn ap_bound(&self, x: u128) -> u128 {
        debug_assert!(x > 0);
        self.zmax_fudged / x + 1
    }

    /// Which |z| branch is live for this d: 1 when z < 0 (the residues in
    /// za get negated), 0 when z > 0. Determined by d mod 3.
    #[inline]
    pub fn sgnz_index(&self, d: u64) -> u32 {
        debug_assert!(d % 3 != 0);
        let c = (self.k % 9) / 3; // 1 or 2
        (d % 3 != c) as u32
    }

    /// True when k ≡ ±2 (mod 7) and this d forces z ≡ 0 (mod 7): the
    /// signed x+y lands outside the residues that allow a unit cube for z.
    #[inline]
    pub fn onezmod7(&self, d: u64, si: u32) -> bool {
        if !self.has7 {
            return false;
        }
        let dm = (d % 7) as u32;
        let signed = if si == 1 { dm } else { (7 - dm) % 7 };
        // x + y with x³ ≡ y³ ≡ ±1 admits a unit z-cube only on these classes
        let possible = if self.k % 7 == 2 {
            matches!(signed, 1 | 2 | 4)
        } else {
            matches!(signed, 3 | 5 | 6)
        };
        !possible
    }

    /// Largest 1-based index pi with cptab[pi] ≤ p and d·cptab[pi] ≤ dmax;
    /// 0 when there is none.
    pub fn pimaxp(&self, p: u64, d: u64) -> usize {
        let mut lo = 1usize;
        let mut hi = self.cptab.len(); // exclusive
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.cptab[mid].p <= p {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut pi = lo - 1;
        while pi > 0 && (d as u128) * (self.cptab[pi].p as u128) > self.dmax as u128 {
            pi -= 1;
        }
        pi
    }

    /// Largest cached exponent for cptab[pi].
    #[inline]
    pub fn cached_e(&self, pi: usize) -> u32 {
        self.cptab[pi].e
    }

    /// Cached cube roots of k mod cptab[pi]^e, for e ≤ cached_e(pi):
    /// reductions of the roots stored at the top cached power.
    pub fn cached_roots_modq(&self, pi: usize, e: u32, out: &mut [u64; 3]) -> usize {
        let rec = &self.cptab[pi];
        debug_assert!(e >= 1 && e <= rec.e);
        let q = rec.p.pow(e);
        let n = rec.n as usize;
        for (j, slot) in out.iter_mut().enumerate().take(n) {
            *slot = self.cproots[rec.r as usize + j] % q;
        }
        n
    }

    /// Start index for an `enum_cd` chain walk: the largest cdtab index
    /// whose cofactor keeps d·d' ≤ dmax and whose largest prime is ≤
    /// pbound. Returns 0 (the sentinel) when no cofactor qualifies.
    pub fn cdentry(&self, pbound: u64, d: u64) -> usize {
        let lim = self.dmax / d;
        let mut lo = 1usize;
        let mut hi = self.cdtab.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if (self.cdtab[mid].d as u64) <= lim {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let mut idx = lo - 1;
        while idx > 0 && self.cdtab[idx].p as u64 > pbound {
            idx -= 1;
        }
        idx
    }
}

/// Divisors of k built from full prime-power parts q^v_q(k), q ≠ 3
/// (3 | d contradicts the mod-27 constraint), capped at dmax, ascending.
fn build_kdtab(k: u64, dmax: u64) -> (Vec<KdRec>, Vec<u64>, u64) {
    let mut parts: Vec<(u64, u32)> = Vec::new();
    let mut rest = k;
    let mut q = 2u64;
    while q * q <= rest {
        if rest % q == 0 {
            let mut v = 0u32;
            while rest % q == 0 {
                rest /= q;
                v += 1;
            }
            if q != 3 {
                parts.push((q, v));
            }
        }
        q += 1;
    }
    if rest > 1 && rest != 3 {
        parts.push((rest, 1));
    }

    let mut divs: Vec<(u64, u32)> = vec![(1, 1)]; // (divisor, root count)
    for &(q, v) in &parts {
        let qv = q.pow(v);
        // roots of k ≡ 0 mod q^v are the multiples of q^ceil(v/3)
        let n = q.pow(v - v.div_ceil(3));
        let prev = divs.clone();
        for &(d0, n0) in &prev {
            if let Some(d1) = d0.checked_mul(qv) {
                if d1 <= dmax {
                    divs.push((d1, n0 * n as u32));
                }
            }
        }
    }
    divs.sort_unstable();

    let kdtab: Vec<KdRec> = divs
        .iter()
        .map(|&(d, n)| KdRec {
            d,
            n,
            fi: if d % 2 == 0 { 1 } else { 0 },
        })
        .collect();
    let kdmax: Vec<u64> = kdtab.iter().map(|r| dmax / r.d).collect();
    let kdmin = kdtab.get(1).map(|r| r.d).unwrap_or(0);
    (kdtab, kdmax, kdmin)
}

/// Cached primes: every p ≤ cpmax with p ≠ 3, p ∤ k, and cube roots of k
/// mod p; roots stored at the largest power p^e ≤ min(dmax, cqmax).
fn build_cptab(k: u64, dmax: u64, cpmax: u64, cqmax: u64) -> (Vec<CpRec>, Vec<u64>) {
    let mut cptab = vec![CpRec {
        p: 0,
        e: 0,
        n: 0,
        r: 0,
    }];
    let mut cproots: Vec<u64> = Vec::new();
    let mut out = [0u64; 3];
    for p in generate_primes(cpmax) {
        if p == 3 || k % p == 0 || p > dmax {
            continue;
        }
        if !has_cuberoots_modp(k, p) {
            continue;
        }
        let mut e = 1u32;
        while p.checked_pow(e + 1).map_or(false, |q| q <= cqmax) {
            e += 1;
        }
        let n = cuberoots_modq(k, p, e, &mut out);
        debug_assert!(n > 0);
        let r = cproots.len() as u32;
        cproots.extend_from_slice(&out[..n]);
        cptab.push(CpRec {
            p,
            e,
            n: n as u32,
            r,
        });
    }
    (cptab, cproots)
}

/// Admissible |z| residues mod b per residue class of d, brute-forced from
/// the cube-sum congruence at a check modulus strong enough to pin the
/// 3-adic, 2-adic and 7-adic structure.
fn admissible_z_table(k: u64, b: u32) -> (Vec<u32>, Vec<u8>, Vec<u16>) {
    let b = b as u64;
    let l = if k == 3 {
        lcm(b, 486) // 2·3^5, with the Cassels filter below
    } else if b % 7 == 0 {
        lcm(b, 378) // 2·27·7
    } else {
        lcm(b, 54) // 2·27
    };
    let lu = l as usize;
    let cube = |x: u64| -> u64 { x * x % l * x % l };

    let mut buckets: Vec<Vec<u16>> = vec![Vec::new(); lu];
    for z in 0..l {
        buckets[cube(z) as usize].push(z as u16);
    }

    let mut sets: Vec<BTreeSet<u16>> = vec![BTreeSet::new(); b as usize];
    let km = k % l;
    for x in 0..l {
        let cx = cube(x);
        for y in 0..l {
            if k == 3 && x % 9 != y % 9 {
                continue;
            }
            let v = ((km + 2 * l - cx - cube(y)) % l) as usize;
            let s = (x + y) % l;
            let neg_s = (l - s) % l;
            for &z in &buckets[v] {
                let z = z as u64;
                if k == 3 && z % 9 != x % 9 {
                    continue;
                }
                // z < 0 branch: d ≡ x+y, |z| ≡ −z
                sets[(s % b) as usize].insert(((l - z) % l % b) as u16);
                // z > 0 branch: d ≡ −(x+y), |z| ≡ z
                sets[(neg_s % b) as usize].insert((z % b) as u16);
            }
        }
    }

    let mut zoff = Vec::with_capacity(b as usize);
    let mut zcnt = Vec::with_capacity(b as usize);
    let mut zs = Vec::new();
    for set in &sets {
        debug_assert!(set.len() < 256);
        zoff.push(zs.len() as u32);
        zcnt.push(set.len() as u8);
        zs.extend(set.iter().copied());
    }
    (zoff, zcnt, zs)
}

/// Full inverse table mod m: entry x is x⁻¹ mod m, or 0 when x is not
/// invertible. Used for the small-cofactor tables and the subprime mode's
/// outer-prime table.
pub fn inverse_table(m: u32) -> Vec<u32> {
    (0..m)
        .map(|x| inv_mod(x as u64, m as u64).unwrap_or(0) as u32)
        .collect()
}

/// Base modulus of the reciprocity constraint for this k.
fn base_m(k: u64) -> u32 {
    if k == 3 {
        81
    } else if k & 1 == 1 {
        9
    } else {
        18
    }
}

fn build_rectab_entry(k: u64, m: u32) -> RecTab {
    let (zoff, zcnt, zs) = admissible_z_table(k, m);
    RecTab {
        m,
        minv: [
            b32_inv(m),
            b32_inv(2 * m),
            b32_inv(7 * m),
            b32_inv(14 * m),
        ],
        zoff,
        zcnt,
        zs,
        itab: inverse_table(m),
    }
}

fn build_reciprocity(k: u64) -> (Vec<RecTab>, [u32; 4], Vec<KmTab>, bool) {
    let m0 = base_m(k);
    let mut rectab = vec![build_rectab_entry(k, m0)];
    if k % 2 == 0 {
        // even divisors of k use the halved base so b stays coprime to d
        rectab.push(build_rectab_entry(k, m0 / 2));
    }

    // km[mi]: full auxiliary modulus for the coprime path,
    // mi = (k & d & 1) + 2·[z ≡ 0 (7) forced]
    let km = if k & 1 == 1 {
        [m0, 2 * m0, 7 * m0, 14 * m0]
    } else {
        [m0, m0, 7 * m0, 7 * m0]
    };
    let has7 = k * k % 7 == 4;
    let kmtab = km
        .iter()
        .enumerate()
        .map(|(mi, &b)| {
            if mi >= 2 && !has7 {
                // the 7-branch never fires for this k; leave a stub
                return KmTab {
                    b,
                    binv: b32_inv(b),
                    zoff: vec![0; b as usize],
                    zcnt: vec![0; b as usize],
                    zs: Vec::new(),
                    itab: Vec::new(),
                };
            }
            let (zoff, zcnt, zs) = admissible_z_table(k, b);
            KmTab {
                b,
                binv: b32_inv(b),
                zoff,
                zcnt,
                zs,
                itab: inverse_table(b),
            }
        })
        .collect();
    (rectab, km, kmtab, has7)
}

/// CRT the root set of a cofactor with the cached roots of one more prime
/// power. Root counts multiply; the caller bounds the product.
fn crt_roots(roots: &[u64], d: u64, qroots: &[u64], q: u64) -> Vec<u64> {
    let qinv = inv_mod(d % q, q).expect("cofactor prime powers are coprime");
    let mut out = Vec::with_capacity(roots.len() * qroots.len());
    for &rd in roots {
        for &rq in qroots {
            let t = (rq + q - rd % q) % q;
            let t = t * qinv % q;
            out.push(rd + d * t);
        }
    }
    out
}

/// Every admissible smooth cofactor ≤ lim: products of cached prime
/// powers, each with its cube-root set. Returned ascending by value.
/// The largest prime of a product is the last index taken by the DFS.
fn gen_smooth(
    k: u64,
    cptab: &[CpRec],
    cproots: &[u64],
    lim: u64,
    cqmax: u64,
) -> Vec<(u64, u64, Vec<u64>)> {
    struct Gen<'a> {
        k: u64,
        cptab: &'a [CpRec],
        cproots: &'a [u64],
        lim: u64,
        cqmax: u64,
        out: [u64; 3],
        acc: Vec<(u64, u64, Vec<u64>)>,
    }
    impl Gen<'_> {
        fn descend(&mut self, start: usize, d: u64, roots: &[u64]) {
            for pi in start..self.cptab.len() {
                let cp = &self.cptab[pi];
                if d.checked_mul(cp.p).map_or(true, |v| v > self.lim) {
                    break;
                }
                let mut q = cp.p;
                let mut e = 1u32;
                loop {
                    let qroots: Vec<u64> = if e <= cp.e {
                        (0..cp.n as usize)
                            .map(|j| self.cproots[cp.r as usize + j] % q)
                            .collect()
                    } else {
                        let n = cuberoots_modq(self.k, cp.p, e, &mut self.out);
                        self.out[..n].to_vec()
                    };
                    let d1 = d * q;
                    let roots1 = crt_roots(roots, d, &qroots, q);
                    debug_assert!(roots1.len() <= CUBEROOT_BUFSIZE);
                    self.acc.push((d1, cp.p, roots1.clone()));
                    self.descend(pi + 1, d1, &roots1);
                    match q.checked_mul(cp.p) {
                        Some(nq)
                            if d.checked_mul(nq).map_or(false, |v| v <= self.lim)
                                && nq <= self.cqmax =>
                        {
                            q = nq;
                            e += 1;
                        }
                        _ => break,
                    }
                }
            }
        }
    }
    let mut gen = Gen {
        k,
        cptab,
        cproots,
        lim,
        cqmax,
        out: [0u64; 3],
        acc: Vec::new(),
    };
    gen.descend(1, 1, &[0u64]);
    let mut acc = gen.acc;
    acc.sort_unstable_by_key(|&(d, _, _)| d);
    acc
}

fn build_sdtab(
    k: u64,
    cptab: &[CpRec],
    cproots: &[u64],
    sdmax: u64,
    cqmax: u64,
) -> (Vec<SdRec>, Vec<u32>, Vec<u32>) {
    let mut sdtab = vec![SdRec {
        d: 0,
        dinv: 0,
        n: 0,
        r: 0,
        i: 0,
    }];
    let mut sdroots: Vec<u32> = Vec::new();
    let mut sdinvs: Vec<u32> = Vec::new();
    for (d, _p, roots) in gen_smooth(k, cptab, cproots, sdmax, cqmax) {
        let d32 = d as u32;
        let r = sdroots.len() as u32;
        sdroots.extend(roots.iter().map(|&x| x as u32));
        let i = sdinvs.len() as u32;
        sdinvs.extend(inverse_table(d32));
        sdtab.push(SdRec {
            d: d32,
            dinv: b32_inv(d32),
            n: roots.len() as u32,
            r,
            i,
        });
    }
    (sdtab, sdroots, sdinvs)
}

fn build_cdtab(
    k: u64,
    cptab: &[CpRec],
    cproots: &[u64],
    sdtab: &[SdRec],
    cdmax: u64,
    cqmax: u64,
) -> (Vec<CdRec>, Vec<u32>) {
    let mut cdtab = vec![CdRec {
        d: 0,
        p: 0,
        n: 0,
        r: 0,
        sdpi: 0,
    }];
    let mut cdroots: Vec<u32> = Vec::new();
    for (d, p, roots) in gen_smooth(k, cptab, cproots, cdmax, cqmax) {
        let r = cdroots.len() as u32;
        cdroots.extend(roots.iter().map(|&x| x as u32));
        // sdtab is ascending past its sentinel
        let sdpi = sdtab[1..]
            .binary_search_by_key(&(d as u32), |s| s.d)
            .map(|i| (i + 1) as u32)
            .unwrap_or(0);
        cdtab.push(CdRec {
            d: d as u32,
            p: p as u32,
            n: roots.len() as u32,
            r,
            sdpi,
        });
    }
    (cdtab, cdroots)
}

/// Lift a residue set mod m to the even representatives mod 2m (|z| is
/// even when both m and d are odd).
pub fn lift_even(zb: &mut [u32], m: u32) {
    for z in zb.iter_mut() {
        if *z & 1 == 1 {
            *z += m;
        }
    }
}

/// Lift a residue set mod m to z ≡ 0 (mod 7) representatives mod 7m.
pub fn lift_zero7(zb: &mut [u32], m: u32) {
    for z in zb.iter_mut() {
        *z = crt7(*z, m, 0);
    }
}
