//! # Cuberoots — Cube Roots of k Modulo Prime Powers
//!
//! Solves r³ ≡ k (mod p^e) for the divisor enumeration. Three regimes:
//!
//! - p ≡ 2 (mod 3): the cube map is a bijection on (Z/p)*, so the unique
//!   root is k^((2p−1)/3). This also covers p = 2.
//! - p ≡ 1 (mod 3): k is a cubic residue iff k^((p−1)/3) ≡ 1; roots are
//!   found with the Adleman–Manders–Miller construction (discrete log in
//!   the 3-Sylow subgroup, Pohlig–Hellman digit extraction) and come in
//!   triples {r, rω, rω²}.
//! - p = 3: k ≡ 3 or 6 (mod 9) has the single root 0 mod 3 and no roots
//!   mod 9 or higher (v₃(k) = 1 cannot be a cube valuation).
//!
//! Roots mod p are lifted to p^e by Newton iteration with precision
//! doubling; f'(r) = 3r² is invertible mod p^e whenever p ∤ 3k.

use crate::modarith::{inv_mod, pow_mod, MontgomeryCtx};

/// True when k has a unit cube root mod the prime p. Primes dividing k
/// are the divisor table's business, not the coprime enumeration's.
pub fn has_cuberoots_modp(k: u64, p: u64) -> bool {
    if p != 3 && k % p == 0 {
        return false;
    }
    if p % 3 != 1 {
        return true;
    }
    pow_mod(k % p, (p - 1) / 3, p) == 1
}

/// Cube roots of k mod prime p, written into `out`. Returns the count
/// (0, 1, or 3); 0 for p | k, which the enumeration never uses here.
pub fn cuberoots_modp(k: u64, p: u64, out: &mut [u64; 3]) -> usize {
    let km = k % p;
    if p == 3 {
        out[0] = km; // cubing is the identity mod 3
        return 1;
    }
    if km == 0 {
        return 0;
    }
    if p % 3 == 2 {
        out[0] = pow_mod(km, (2 * p - 1) / 3, p);
        return 1;
    }
    amm_cuberoots(km, p, out)
}

/// AMM cube roots for p ≡ 1 (mod 3), k a unit mod p. Returns 0 when k is
/// a cubic non-residue, else writes all three roots.
fn amm_cuberoots(k: u64, p: u64, out: &mut [u64; 3]) -> usize {
    let ctx = MontgomeryCtx::new(p);
    let one = ctx.one();
    let k_m = ctx.to_mont(k);

    // p − 1 = 3^s · t with 3 ∤ t
    let mut t = p - 1;
    let mut s = 0u32;
    while t % 3 == 0 {
        t /= 3;
        s += 1;
    }

    if ctx.pow_mod(k_m, (p - 1) / 3) != one {
        return 0;
    }

    // Cubic non-residue g; b = g^t generates the 3-Sylow subgroup.
    let mut g = 2u64;
    let b_m = loop {
        let g_m = ctx.to_mont(g);
        if ctx.pow_mod(g_m, (p - 1) / 3) != one {
            break ctx.pow_mod(g_m, t);
        }
        g += 1;
    };
    let three_s = 3u64.pow(s);
    let omega = ctx.pow_mod(b_m, three_s / 3); // primitive cube root of unity
    let omega2 = ctx.mul(omega, omega);

    // Pohlig–Hellman: j with b^j = k^t in the subgroup of order 3^s.
    // k is a residue, so 3 | j.
    let u_m = ctx.pow_mod(k_m, t);
    let mut j = 0u64;
    let mut pow3 = 1u64;
    for _ in 0..s {
        let c = ctx.mul(u_m, ctx.pow_mod(b_m, three_s - j));
        let w = ctx.pow_mod(c, three_s / (3 * pow3));
        let digit = if w == one {
            0
        } else if w == omega {
            1
        } else {
            debug_assert_eq!(w, omega2);
            2
        };
        j += digit * pow3;
        pow3 *= 3;
    }
    debug_assert_eq!(j % 3, 0);

    // α with 3α ≡ 1 (mod t); then (k^α)³ = k·(k^t)^β, β = (3α−1)/t,
    // and dividing by b^{(j/3)β} lands on a true root. t is even (p is
    // odd), so t ≥ 2 and the inverse exists.
    let alpha = inv_mod(3 % t, t).expect("t coprime to 3");
    let beta = (3 * alpha - 1) / t;
    let r0 = ctx.pow_mod(k_m, alpha);
    let corr = ((j / 3) as u128 * beta as u128 % three_s as u128) as u64;
    let r_m = ctx.mul(r0, ctx.pow_mod(b_m, three_s - corr));

    out[0] = ctx.from_mont(r_m);
    out[1] = ctx.from_mont(ctx.mul(r_m, omega));
    out[2] = ctx.from_mont(ctx.mul(r_m, omega2));
    debug_assert_eq!(
        (out[0] as u128).pow(3) % p as u128,
        (k % p) as u128,
        "AMM root failed for k={}, p={}",
        k,
        p
    );
    3
}

/// Cube roots of k mod q = p^e, written into `out`; returns the count.
/// Roots mod p are Newton-lifted with precision doubling. q must fit in
/// 63 bits. For p = 3 the answer is empty whenever e ≥ 2.
pub fn cuberoots_modq(k: u64, p: u64, e: u32, out: &mut [u64; 3]) -> usize {
    if e == 1 {
        return cuberoots_modp(k, p, out);
    }
    if p == 3 {
        return 0; // v_3(k) = 1 is not a cube valuation
    }
    let n = cuberoots_modp(k, p, out);
    let q = p.pow(e);
    for r in out.iter_mut().take(n) {
        *r = hensel_lift(k, p, e, q, *r);
    }
    n
}

/// Lift a root of x³ ≡ k from mod p to mod p^e (p ∤ 3k).
fn hensel_lift(k: u64, p: u64, e: u32, q: u64, mut r: u64) -> u64 {
    let mut prec = 1u32;
    let mut m = p;
    while prec < e {
        prec = (2 * prec).min(e);
        m = if prec == e { q } else { p.pow(prec) };
        let km = k % m;
        let r2 = mulmod(r, r, m);
        let f = submod(mulmod(r2, r, m), km, m);
        let fp_inv = inv_mod(mulmod(3 % m, r2, m), m)
            .expect("3r^2 not invertible in Hensel lift");
        r = submod(r, mulmod(f, fp_inv, m), m);
    }
    r
}

#[inline]
fn mulmod(a: u64, b: u64, m: u64) -> u64 {
    (a as u128 * b as u128 % m as u128) as u64
}

#[inline]
fn submod(a: u64, b: u64, m: u64) -> u64 {
    if a >= b {
        a - b
    } else {
        a + m - b
    }
}
