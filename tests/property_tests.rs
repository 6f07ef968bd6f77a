//! Property-based tests using proptest.
//!
//! These tests verify mathematical invariants hold across random inputs.
//! Run with: cargo test --test property_tests

use proptest::prelude::*;
use rug::Integer;

use cubehunt::cuberoots::{cuberoots_modp, cuberoots_modq};
use cubehunt::modarith::{
    b32_crt64, b32_inv, b32_red, fcrt64, gcd, inv_mod, pow_mod, MontgomeryCtx,
};
use cubehunt::sieve::{generate_primes, is_prime_u64};

// --- Modular arithmetic ---

proptest! {
    /// pow_mod(b, e, m) agrees with big-integer exponentiation.
    #[test]
    fn prop_pow_mod_matches_big_int(
        base in 1u64..1_000_000,
        exp in 0u64..1000,
        modulus in 2u64..1_000_000,
    ) {
        let result = pow_mod(base, exp, modulus);
        let expected = Integer::from(base)
            .pow_mod(&Integer::from(exp), &Integer::from(modulus))
            .unwrap()
            .to_u64()
            .unwrap();
        prop_assert_eq!(result, expected);
    }

    /// inv_mod returns a true inverse exactly when gcd(a, m) = 1.
    #[test]
    fn prop_inv_mod_roundtrip(a in 1u64..100_000, m in 2u64..100_000) {
        match inv_mod(a, m) {
            Some(inv) => {
                prop_assert_eq!(gcd(a, m), 1);
                prop_assert_eq!(a as u128 * inv as u128 % m as u128, 1);
            }
            None => prop_assert!(gcd(a, m) > 1),
        }
    }

    /// Montgomery multiplication agrees with naive multiplication for any
    /// odd modulus, prime or not.
    #[test]
    fn prop_mont_mul_matches_naive(
        a in 0u64..u64::MAX / 2,
        b in 0u64..u64::MAX / 2,
        m_half in 1u64..(1u64 << 62),
    ) {
        let m = 2 * m_half + 1; // odd, > 1
        let ctx = MontgomeryCtx::new(m);
        let expected = (a as u128 * b as u128 % m as u128) as u64;
        let got = ctx.from_mont(ctx.mul(ctx.to_mont(a), ctx.to_mont(b)));
        prop_assert_eq!(got, expected);
    }

    /// Batch inversion equals element-wise inversion for any batch size
    /// up to the IBATCH maximum.
    #[test]
    fn prop_batch_inverse_matches_elementwise(
        seed in 1u64..1_000_000,
        len in 1usize..=256,
    ) {
        let m = 1_000_003u64; // prime, so everything nonzero is invertible
        let ctx = MontgomeryCtx::new(m);
        let vals: Vec<u64> = (0..len as u64).map(|i| (seed + i * 7919) % (m - 1) + 1).collect();
        let mut batch: Vec<u64> = vals.iter().map(|&v| ctx.to_mont(v)).collect();
        ctx.inv_array(&mut batch);
        for (i, &v) in vals.iter().enumerate() {
            let want = inv_mod(v, m).unwrap();
            prop_assert_eq!(ctx.from_mont(batch[i]), want);
        }
    }

    /// Barrett reduction equals the native remainder.
    #[test]
    fn prop_b32_red_matches_native(x in any::<u64>(), m in 2u32..u32::MAX) {
        prop_assert_eq!(b32_red(x, m, b32_inv(m)) as u64, x % m as u64);
    }
}

// --- CRT round-trips ---

proptest! {
    /// b32_crt64 produces the unique residue with both projections.
    #[test]
    fn prop_b32_crt64_roundtrip(
        z1 in 0u64..1_000_003,
        z2 in 0u32..97,
        m1_idx in 0usize..4,
    ) {
        let m1 = [1_000_003u64, 999_983, 65_537, 4099][m1_idx];
        let m2 = 97u32;
        let z1 = z1 % m1;
        let m2inv = b32_inv(m2);
        let inv12 = inv_mod(m1 % m2 as u64, m2 as u64).unwrap() as u32;
        let x = b32_crt64(z1, m1, z2, m2, inv12, m2inv);
        prop_assert!(x < m1 * m2 as u64);
        prop_assert_eq!(x % m1, z1);
        prop_assert_eq!(x % m2 as u64, z2 as u64);
    }

    /// fcrt64 with the precomputed coefficient matches both projections.
    #[test]
    fn prop_fcrt64_roundtrip(
        za in 0u64..343,
        zd in 0u64..1_000_003,
        a_idx in 0usize..3,
    ) {
        let a = [343u64, 128, 3125][a_idx];
        let d = 1_000_003u64;
        let za = za % a;
        let ad = a * d;
        let u = a * inv_mod(a, d).unwrap() - 1;
        let x = fcrt64(u, za, zd, ad);
        prop_assert!(x < ad);
        prop_assert_eq!(x % a, za);
        prop_assert_eq!(x % d, zd);
    }
}

// --- Cube roots ---

proptest! {
    /// Every root returned cubes to k, and the count matches brute force,
    /// across the primes below 200.
    #[test]
    fn prop_cuberoots_match_brute_force(k in 1u64..1000, p_idx in 0usize..45) {
        let primes = generate_primes(200);
        let p = primes[p_idx];
        let mut out = [0u64; 3];
        let n = cuberoots_modp(k, p, &mut out);
        let brute: Vec<u64> = (0..p)
            .filter(|&r| (r as u128).pow(3) % p as u128 == (k % p) as u128)
            .collect();
        if p != 3 && k % p == 0 {
            prop_assert_eq!(n, 0); // p | k is the divisor table's path
        } else {
            let mut got = out[..n].to_vec();
            got.sort_unstable();
            prop_assert_eq!(got, brute);
        }
    }

    /// Lifted roots mod p^e cube to k mod p^e.
    #[test]
    fn prop_lifted_roots_cube_to_k(
        k in 1u64..1000,
        p_idx in 0usize..8,
        e in 1u32..5,
    ) {
        let p = [2u64, 5, 7, 11, 13, 17, 19, 23][p_idx];
        prop_assume!(k % p != 0);
        let q = p.pow(e);
        let mut out = [0u64; 3];
        let n = cuberoots_modq(k, p, e, &mut out);
        for &r in &out[..n] {
            let r3 = (Integer::from(r).pow_mod(&Integer::from(3), &Integer::from(q))).unwrap();
            prop_assert_eq!(r3, Integer::from(k % q));
        }
    }
}

// --- Primality ---

proptest! {
    /// Miller–Rabin agrees with trial division on arbitrary 32-bit values.
    #[test]
    fn prop_is_prime_matches_trial_division(n in 2u64..1_000_000) {
        let trial = (2..).take_while(|d| d * d <= n).all(|d| n % d != 0);
        prop_assert_eq!(is_prime_u64(n), trial);
    }
}
