//! # Modarith — 64/128-bit Modular Arithmetic Primitives
//!
//! Core arithmetic used by every stage of the search. Provides:
//!
//! 1. **Montgomery multiplication** (`MontgomeryCtx`) — replaces u128 division
//!    (35–90 cycles) with multiply+shift (4–6 cycles) for odd moduli that
//!    change rarely but are reused for many multiplications and inversions.
//! 2. **Batch modular inversion** (`MontgomeryCtx::inv_array`) — Montgomery's
//!    trick: one inversion plus 3·(n−1) multiplications inverts up to
//!    `IBATCH` residues at once.
//! 3. **Barrett reduction** (`b32_inv` / `b32_red`) for small fixed 32-bit
//!    moduli (the 9/18/126/162 auxiliaries and cached cofactors), taking the
//!    modulus and a precomputed reciprocal on every call.
//! 4. **CRT combination**: `b32_crt64` for a 64-bit modulus times a 32-bit
//!    cofactor, and `fcrt64` consuming the precomputed coefficient
//!    u = a·(a⁻¹ mod d) − 1 so the per-pair cost is one widening multiply.
//!
//! All routines are pure. Non-coprime inputs to the CRT and inverse routines
//! produce an undefined result; callers assert coprimality. Products are
//! widened to u128 where they can reach 2^126.
//!
//! ## References
//!
//! - Peter L. Montgomery, "Modular Multiplication Without Trial Division",
//!   Mathematics of Computation, 44(170):519–521, 1985.
//! - Paul Barrett, "Implementing the Rivest Shamir and Adleman Public Key
//!   Encryption Algorithm on a Standard Digital Signal Processor", 1986.

/// Modular exponentiation: base^exp mod modulus.
/// Uses u128 intermediates to avoid overflow for moduli up to ~2^63.
pub fn pow_mod(mut base: u64, mut exp: u64, modulus: u64) -> u64 {
    if modulus == 1 {
        return 0;
    }
    let mut result: u64 = 1;
    base %= modulus;
    while exp > 0 {
        if exp & 1 == 1 {
            result = (result as u128 * base as u128 % modulus as u128) as u64;
        }
        exp >>= 1;
        base = (base as u128 * base as u128 % modulus as u128) as u64;
    }
    result
}

/// Greatest common divisor.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Modular inverse by extended Euclid, valid for any modulus m > 1.
/// Returns None when gcd(a, m) > 1.
pub fn inv_mod(a: u64, m: u64) -> Option<u64> {
    let (mut r0, mut r1) = (m as i128, (a % m) as i128);
    let (mut t0, mut t1) = (0i128, 1i128);
    while r1 != 0 {
        let q = r0 / r1;
        (r0, r1) = (r1, r0 - q * r1);
        (t0, t1) = (t1, t0 - q * t1);
    }
    if r0 != 1 {
        return None;
    }
    Some(t0.rem_euclid(m as i128) as u64)
}

/// Trial-division factorization of a u64 into (prime, exponent) pairs.
pub fn factor_u64(mut n: u64) -> Vec<(u64, u32)> {
    let mut factors = Vec::new();
    let mut d = 2u64;
    while d * d <= n {
        if n % d == 0 {
            let mut exp = 0u32;
            while n % d == 0 {
                n /= d;
                exp += 1;
            }
            factors.push((d, exp));
        }
        d += 1;
    }
    if n > 1 {
        factors.push((n, 1));
    }
    factors
}

/// Montgomery multiplication context for a fixed odd modulus.
///
/// All arithmetic is performed in Montgomery form: ā = a·R mod n, where
/// R = 2^64. The modulus need not be prime; `inv_array` and `inv` use
/// extended Euclid so composite (odd) divisors work throughout the
/// enumeration.
#[derive(Clone, Copy, Debug)]
pub struct MontgomeryCtx {
    /// The modulus (must be odd, > 1).
    pub n: u64,
    /// -n⁻¹ mod 2^64 (precomputed via Hensel lifting).
    n_prime: u64,
    /// R mod n (Montgomery form of 1).
    r_mod_n: u64,
    /// R² mod n (used for converting to Montgomery form).
    r2_mod_n: u64,
}

impl MontgomeryCtx {
    /// Create a Montgomery context for the given odd modulus n > 1.
    pub fn new(n: u64) -> Self {
        debug_assert!(n > 1 && n & 1 == 1, "Montgomery requires odd modulus > 1");

        // Hensel lifting: n⁻¹ ≡ 1 (mod 2) for odd n, each iteration doubles
        // precision. 6 iterations: 2^1 → 2^2 → 2^4 → 2^8 → 2^16 → 2^32 → 2^64.
        let mut inv: u64 = 1;
        for _ in 0..6 {
            inv = inv.wrapping_mul(2u64.wrapping_sub(n.wrapping_mul(inv)));
        }
        let n_prime = inv.wrapping_neg();

        let r_mod_n = ((1u128 << 64) % n as u128) as u64;
        let r2_mod_n = ((r_mod_n as u128 * r_mod_n as u128) % n as u128) as u64;

        MontgomeryCtx {
            n,
            n_prime,
            r_mod_n,
            r2_mod_n,
        }
    }

    /// Convert a normal value to Montgomery form: ā = a·R mod n.
    #[inline]
    pub fn to_mont(&self, a: u64) -> u64 {
        self.mul(a % self.n, self.r2_mod_n)
    }

    /// Convert from Montgomery form back to normal: a = ā·R⁻¹ mod n.
    #[inline]
    pub fn from_mont(&self, a: u64) -> u64 {
        self.reduce(a as u128)
    }

    /// Montgomery reduction (REDC): compute t·R⁻¹ mod n.
    #[inline]
    fn reduce(&self, t: u128) -> u64 {
        let m = (t as u64).wrapping_mul(self.n_prime);
        let u = t + (m as u128) * (self.n as u128);
        let result = (u >> 64) as u64;
        if result >= self.n {
            result - self.n
        } else {
            result
        }
    }

    /// Montgomery multiplication: a·b·R⁻¹ mod n, inputs and output in
    /// Montgomery form.
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce((a as u128) * (b as u128))
    }

    /// The Montgomery form of 1 (= R mod n).
    #[inline]
    pub fn one(&self) -> u64 {
        self.r_mod_n
    }

    /// Modular exponentiation in Montgomery form.
    pub fn pow_mod(&self, base: u64, mut exp: u64) -> u64 {
        let mut result = self.r_mod_n;
        let mut b = base;
        while exp > 0 {
            if exp & 1 == 1 {
                result = self.mul(result, b);
            }
            exp >>= 1;
            if exp > 0 {
                b = self.mul(b, b);
            }
        }
        result
    }

    /// Modular inverse of a Montgomery-form value, via extended Euclid so
    /// composite moduli are fine. Returns None when gcd(a, n) > 1.
    pub fn inv(&self, a_mont: u64) -> Option<u64> {
        let a = self.from_mont(a_mont);
        inv_mod(a, self.n).map(|i| self.to_mont(i))
    }

    /// Batch inversion (Montgomery's trick) of Montgomery-form values,
    /// in place: one inversion plus 3·(n−1) multiplications.
    ///
    /// Every value must be invertible mod n; a non-invertible entry makes
    /// the whole batch undefined (callers guarantee coprimality).
    pub fn inv_array(&self, vals: &mut [u64]) {
        let m = vals.len();
        if m == 0 {
            return;
        }
        let mut prefix = vec![0u64; m];
        prefix[0] = vals[0];
        for i in 1..m {
            prefix[i] = self.mul(prefix[i - 1], vals[i]);
        }
        let mut acc = self
            .inv(prefix[m - 1])
            .expect("batch inversion of non-invertible residue");
        for i in (1..m).rev() {
            let v = vals[i];
            vals[i] = self.mul(acc, prefix[i - 1]);
            acc = self.mul(acc, v);
        }
        vals[0] = acc;
    }
}

/// Barrett reciprocal for a 32-bit modulus: ⌊(2^64 − 1)/m⌋.
#[inline]
pub fn b32_inv(m: u32) -> u64 {
    debug_assert!(m > 1);
    u64::MAX / m as u64
}

/// Barrett reduction: x mod m for a 64-bit x and 32-bit m, using the
/// precomputed reciprocal from `b32_inv`. The approximate quotient
/// undershoots by at most 2, fixed by conditional subtractions.
#[inline]
pub fn b32_red(x: u64, m: u32, minv: u64) -> u32 {
    let q = ((x as u128 * minv as u128) >> 64) as u64;
    let mut r = x - q * m as u64;
    while r >= m as u64 {
        r -= m as u64;
    }
    r as u32
}

/// CRT of z1 mod m1 (64-bit) and z2 mod m2 (32-bit), m1·m2 < 2^63.
/// `inv12` is m1⁻¹ mod m2 and `m2inv` the Barrett reciprocal of m2.
#[inline]
pub fn b32_crt64(z1: u64, m1: u64, z2: u32, m2: u32, inv12: u32, m2inv: u64) -> u64 {
    let r1 = b32_red(z1, m2, m2inv);
    let mut t = z2 + m2 - r1;
    if t >= m2 {
        t -= m2;
    }
    let t = b32_red(t as u64 * inv12 as u64, m2, m2inv);
    z1 + m1 * t as u64
}

/// CRT of za mod a and zd mod d with ad = a·d < 2^63, consuming the
/// precomputed coefficient u = a·(a⁻¹ mod d) − 1. The intermediate
/// product can reach 2^126 and is carried in u128.
#[inline]
pub fn fcrt64(u: u64, za: u64, zd: u64, ad: u64) -> u64 {
    let t = if zd >= za { zd - za } else { zd + ad - za };
    ((t as u128 * u as u128 + t as u128 + za as u128) % ad as u128) as u64
}

/// CRT of z mod m with r7 mod 7, gcd(m, 7) = 1. Used when lifting
/// auxiliary-progression residues to z ≡ 0 (mod 7).
#[inline]
pub fn crt7(z: u32, m: u32, r7: u32) -> u32 {
    // inverse of t mod 7, indexed by t in 1..7
    const INV7: [u32; 7] = [0, 1, 4, 5, 2, 3, 6];
    let zm7 = z % 7;
    let t = (r7 + 7 - zm7) % 7;
    z + m * (t * INV7[(m % 7) as usize] % 7)
}

/// Inverse of a mod 7 (a not divisible by 7).
#[inline]
pub fn inv7(a: u64) -> u32 {
    const INV7: [u32; 7] = [0, 1, 4, 5, 2, 3, 6];
    INV7[(a % 7) as usize]
}
