//! # Params — Run Configuration and Validation
//!
//! Typed run parameters parsed from the positional command line, with
//! every constraint check from the interface contract: admissible k,
//! ordered bounds, the subprime `p0xq` syntax, and the zmin sanity bound.
//! Configuration errors are the only fail-and-stop paths in the program;
//! everything after validation either runs to completion or aborts on an
//! invariant failure.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::cuberoots::has_cuberoots_modp;
use crate::sieve::is_prime_u64;
use crate::tables::{goodk, DMAX, ZMAXBITS};

/// zmax must be at least this multiple of dmax (zmin ≈ dmax/(2^(1/3)−1));
/// below it some divisors have no progression to check.
pub const ZMIN_RATIO: f64 = 3.847_322_101_863_072_6;

/// Expected final counters supplied on the command line for cross-checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpectedCounts {
    pub pcnt: Option<u64>,
    pub ccnt: Option<u64>,
    pub dcnt: Option<u64>,
    pub rcnt: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct RunParams {
    pub cores: usize,
    pub k: u64,
    pub pmin: u64,
    pub pmax: u64,
    pub dmax: u64,
    pub zmax: u128,
    /// Fixed outer prime for subprime mode; 1 when absent.
    pub p0: u64,
    /// Phase restriction: 0 = unrestricted, 1 = precompute only, 6 = all.
    pub opts: u32,
    pub checkpoint: Option<PathBuf>,
    pub expect: ExpectedCounts,
    /// Record every divisor processed (verification runs).
    pub capture_d: bool,
}

/// Parse a decimal (or 0x-prefixed hex) u128.
pub fn parse_u128(s: &str) -> Result<u128> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u128::from_str_radix(hex, 16).with_context(|| format!("bad hex integer {:?}", s))
    } else {
        s.parse::<u128>()
            .with_context(|| format!("bad integer {:?}", s))
    }
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

impl RunParams {
    /// Build and validate run parameters from the raw positional pieces.
    /// `extras` holds the optional phase restriction and `cnt=` checks.
    #[allow(clippy::too_many_arguments)]
    pub fn parse(
        cores: u32,
        k: u64,
        pmin_s: &str,
        pmax_s: &str,
        dmax: u64,
        zmax_s: &str,
        extras: &[String],
        checkpoint: Option<PathBuf>,
    ) -> Result<RunParams> {
        if !goodk(k) {
            bail!(
                "k={} must be a positive integer <= 1000 congruent to 3 or 6 mod 9",
                k
            );
        }
        if dmax == 0 || dmax > DMAX {
            bail!("dmax={} must be in [1, {}]", dmax, DMAX);
        }

        let mut opts = 0u32;
        let mut expect = ExpectedCounts::default();
        for extra in extras {
            if let Some((key, val)) = extra.split_once('=') {
                let v = val
                    .parse::<u64>()
                    .with_context(|| format!("bad counter check {:?}", extra))?;
                match key {
                    "pcnt" => expect.pcnt = Some(v),
                    "ccnt" => expect.ccnt = Some(v),
                    "dcnt" => expect.dcnt = Some(v),
                    "rcnt" => expect.rcnt = Some(v),
                    _ => bail!("unknown counter check {:?}", extra),
                }
            } else {
                opts = extra
                    .parse::<u32>()
                    .with_context(|| format!("bad option {:?}", extra))?;
                if opts > 6 {
                    bail!("option {} must be in 1..6", opts);
                }
            }
        }

        // subprime syntax: pmin = "p0xq", pmax = "p0xr" with r >= q
        let (mut pmin, pmax, p0) = if let Some((p0_s, q_s)) = pmin_s.split_once('x') {
            let Some((p0_s2, r_s)) = pmax_s.split_once('x') else {
                bail!(
                    "pmax={} not valid for pmin={} (pmin=p0xq requires pmax=p0xr)",
                    pmax_s,
                    pmin_s
                );
            };
            if p0_s != p0_s2 {
                bail!(
                    "pmax={} not valid for pmin={} (outer primes differ)",
                    pmax_s,
                    pmin_s
                );
            }
            let p0 = p0_s
                .parse::<u64>()
                .with_context(|| format!("bad outer prime {:?}", p0_s))?;
            if p0 < 2 {
                bail!("p0={} must be at least 2", p0);
            }
            let pmin = q_s.parse::<u64>().context("bad subprime pmin")?;
            let pmax = r_s.parse::<u64>().context("bad subprime pmax")?;
            if pmax > p0 {
                bail!("we must have pmax={}x{} <= {}x{}", p0, pmax, p0, p0);
            }
            if opts != 0 {
                bail!("phase options are not permitted in subprime mode");
            }
            (pmin, pmax, p0)
        } else {
            let pmin = pmin_s
                .parse::<u64>()
                .with_context(|| format!("bad pmin {:?}", pmin_s))?;
            let pmax = pmax_s
                .parse::<u64>()
                .with_context(|| format!("bad pmax {:?}", pmax_s))?;
            // a single small prime with several cores: fix it as the outer
            // prime and parallelize over the second-largest instead
            if cores > 1 && pmin == pmax && pmax <= isqrt(dmax) {
                (2, pmax, pmin)
            } else {
                (pmin, pmax, 1)
            }
        };

        if p0 > 1 {
            if !is_prime_u64(p0) {
                warn!(p0, "p0 is not prime");
            } else if p0 % 3 == 1 && !has_cuberoots_modp(k, p0) {
                warn!(p0, k, "there are no cube roots of k mod p0");
            }
            if k % p0 == 0 {
                bail!("p0={} divides k={}; this case is not supported", p0, k);
            }
            if p0 > isqrt(dmax) {
                bail!("we must have p0={} <= sqrt(dmax)={}", p0, isqrt(dmax));
            }
        }

        if pmin < 2 {
            pmin = 2;
        }
        if pmax < pmin {
            bail!("we must have pmin={} <= pmax={}", pmin, pmax);
        }

        let zmax = parse_u128(zmax_s)?;
        if zmax >= (1u128 << ZMAXBITS) {
            bail!("zmax={} cannot reach 2^{}", zmax, ZMAXBITS);
        }
        if (p0.max(1) as u128) * (pmax as u128) > dmax as u128 || (dmax as u128) > zmax {
            bail!(
                "we must have pmin={} <= pmax={} <= dmax={} <= zmax={}",
                pmin,
                pmax,
                dmax,
                zmax
            );
        }

        let zmin = ZMIN_RATIO * dmax as f64;
        if zmin > zmax as f64 {
            warn!(
                dmax,
                zmin = format_args!("{:.0}", zmin),
                "zmax is below zmin; increase zmax or decrease dmax"
            );
            if opts == 0 {
                bail!("zmax={} is below zmin={:.0} for dmax={}", zmax, zmin, dmax);
            }
        }

        let cores = if cores == 0 {
            let n = num_cpus::get();
            tracing::info!(threads = n, "using all logical processors");
            n
        } else {
            let n = num_cpus::get();
            if cores as usize > n {
                warn!(cores, available = n, "more workers than processors");
            }
            cores as usize
        };

        Ok(RunParams {
            cores,
            k,
            pmin,
            pmax,
            dmax,
            zmax,
            p0,
            opts,
            checkpoint,
            expect,
            capture_d: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(
        cores: u32,
        k: u64,
        pmin: &str,
        pmax: &str,
        dmax: u64,
        zmax: &str,
    ) -> Result<RunParams> {
        RunParams::parse(cores, k, pmin, pmax, dmax, zmax, &[], None)
    }

    // ── Basic validation ───────────────────────────────────────────────

    #[test]
    fn accepts_good_configuration() {
        let p = parse(1, 42, "2", "1000", 10_000, "1000000000000").unwrap();
        assert_eq!(p.k, 42);
        assert_eq!((p.pmin, p.pmax), (2, 1000));
        assert_eq!(p.p0, 1);
        assert_eq!(p.opts, 0);
    }

    #[test]
    fn rejects_bad_k() {
        for k in [0u64, 1, 2, 4, 9, 18, 1001, 1000] {
            assert!(parse(1, k, "2", "10", 100, "1000000").is_err(), "k={}", k);
        }
    }

    #[test]
    fn rejects_unordered_bounds() {
        assert!(parse(1, 3, "100", "10", 1000, "1000000").is_err());
        assert!(parse(1, 3, "2", "2000", 1000, "1000000").is_err()); // pmax > dmax
        assert!(parse(1, 3, "2", "10", 1000, "999").is_err()); // zmax < dmax
    }

    /// The zmin bound is fatal without options but only a warning with
    /// a phase restriction set.
    #[test]
    fn zmin_bound() {
        assert!(parse(1, 3, "2", "10", 1000, "1000").is_err());
        let p = RunParams::parse(1, 3, "2", "10", 1000, "1000", &["1".into()], None).unwrap();
        assert_eq!(p.opts, 1);
    }

    #[test]
    fn parses_u128_values() {
        assert_eq!(parse_u128("0").unwrap(), 0);
        assert_eq!(parse_u128("123456789012345678901234567").unwrap(), 123456789012345678901234567);
        assert_eq!(parse_u128("0xff").unwrap(), 255);
        assert!(parse_u128("12x").is_err());
    }

    // ── Subprime syntax ────────────────────────────────────────────────

    #[test]
    fn subprime_syntax() {
        let p = parse(2, 3, "7x2", "7x5", 10_000, "1000000000").unwrap();
        assert_eq!(p.p0, 7);
        assert_eq!((p.pmin, p.pmax), (2, 5));
    }

    #[test]
    fn subprime_rejects_mismatched_outer() {
        assert!(parse(2, 3, "7x2", "11x5", 10_000, "1000000000").is_err());
        assert!(parse(2, 3, "7x2", "5", 10_000, "1000000000").is_err());
    }

    #[test]
    fn subprime_rejects_r_above_p0() {
        assert!(parse(2, 3, "7x2", "7x11", 10_000, "1000000000").is_err());
    }

    #[test]
    fn subprime_rejects_p0_dividing_k() {
        assert!(parse(2, 42, "7x2", "7x5", 10_000, "1000000000").is_err());
    }

    #[test]
    fn subprime_rejects_large_p0() {
        assert!(parse(2, 3, "211x2", "211x5", 10_000, "100000000000").is_err());
    }

    /// cores > 1 with pmin = pmax a small prime silently selects
    /// subprime mode.
    #[test]
    fn auto_subprime() {
        let p = parse(4, 3, "7", "7", 10_000, "1000000000").unwrap();
        assert_eq!(p.p0, 7);
        assert_eq!((p.pmin, p.pmax), (2, 7));
        // single-core keeps the plain interpretation
        let p = parse(1, 3, "7", "7", 10_000, "1000000000").unwrap();
        assert_eq!(p.p0, 1);
        assert_eq!((p.pmin, p.pmax), (7, 7));
    }

    // ── Extras ─────────────────────────────────────────────────────────

    #[test]
    fn parses_counter_checks() {
        let extras: Vec<String> = vec!["pcnt=10".into(), "dcnt=55".into(), "3".into()];
        let p =
            RunParams::parse(1, 3, "2", "10", 1000, "1000000", &extras, None).unwrap();
        assert_eq!(p.expect.pcnt, Some(10));
        assert_eq!(p.expect.dcnt, Some(55));
        assert_eq!(p.expect.ccnt, None);
        assert_eq!(p.opts, 3);
    }

    #[test]
    fn rejects_bad_extras() {
        let extras: Vec<String> = vec!["7".into()];
        assert!(RunParams::parse(1, 3, "2", "10", 1000, "1000000", &extras, None).is_err());
        let extras: Vec<String> = vec!["qcnt=1".into()];
        assert!(RunParams::parse(1, 3, "2", "10", 1000, "1000000", &extras, None).is_err());
    }
}
