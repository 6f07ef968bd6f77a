//! End-to-end engine scenarios: full runs through the coordinator with
//! divisor capture, cross-checked against brute force and against each
//! other (single- vs multi-worker, fresh vs resumed).

use std::path::PathBuf;

use cubehunt::checkpoint::{self, Checkpoint};
use cubehunt::modarith::factor_u64;
use cubehunt::params::{ExpectedCounts, RunParams};
use cubehunt::tables::goodk;

fn params(cores: usize, k: u64, pmin: u64, pmax: u64, dmax: u64, zmax: u128) -> RunParams {
    RunParams {
        cores,
        k,
        pmin,
        pmax,
        dmax,
        zmax,
        p0: 1,
        opts: 0,
        checkpoint: None,
        expect: ExpectedCounts::default(),
        capture_d: true,
    }
}

/// Brute-force reference: admissible d ≤ dmax whose largest
/// coprime-to-k prime factor lies in [pmin, pmax].
fn expected_ds(k: u64, dmax: u64, pmin: u64, pmax: u64) -> Vec<u64> {
    let mut out = Vec::new();
    'next: for d in 2..=dmax {
        let factors = factor_u64(d);
        let mut coprime = Vec::new();
        for &(q, e) in &factors {
            if q == 3 {
                continue 'next;
            }
            if k % q == 0 {
                let mut kv = 0;
                let mut kk = k;
                while kk % q == 0 {
                    kk /= q;
                    kv += 1;
                }
                if e != kv {
                    continue 'next;
                }
            } else {
                coprime.push(q);
            }
        }
        let Some(&lpf) = coprime.last() else {
            continue;
        };
        if lpf < pmin || lpf > pmax {
            continue;
        }
        if (0..d).any(|r| (r as u128).pow(3) % d as u128 == (k % d) as u128) {
            out.push(d);
        }
    }
    out
}

fn expected_pcnt(k: u64, pmin: u64, pmax: u64) -> u64 {
    cubehunt::sieve::primes_in_range(pmin, pmax)
        .into_iter()
        .filter(|&p| p != 3 && k % p != 0 && cubehunt::cuberoots::has_cuberoots_modp(k, p))
        .count() as u64
}

/// Scenario 1: cores = 1, k = 3, small range. The emitted divisor set is
/// exactly the admissible set, each d exactly once.
#[test]
fn scenario_small_k3() {
    assert!(goodk(3));
    let summary = cubehunt::run(&params(1, 3, 2, 10, 100, 1_000_000)).unwrap();
    let mut got = summary.d_log.unwrap();
    got.sort_unstable();
    let before = got.len();
    got.dedup();
    assert_eq!(before, got.len(), "a divisor was emitted twice");
    assert_eq!(got, expected_ds(3, 100, 2, 10));
    assert_eq!(summary.counts.dcnt, before as u64);
}

/// Scenario 2: k = 42: pcnt equals the prime count minus the primes
/// without cube roots of 42, and the divisor multiset matches brute force.
#[test]
fn scenario_k42_counts() {
    let summary = cubehunt::run(&params(1, 42, 2, 200, 2000, 10_000_000)).unwrap();
    assert_eq!(summary.counts.pcnt, expected_pcnt(42, 2, 200));
    let mut got = summary.d_log.unwrap();
    got.sort_unstable();
    let before = got.len();
    got.dedup();
    assert_eq!(before, got.len());
    assert_eq!(got, expected_ds(42, 2000, 2, 200));
}

/// Scenario 3: four workers produce exactly the same aggregates as one,
/// despite consuming the pipe in a different interleaving.
#[test]
fn scenario_parallel_matches_serial() {
    let serial = cubehunt::run(&params(1, 42, 2, 200, 2000, 10_000_000)).unwrap();
    let parallel = cubehunt::run(&params(4, 42, 2, 200, 2000, 10_000_000)).unwrap();
    assert_eq!(serial.counts, parallel.counts);
    let mut a = serial.d_log.unwrap();
    let mut b = parallel.d_log.unwrap();
    a.sort_unstable();
    b.sort_unstable();
    assert_eq!(a, b);
    assert_eq!(serial.hits.len(), parallel.hits.len());
}

/// Scenario 4: subprime mode — every divisor is divisible by p0 = 7 and
/// the second-largest coprime prime stays within the pipe range.
#[test]
fn scenario_subprime() {
    let mut p = params(2, 3, 2, 5, 10_000, 1_000_000_000);
    p.p0 = 7;
    let summary = cubehunt::run(&p).unwrap();
    let got = summary.d_log.unwrap();
    assert!(!got.is_empty());
    for &d in &got {
        assert_eq!(d % 7, 0, "d={} not divisible by the outer prime", d);
        let second = factor_u64(d)
            .into_iter()
            .map(|(q, _)| q)
            .filter(|&q| q != 7)
            .max();
        if let Some(q) = second {
            assert!(q <= 5, "second prime {} out of range for d={}", q, d);
        }
    }
}

/// Scenario 5: a range entirely inside the bigprime phase — every divisor
/// is the prime itself, and the cached progression length l satisfies
/// (l−1)·m·p ≤ zmax.
#[test]
fn scenario_bigprime_only() {
    let (k, dmax, zmax) = (33u64, 100_000u64, 400_000u128);
    let (pmin, pmax) = (50_051u64, 50_151u64);
    let summary = cubehunt::run(&params(1, k, pmin, pmax, dmax, zmax)).unwrap();
    let got = summary.d_log.unwrap();
    assert!(!got.is_empty());
    let primes = cubehunt::sieve::primes_in_range(pmin, pmax);
    for &d in &got {
        assert!(primes.binary_search(&d).is_ok(), "d={} is not a phase-6 prime", d);
        // with m = 18 the progressions collapse to a couple of values
        let l = (zmax + 18 * d as u128 - 1) / (18 * d as u128);
        assert!((l.saturating_sub(1)) * 18 * d as u128 <= zmax);
    }
}

/// Scenario 6: checkpoint round-trip. Counters for the primes below a cut
/// are identical whether computed in a truncated run or as the committed
/// prefix, so resuming from a crafted mid-run checkpoint reproduces the
/// uninterrupted totals exactly.
#[test]
fn scenario_checkpoint_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("run.checkpoint");
    let (k, dmax, zmax) = (42u64, 2000u64, 10_000_000u128);

    // uninterrupted reference
    let full = cubehunt::run(&params(1, k, 2, 200, dmax, zmax)).unwrap();
    // the prefix up to 97: counters of a run over [2, 97]
    let prefix = cubehunt::run(&params(1, k, 2, 97, dmax, zmax)).unwrap();

    // a checkpoint as if the [2, 200] run died right after finishing 97
    checkpoint::save(
        &path,
        &Checkpoint {
            pmin: 2,
            pmax: 200,
            dmax,
            zmax,
            phase: 0,
            last_prime: 97,
            pcnt: prefix.counts.pcnt,
            ccnt: prefix.counts.ccnt,
            dcnt: prefix.counts.dcnt,
            rcnt: prefix.counts.rcnt,
        },
    )
    .unwrap();

    let mut resume_params = params(1, k, 2, 200, dmax, zmax);
    resume_params.capture_d = false;
    resume_params.checkpoint = Some(path.clone());
    let resumed = cubehunt::run(&resume_params).unwrap();
    assert_eq!(resumed.counts, full.counts, "resume must be idempotent");

    // a second resume of the completed run adds nothing
    let again = cubehunt::run(&resume_params).unwrap();
    assert_eq!(again.counts, full.counts);
}

/// A checkpoint from a different configuration is rejected.
#[test]
fn checkpoint_mismatch_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("run.checkpoint");
    checkpoint::save(
        &path,
        &Checkpoint {
            pmin: 2,
            pmax: 100,
            dmax: 999,
            zmax: 1_000_000,
            phase: 0,
            last_prime: 13,
            pcnt: 0,
            ccnt: 0,
            dcnt: 0,
            rcnt: 0,
        },
    )
    .unwrap();
    let mut p = params(1, 42, 2, 100, 1000, 1_000_000);
    p.capture_d = false;
    p.checkpoint = Some(path);
    assert!(cubehunt::run(&p).is_err());
}

/// Counter cross-checks: correct predictions pass, wrong ones fail.
#[test]
fn counter_cross_checks() {
    let reference = cubehunt::run(&params(1, 3, 2, 10, 100, 1_000_000)).unwrap();
    let mut p = params(1, 3, 2, 10, 100, 1_000_000);
    p.capture_d = false;
    p.expect.pcnt = Some(reference.counts.pcnt);
    p.expect.dcnt = Some(reference.counts.dcnt);
    assert!(cubehunt::run(&p).is_ok());
    p.expect.dcnt = Some(reference.counts.dcnt + 1);
    assert!(cubehunt::run(&p).is_err());
}

/// Every reported hit satisfies x³ + y³ + z³ = k with |x + y| = d.
#[test]
fn hits_satisfy_the_equation() {
    let summary = cubehunt::run(&params(1, 12, 2, 100, 100, 10_000)).unwrap();
    assert!(
        summary.hits.iter().any(|h| h.z == "-11"),
        "the (7, 10, -11) representation of 12 must be found"
    );
    for hit in &summary.hits {
        let x: i128 = hit.x.parse().unwrap();
        let y: i128 = hit.y.parse().unwrap();
        let z: i128 = hit.z.parse().unwrap();
        assert_eq!(x.pow(3) + y.pow(3) + z.pow(3), 12);
        assert_eq!((x + y).unsigned_abs(), hit.d as u128);
    }
}
