//! # Cubehunt — Core Library
//!
//! Candidate search engine for x³ + y³ + z³ = k over the integers. For an
//! admissible k (k ≤ 1000, k ≡ 3 or 6 mod 9), every solution satisfies
//! z³ ≡ k (mod d) for d = |x + y|, so candidates |z| ≤ zmax live in
//! arithmetic progressions of cube roots of k mod d. The engine walks
//! every admissible d ≤ dmax whose largest (coprime-to-k) prime factor
//! lies in [pmin, pmax], sharpens the progressions with cubic-reciprocity
//! constraints, and checks each surviving value for an integer (x, y)
//! completion.
//!
//! ## Module Organization
//!
//! **Arithmetic core**:
//! - [`modarith`] — Montgomery/Barrett modular arithmetic, batch
//!   inversion, CRT kernels
//! - [`cuberoots`] — cube roots of k mod prime powers (AMM + Hensel)
//! - [`sieve`] — wheel-30 and segmented prime sieves, Miller–Rabin
//!
//! **Engine**:
//! - [`tables`] — shared read-only precompute: divisor tables, cached
//!   cube roots, reciprocity residue tables, phase thresholds
//! - [`enumerate`] — recursive divisor enumeration with batched inversion
//! - [`dispatch`] — per-divisor classification and checker hand-off
//! - [`zcheck`] — progression checkers, auxiliary-prime lifting, and the
//!   exact candidate test
//! - [`worker`] — the six-phase per-worker prime driver
//!
//! **Coordination**:
//! - [`pipe`] — bounded single-producer/N-consumer prime stream
//! - [`coordinator`] — feeder + worker fan-out and supervision
//! - [`report`] — counters, vetoes, phase gating, candidate sink
//! - [`checkpoint`] — resumable run state
//! - [`params`] — validated run configuration
//!
//! ## Pipeline
//!
//! Every run follows **precompute → feed primes → enumerate divisors →
//! classify → check progressions → report**. Workers are independent
//! except for the shared pipe and the read-only tables.

pub mod checkpoint;
pub mod coordinator;
pub mod cuberoots;
pub mod dispatch;
pub mod enumerate;
pub mod modarith;
pub mod params;
pub mod pipe;
pub mod report;
pub mod sieve;
pub mod tables;
pub mod worker;
pub mod zcheck;

pub use coordinator::{run, Summary};
pub use params::RunParams;
