use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Resumable run state. The first five fields identify the run; a resume
/// rejects any mismatch and continues from `last_prime` + 1. The counters
/// describe exactly the primes up to `last_prime`, making resumed totals
/// identical to an uninterrupted run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub pmin: u64,
    pub pmax: u64,
    pub dmax: u64,
    pub zmax: u128,
    /// The phase-restriction option of the run.
    pub phase: u32,
    pub last_prime: u64,
    pub pcnt: u64,
    pub ccnt: u64,
    pub dcnt: u64,
    pub rcnt: u64,
}

impl Checkpoint {
    /// Reject a checkpoint written by a different run configuration.
    pub fn validate(&self, pmin: u64, pmax: u64, dmax: u64, zmax: u128, phase: u32) -> Result<()> {
        if self.pmin != pmin
            || self.pmax != pmax
            || self.dmax != dmax
            || self.zmax != zmax
            || self.phase != phase
        {
            bail!(
                "checkpoint mismatch: file describes pmin={} pmax={} dmax={} zmax={} phase={}, \
                 run has pmin={} pmax={} dmax={} zmax={} phase={}",
                self.pmin,
                self.pmax,
                self.dmax,
                self.zmax,
                self.phase,
                pmin,
                pmax,
                dmax,
                zmax,
                phase
            );
        }
        Ok(())
    }
}

pub fn save(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let json = serde_json::to_string_pretty(checkpoint)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load(path: &Path) -> Option<Checkpoint> {
    let data = fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

pub fn clear(path: &Path) {
    let _ = fs::remove_file(path);
}
