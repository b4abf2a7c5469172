//! Resource sampler
//!
//! Reads system-wide CPU and memory counters. The executor only sees the
//! [`ResourceSampler`] trait; each platform supplies its own backend.
//!
//! Counters are read-only OS state, so one sampler instance is shared by
//! every concurrently running executor without coordination.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Cumulative CPU time counters, in clock ticks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    pub busy: u64,
    pub total: u64,
}

impl CpuCounters {
    /// CPU utilization percent between an earlier snapshot and this one
    ///
    /// Returns 0.0 when no time has passed between the snapshots.
    pub fn load_since(&self, earlier: &CpuCounters) -> f64 {
        let total = self.total.saturating_sub(earlier.total);
        if total == 0 {
            return 0.0;
        }

        let busy = self.busy.saturating_sub(earlier.busy).min(total);
        busy as f64 / total as f64 * 100.0
    }
}

/// Source of system-wide resource readings
pub trait ResourceSampler: Send + Sync {
    /// Reads the cumulative CPU counters
    fn cpu_counters(&self) -> Result<CpuCounters>;

    /// Reads the current memory load, percent
    fn memory_load(&self) -> Result<f64>;
}

/// Linux backend reading `/proc/stat` and `/proc/meminfo`
pub struct ProcSampler {
    stat_path: PathBuf,
    meminfo_path: PathBuf,
}

impl ProcSampler {
    /// Creates a sampler reading the live `/proc` files
    pub fn new() -> Self {
        Self::with_paths(PathBuf::from("/proc/stat"), PathBuf::from("/proc/meminfo"))
    }

    /// Creates a sampler reading the given files instead of `/proc`
    pub fn with_paths(stat_path: PathBuf, meminfo_path: PathBuf) -> Self {
        Self {
            stat_path,
            meminfo_path,
        }
    }
}

impl Default for ProcSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceSampler for ProcSampler {
    fn cpu_counters(&self) -> Result<CpuCounters> {
        let content = std::fs::read_to_string(&self.stat_path)
            .with_context(|| format!("Failed to read {}", self.stat_path.display()))?;
        parse_proc_stat(&content)
    }

    fn memory_load(&self) -> Result<f64> {
        let content = std::fs::read_to_string(&self.meminfo_path)
            .with_context(|| format!("Failed to read {}", self.meminfo_path.display()))?;
        parse_meminfo(&content)
    }
}

/// Backend for platforms without a counter source; always reads zero
pub struct NullSampler;

impl ResourceSampler for NullSampler {
    fn cpu_counters(&self) -> Result<CpuCounters> {
        Ok(CpuCounters::default())
    }

    fn memory_load(&self) -> Result<f64> {
        Ok(0.0)
    }
}

/// Picks the sampler backend for the current platform
pub fn default_sampler() -> Arc<dyn ResourceSampler> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcSampler::new())
    } else {
        warn!("No resource counters on this platform, CPU and memory load will read 0");
        Arc::new(NullSampler)
    }
}

/// Parses the aggregate `cpu` line of `/proc/stat`
///
/// Columns: user nice system idle iowait irq softirq steal [guest guest_nice].
/// Guest time is already folded into user/nice, so it is not added again.
fn parse_proc_stat(content: &str) -> Result<CpuCounters> {
    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some("cpu"))
        .context("No aggregate cpu line in /proc/stat")?;

    let fields = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|field| field.parse::<u64>())
        .collect::<Result<Vec<_>, _>>()
        .context("Malformed cpu line in /proc/stat")?;

    if fields.len() < 4 {
        anyhow::bail!("cpu line in /proc/stat has only {} fields", fields.len());
    }

    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    let total: u64 = fields.iter().sum();

    Ok(CpuCounters {
        busy: total - idle,
        total,
    })
}

/// Computes memory load from `/proc/meminfo`
///
/// Prefers committed memory against the commit limit; falls back to
/// `MemTotal - MemAvailable` when the commit fields are missing.
fn parse_meminfo(content: &str) -> Result<f64> {
    let field = |name: &str| -> Option<u64> {
        content.lines().find_map(|line| {
            let (key, rest) = line.split_once(':')?;
            if key.trim() != name {
                return None;
            }
            rest.split_whitespace().next()?.parse().ok()
        })
    };

    if let (Some(committed), Some(limit)) = (field("Committed_AS"), field("CommitLimit")) {
        if limit > 0 {
            return Ok((committed as f64 / limit as f64 * 100.0).min(100.0));
        }
    }

    let total = field("MemTotal").context("No MemTotal in /proc/meminfo")?;
    let available = field("MemAvailable").context("No MemAvailable in /proc/meminfo")?;
    if total == 0 {
        anyhow::bail!("MemTotal is zero");
    }

    Ok(total.saturating_sub(available) as f64 / total as f64 * 100.0)
}
