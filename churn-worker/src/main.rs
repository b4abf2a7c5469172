//! Churn Worker
//!
//! Synthetic workload launched by the runner. Allocates the requested
//! amount of memory and keeps incrementing pseudo-random bytes of it until
//! the requested time has passed.
//!
//! Exits 0 on normal completion and 255 (-1) on any failure.

use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Parser)]
#[command(name = "churn-worker")]
#[command(about = "Memory-churning workload for the Churn runner", long_about = None)]
struct Cli {
    /// How long to run, in milliseconds
    timeout_ms: f64,

    /// Memory to allocate, in MiB
    memory_mb: usize,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}", e);
            println!("Exit from worker with error state...");
            return ExitCode::from(255);
        }
    };

    println!(
        "Running worker with {} timeout and {} memoryCount",
        cli.timeout_ms, cli.memory_mb
    );

    match churn(cli.timeout_ms, cli.memory_mb) {
        Ok(touched) => {
            println!("Exit from worker after {} writes...", touched);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{:#}", e);
            println!("Exit from worker with error state...");
            ExitCode::from(255)
        }
    }
}

/// Churns `memory_mb` MiB for `timeout_ms` milliseconds
///
/// Returns the number of byte writes performed.
fn churn(timeout_ms: f64, memory_mb: usize) -> Result<u64> {
    let duration = Duration::try_from_secs_f64(timeout_ms / 1000.0)
        .with_context(|| format!("invalid timeout: {}ms", timeout_ms))?;

    let len = memory_mb
        .checked_mul(1024 * 1024)
        .context("memory size overflows")?;

    let mut memory = Vec::new();
    memory
        .try_reserve_exact(len)
        .with_context(|| format!("failed to allocate {}MiB", memory_mb))?;
    memory.resize(len, 0u8);

    let deadline = Instant::now() + duration;
    let mut rng = XorShift::seeded();
    let mut touched = 0u64;

    if memory.is_empty() {
        std::thread::sleep(duration);
        return Ok(touched);
    }

    while Instant::now() < deadline {
        // Check the clock every few thousand writes rather than every write.
        for _ in 0..4096 {
            let index = (rng.next() % memory.len() as u64) as usize;
            memory[index] = memory[index].wrapping_add(1);
        }
        touched += 4096;
    }

    std::hint::black_box(&memory);
    Ok(touched)
}

/// xorshift64 generator
struct XorShift(u64);

impl XorShift {
    fn seeded() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self(seed | 1)
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_churn_runs_for_timeout() {
        let started = Instant::now();
        let touched = churn(50.0, 1).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(touched > 0);
    }

    #[test]
    fn test_zero_memory_just_waits() {
        assert_eq!(churn(10.0, 0).unwrap(), 0);
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(churn(-5.0, 1).is_err());
        assert!(churn(f64::NAN, 1).is_err());
    }

    #[test]
    fn test_xorshift_advances() {
        let mut rng = XorShift(1);
        let a = rng.next();
        let b = rng.next();
        assert_ne!(a, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cli_requires_both_args() {
        assert!(Cli::try_parse_from(["churn-worker", "100"]).is_err());
        let cli = Cli::try_parse_from(["churn-worker", "100.5", "8"]).unwrap();
        assert_eq!(cli.timeout_ms, 100.5);
        assert_eq!(cli.memory_mb, 8);
    }
}
