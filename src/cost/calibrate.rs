//! Micro-benchmark pass that measures every implementation on this machine
//! and fits the factors of a [`CalibrationTable`].

use std::hint::black_box;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::error::{HotSwapError, Result};
use crate::storage::{Container, MAX_SLOT_ID};
use crate::types::{ImplKind, OperationKind};

use super::{default_class, default_memory, CalibrationTable, Complexity, CostRecord};

/// Parameters of a calibration pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CalibrateOptions {
    /// Elements per measured container.
    pub size: usize,
    /// Repetitions per measurement; the fastest one is kept.
    pub rounds: usize,
    /// Seed for key generation.
    pub seed: u64,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self {
            size: 1024,
            rounds: 5,
            seed: 0x5eed,
        }
    }
}

impl CalibrateOptions {
    /// Sets the container size.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Sets the number of rounds.
    pub fn rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    /// Sets the key seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Number of measurements a full pass performs.
pub const MEASUREMENTS: usize = ImplKind::COUNT * OperationKind::COUNT;

/// Measures every (implementation, operation) pair and returns the fitted table.
pub fn run(options: &CalibrateOptions) -> Result<CalibrationTable> {
    run_with_progress(options, |_, _| {})
}

/// Like [`run`], invoking `progress` after each measurement.
pub fn run_with_progress(
    options: &CalibrateOptions,
    mut progress: impl FnMut(ImplKind, OperationKind),
) -> Result<CalibrationTable> {
    if options.size == 0 {
        return Err(HotSwapError::config("calibration size must be at least 1"));
    }
    if options.rounds == 0 {
        return Err(HotSwapError::config("calibration rounds must be at least 1"));
    }
    // Keys range over 0..4*size and must fit in a slot array.
    if (options.size as u64).saturating_mul(4) > MAX_SLOT_ID {
        return Err(HotSwapError::config(format!(
            "calibration size must be at most {}",
            MAX_SLOT_ID / 4
        )));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let keys = distinct_keys(&mut rng, options.size);
    let probes: Vec<u64> = (0..options.size)
        .map(|_| rng.gen_range(0..(options.size as u64) * 4))
        .collect();

    let started = Instant::now();
    let mut table = CalibrationTable::new();
    for kind in ImplKind::ALL {
        for op in OperationKind::ALL {
            let (ns_per_op, effective_size) = measure(kind, op, &keys, &probes, options.rounds);
            let class = default_class(kind, op);
            let scale = class.eval(effective_size);
            let factor = if scale > 0.0 { ns_per_op / scale } else { ns_per_op };
            debug!(
                implementation = %kind,
                operation = %op,
                ns_per_op,
                factor,
                "calibrate.measured"
            );
            table.insert(
                kind,
                op,
                CostRecord {
                    time: Complexity::scaled(class, factor),
                    memory: default_memory(kind, op),
                },
            );
            progress(kind, op);
        }
    }
    info!(
        size = options.size,
        rounds = options.rounds,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "calibrate.completed"
    );
    Ok(table)
}

// Keys stay below 4n so slot arrays remain dense.
fn distinct_keys(rng: &mut ChaCha8Rng, n: usize) -> Vec<u64> {
    let mut keys: Vec<u64> = (0..n as u64).map(|i| i * 4 + rng.gen_range(0..4)).collect();
    keys.shuffle(rng);
    keys
}

fn filled(kind: ImplKind, keys: &[u64]) -> Container<u64> {
    let mut container = Container::with_capacity(kind, keys.len());
    for &key in keys {
        container.insert(key, false);
    }
    container
}

/// Returns nanoseconds per operation and the container size the operation
/// effectively ran against.
fn measure(
    kind: ImplKind,
    op: OperationKind,
    keys: &[u64],
    probes: &[u64],
    rounds: usize,
) -> (f64, f64) {
    let n = keys.len();
    let full = n as f64;
    let mut best = Duration::MAX;
    let (ops, effective) = match op {
        OperationKind::Add | OperationKind::Remove => (n, full / 2.0),
        OperationKind::Iterate => (1, full),
        _ => (n, full),
    };
    for _ in 0..rounds {
        let elapsed = match op {
            OperationKind::Initialize => {
                let start = Instant::now();
                for _ in 0..n {
                    black_box(Container::<u64>::new(kind));
                }
                start.elapsed()
            }
            OperationKind::Add => {
                let mut container = Container::new(kind);
                let start = Instant::now();
                for &key in keys {
                    container.insert(black_box(key), false);
                }
                let elapsed = start.elapsed();
                black_box(container.len());
                elapsed
            }
            OperationKind::Remove => {
                let mut container = filled(kind, keys);
                let start = Instant::now();
                for &key in keys {
                    black_box(container.remove(black_box(key)));
                }
                start.elapsed()
            }
            OperationKind::Contains | OperationKind::Get => {
                let container = filled(kind, keys);
                let start = Instant::now();
                for &probe in probes {
                    black_box(container.contains(black_box(probe)));
                }
                start.elapsed()
            }
            OperationKind::Iterate => {
                let container = filled(kind, keys);
                let start = Instant::now();
                let sum: u64 = container.iter().fold(0u64, |acc, key| acc.wrapping_add(key));
                black_box(sum);
                start.elapsed()
            }
            OperationKind::Size => {
                let container = filled(kind, keys);
                let start = Instant::now();
                for _ in 0..n {
                    black_box(black_box(&container).len());
                }
                start.elapsed()
            }
        };
        best = best.min(elapsed);
    }
    (best.as_nanos() as f64 / ops as f64, effective)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StorageRole;

    #[test]
    fn small_pass_fills_every_cell() {
        let mut seen = 0;
        let table =
            run_with_progress(&CalibrateOptions::default().size(32).rounds(1), |_, _| seen += 1)
                .unwrap();
        assert_eq!(seen, MEASUREMENTS);
        assert_eq!(table.len(), MEASUREMENTS);
        for kind in ImplKind::ALL {
            for op in OperationKind::ALL {
                let record = table.lookup(StorageRole::NodeList, kind, op).unwrap();
                assert!(record.time.factor.is_finite());
                assert!(record.time.factor >= 0.0);
                assert_eq!(record.time.class, default_class(kind, op));
            }
        }
    }

    #[test]
    fn zero_size_is_rejected() {
        let err = run(&CalibrateOptions::default().size(0)).unwrap_err();
        assert!(matches!(err, HotSwapError::Config(_)));
    }

    #[test]
    fn size_past_the_slot_bound_is_rejected() {
        let size = (MAX_SLOT_ID / 4) as usize + 1;
        let err = run(&CalibrateOptions::default().size(size)).unwrap_err();
        assert!(matches!(err, HotSwapError::Config(_)));
    }

    #[test]
    fn keys_are_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut keys = distinct_keys(&mut rng, 500);
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 500);
        assert!(keys.iter().all(|key| *key < 2000));
    }
}
