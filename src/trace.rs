//! Recorded batch traces and offline replay through the engine.
//!
//! A trace is a JSON-lines file; each line holds one batch's access counts
//! and the storage sizes observed when it closed:
//!
//! ```text
//! {"batch":0,"accesses":{"edge_list":{"add":120}},"sizes":{"edge_list":{"containers":1,"elements":120}}}
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::HotSwapEngine;
use crate::error::Result;
use crate::profile::ProfileEntry;
use crate::storage::TraceStorage;
use crate::swap::{RunClock, SwapExecutor, SwapOutcome};
use crate::types::{ContainerAssignment, StorageRole};

/// Storage size of one role at the end of a batch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSample {
    /// Containers backing the role.
    pub containers: u64,
    /// Elements across those containers.
    pub elements: u64,
}

/// One line of a trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Batch index.
    pub batch: u64,
    /// Access counts of the batch.
    #[serde(default)]
    pub accesses: ProfileEntry,
    /// Sizes per role; missing roles keep their previous size.
    #[serde(default)]
    pub sizes: BTreeMap<StorageRole, SizeSample>,
}

/// Parses a JSON-lines trace, skipping blank lines.
pub fn read_trace(reader: impl BufRead) -> Result<Vec<TraceRecord>> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Reads a trace file.
pub fn load_trace(path: &Path) -> Result<Vec<TraceRecord>> {
    read_trace(BufReader::new(File::open(path)?))
}

/// Result of replaying a trace.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReplaySummary {
    /// One decision per batch.
    pub outcomes: Vec<SwapOutcome>,
    /// Successful swaps.
    pub swaps_done: u64,
    /// First assignment swapped to.
    pub first_switch: Option<ContainerAssignment>,
    /// Assignment active after the last batch.
    pub final_assignment: ContainerAssignment,
}

/// Feeds every record through `engine` against `storage`, in order.
///
/// The run length is taken as one past the largest batch index in the trace.
pub fn replay(
    engine: &mut HotSwapEngine,
    storage: &TraceStorage,
    records: &[TraceRecord],
) -> ReplaySummary {
    let total = records.iter().map(|record| record.batch + 1).max();
    let mut outcomes = Vec::with_capacity(records.len());
    for record in records {
        for (role, size) in &record.sizes {
            storage.set_size(*role, size.containers, size.elements);
        }
        let clock = RunClock::at(record.batch, total);
        engine.record_profile(&clock, storage, record.accesses.clone());
        let outcome = engine.evaluate_swap(&clock, storage);
        debug!(batch = record.batch, swapped = outcome.swapped, "trace.replay.batch");
        outcomes.push(outcome);
    }
    ReplaySummary {
        outcomes,
        swaps_done: engine.swaps_done(),
        first_switch: engine.first_switch(),
        final_assignment: storage.current_assignment(),
    }
}
