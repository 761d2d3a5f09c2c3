use parking_lot::Mutex;

use crate::error::Result;
use crate::swap::{ChecksSuspension, SwapExecutor};
use crate::types::{ContainerAssignment, StorageRole};

#[derive(Copy, Clone, Default)]
struct RoleCounts {
    containers: u64,
    elements: u64,
}

struct TraceState {
    assignment: ContainerAssignment,
    counts: [RoleCounts; StorageRole::COUNT],
    checks_enabled: bool,
    suspension: ChecksSuspension,
    swaps: u64,
}

/// Storage that holds no elements, only the sizes a trace reports.
///
/// Swaps always succeed and merely replace the recorded assignment.
pub struct TraceStorage {
    state: Mutex<TraceState>,
}

impl TraceStorage {
    /// Creates storage starting from `assignment`.
    pub fn new(assignment: ContainerAssignment) -> Result<Self> {
        assignment.validate()?;
        Ok(Self {
            state: Mutex::new(TraceState {
                assignment,
                counts: [RoleCounts::default(); StorageRole::COUNT],
                checks_enabled: true,
                suspension: ChecksSuspension::default(),
                swaps: 0,
            }),
        })
    }

    /// Overwrites the reported sizes for `role`.
    pub fn set_size(&self, role: StorageRole, containers: u64, elements: u64) {
        self.state.lock().counts[role.index()] = RoleCounts {
            containers,
            elements,
        };
    }

    /// Turns insertion checks on or off outside of a swap.
    pub fn set_checks_enabled(&self, enabled: bool) {
        self.state.lock().checks_enabled = enabled;
    }

    /// Number of swaps applied so far.
    pub fn swaps_applied(&self) -> u64 {
        self.state.lock().swaps
    }

    /// Whether insertion checks are currently enabled.
    pub fn checks_enabled(&self) -> bool {
        self.state.lock().checks_enabled
    }
}

impl SwapExecutor for TraceStorage {
    fn current_assignment(&self) -> ContainerAssignment {
        self.state.lock().assignment
    }

    fn element_count(&self, role: StorageRole) -> u64 {
        self.state.lock().counts[role.index()].elements
    }

    fn container_count(&self, role: StorageRole) -> u64 {
        self.state.lock().counts[role.index()].containers
    }

    fn apply_swap(&self, target: &ContainerAssignment) -> Result<()> {
        target.validate()?;
        let mut state = self.state.lock();
        if state.assignment != *target {
            state.assignment = *target;
            state.swaps += 1;
        }
        Ok(())
    }

    fn suspend_insertion_checks(&self) {
        let mut state = self.state.lock();
        let current = state.checks_enabled;
        state.suspension.suspend(current);
        state.checks_enabled = false;
    }

    fn resume_insertion_checks(&self) {
        let mut state = self.state.lock();
        if let Some(previous) = state.suspension.resume() {
            state.checks_enabled = previous;
        }
    }
}
