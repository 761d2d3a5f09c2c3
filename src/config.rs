use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cost::CostOrdering;
use crate::error::{HotSwapError, Result};
use crate::recommend::CandidateSpace;
use crate::types::{ContainerAssignment, StorageRole};

/// One manually scheduled swap.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualSwap {
    /// Batch after which the swap happens.
    pub batch: u64,
    /// Target assignment; must name every role.
    pub assignment: ContainerAssignment,
}

/// Tuning knobs for the hot-swap engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HotSwapConfig {
    /// Batches of recommendations kept for ranking.
    pub window_size: usize,
    /// Fraction of `window_size` that must pass before automatic swaps.
    pub lower_bound: f64,
    /// Batches a swap must pay for itself within.
    pub amortization_batches: usize,
    /// Maximum number of swaps; negative means unlimited.
    pub max_swaps: i64,
    /// Whether the first batch contributes to the access history.
    pub include_first_batch: bool,
    /// Slots in the circular access history.
    pub access_history_capacity: usize,
    /// Candidate count from which scoring runs in parallel.
    pub parallel_threshold: usize,
    /// Keep only the cheapest N candidates of each batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_recommendations_per_batch: Option<usize>,
    /// Order used to compare cost vectors.
    pub cost_ordering: CostOrdering,
    /// Assignments scored every batch.
    pub candidates: CandidateSpace,
    /// Swaps performed regardless of cost.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub manual: Vec<ManualSwap>,
}

impl Default for HotSwapConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            lower_bound: 0.5,
            amortization_batches: 5,
            max_swaps: -1,
            include_first_batch: false,
            access_history_capacity: 5,
            parallel_threshold: 64,
            max_recommendations_per_batch: None,
            cost_ordering: CostOrdering::default(),
            candidates: CandidateSpace::default(),
            manual: Vec::new(),
        }
    }
}

impl HotSwapConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the recommendation window.
    pub fn window_size(mut self, batches: usize) -> Self {
        self.window_size = batches;
        self
    }

    /// Sets the warm-up fraction of the window.
    pub fn lower_bound(mut self, fraction: f64) -> Self {
        self.lower_bound = fraction;
        self
    }

    /// Sets the amortization horizon.
    pub fn amortization_batches(mut self, batches: usize) -> Self {
        self.amortization_batches = batches;
        self
    }

    /// Sets the swap budget; negative means unlimited.
    pub fn max_swaps(mut self, max: i64) -> Self {
        self.max_swaps = max;
        self
    }

    /// Whether the first batch feeds the access history.
    pub fn include_first_batch(mut self, include: bool) -> Self {
        self.include_first_batch = include;
        self
    }

    /// Sets the number of access history slots.
    pub fn access_history_capacity(mut self, slots: usize) -> Self {
        self.access_history_capacity = slots;
        self
    }

    /// Sets the cost ordering.
    pub fn cost_ordering(mut self, ordering: CostOrdering) -> Self {
        self.cost_ordering = ordering;
        self
    }

    /// Sets the parallel scoring threshold.
    pub fn parallel_threshold(mut self, candidates: usize) -> Self {
        self.parallel_threshold = candidates;
        self
    }

    /// Caps the entries retained per batch.
    pub fn max_recommendations_per_batch(mut self, limit: Option<usize>) -> Self {
        self.max_recommendations_per_batch = limit;
        self
    }

    /// Sets the candidate space.
    pub fn candidates(mut self, space: CandidateSpace) -> Self {
        self.candidates = space;
        self
    }

    /// Adds a manual swap.
    pub fn manual_swap(mut self, batch: u64, assignment: ContainerAssignment) -> Self {
        self.manual.push(ManualSwap { batch, assignment });
        self
    }

    /// Checks every field, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(HotSwapError::config("window_size must be positive"));
        }
        if self.amortization_batches == 0 {
            return Err(HotSwapError::config("amortization_batches must be positive"));
        }
        if self.access_history_capacity == 0 {
            return Err(HotSwapError::config("access_history_capacity must be positive"));
        }
        if !(0.0..=1.0).contains(&self.lower_bound) {
            return Err(HotSwapError::config(format!(
                "lower_bound {} is outside [0, 1]",
                self.lower_bound
            )));
        }
        if self.max_recommendations_per_batch == Some(0) {
            return Err(HotSwapError::config(
                "max_recommendations_per_batch must be positive",
            ));
        }
        if let CostOrdering::Weighted { time, memory } = self.cost_ordering {
            if !(time >= 0.0 && memory >= 0.0) || (time == 0.0 && memory == 0.0) {
                return Err(HotSwapError::config(
                    "weighted cost ordering needs non-negative weights, not both zero",
                ));
            }
        }
        for swap in &self.manual {
            swap.assignment.validate()?;
        }
        self.candidates.enumerate()?;
        Ok(())
    }

    /// Manual swaps keyed by batch; later entries for one batch win.
    pub fn manual_schedule(&self) -> BTreeMap<u64, ContainerAssignment> {
        self.manual
            .iter()
            .map(|swap| (swap.batch, swap.assignment))
            .collect()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|source| HotSwapError::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents, path)
    }

    /// Loads `explicit`, else the default path when it exists, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Renders the configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Roles whose implementation may change under this candidate space.
    pub fn swappable_roles(&self) -> Result<Vec<StorageRole>> {
        let candidates = self.candidates.enumerate()?;
        Ok(StorageRole::ALL
            .into_iter()
            .filter(|role| {
                candidates
                    .iter()
                    .any(|c| c.get(*role) != candidates[0].get(*role))
            })
            .collect())
    }
}

/// Per-user configuration file location.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("graphswap").join("hotswap.toml"))
}
