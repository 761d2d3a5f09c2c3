use std::fs;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cost::CostVector;
use crate::error::{HotSwapError, Result};
use crate::profile::{ProfileEntry, RoleSizes};
use crate::types::{ContainerAssignment, ImplKind, OperationKind, StorageRole};

/// Growth class of an operation's cost in the container size.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityClass {
    /// O(1).
    Constant,
    /// O(log n).
    Logarithmic,
    /// O(n).
    Linear,
    /// O(n log n).
    Linearithmic,
    /// O(n^2).
    Quadratic,
}

impl ComplexityClass {
    /// Evaluates the class at size `n`. Logarithms use `log2(n + 1)` so the
    /// empty container stays finite.
    pub fn eval(self, n: f64) -> f64 {
        let n = n.max(0.0);
        match self {
            ComplexityClass::Constant => 1.0,
            ComplexityClass::Logarithmic => (n + 1.0).log2(),
            ComplexityClass::Linear => n,
            ComplexityClass::Linearithmic => n * (n + 1.0).log2(),
            ComplexityClass::Quadratic => n * n,
        }
    }
}

/// `base + factor * class(n)` along one cost dimension.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Complexity {
    /// Growth class.
    pub class: ComplexityClass,
    /// Size-independent part.
    #[serde(default)]
    pub base: f64,
    /// Multiplier applied to the growth class.
    #[serde(default)]
    pub factor: f64,
}

impl Complexity {
    /// Constant `base` cost.
    pub const fn constant(base: f64) -> Self {
        Self {
            class: ComplexityClass::Constant,
            base,
            factor: 0.0,
        }
    }

    /// `factor * class(n)` with no base cost.
    pub const fn scaled(class: ComplexityClass, factor: f64) -> Self {
        Self {
            class,
            base: 0.0,
            factor,
        }
    }

    /// Cost at size `n`.
    pub fn at(&self, n: f64) -> f64 {
        self.base + self.factor * self.class.eval(n)
    }
}

/// Calibrated cost of one operation on one implementation.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Time in nanoseconds.
    pub time: Complexity,
    /// Memory in bytes.
    #[serde(default = "no_memory")]
    pub memory: Complexity,
}

fn no_memory() -> Complexity {
    Complexity::constant(0.0)
}

impl CostRecord {
    /// Cost vector at size `n`.
    pub fn estimate(&self, n: f64) -> CostVector {
        CostVector::new(self.time.at(n), self.memory.at(n))
    }
}

/// One row of a calibration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    /// Implementation measured.
    pub implementation: ImplKind,
    /// Operation measured.
    pub operation: OperationKind,
    /// Restricts the row to one role; unset rows apply to every role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<StorageRole>,
    /// Calibrated time complexity.
    pub time: Complexity,
    /// Calibrated memory complexity.
    #[serde(default = "no_memory")]
    pub memory: Complexity,
}

#[derive(Serialize, Deserialize)]
struct CalibrationDocument {
    #[serde(default)]
    entry: Vec<CalibrationEntry>,
}

type CalibrationKey = (Option<StorageRole>, ImplKind, OperationKind);

/// Static calibration data backing a [`CostModel`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationTable {
    records: FxHashMap<CalibrationKey, CostRecord>,
}

impl CalibrationTable {
    /// Creates an empty table; every lookup against it is infinite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the record for every role.
    pub fn insert(&mut self, kind: ImplKind, op: OperationKind, record: CostRecord) {
        self.records.insert((None, kind, op), record);
    }

    /// Inserts or replaces a record that only applies to `role`.
    pub fn insert_for_role(
        &mut self,
        role: StorageRole,
        kind: ImplKind,
        op: OperationKind,
        record: CostRecord,
    ) {
        self.records.insert((Some(role), kind, op), record);
    }

    /// Role-specific record if present, else the generic one.
    pub fn lookup(&self, role: StorageRole, kind: ImplKind, op: OperationKind) -> Option<&CostRecord> {
        self.records
            .get(&(Some(role), kind, op))
            .or_else(|| self.records.get(&(None, kind, op)))
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Textbook complexity classes with factors in the range a release
    /// build measures on commodity hardware.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for kind in ImplKind::ALL {
            for op in OperationKind::ALL {
                let time = Complexity::scaled(default_class(kind, op), default_time_factor(kind, op));
                table.insert(
                    kind,
                    op,
                    CostRecord {
                        time,
                        memory: default_memory(kind, op),
                    },
                );
            }
        }
        table
    }

    /// Rows in a stable order suitable for serialization.
    pub fn entries(&self) -> Vec<CalibrationEntry> {
        let mut rows: Vec<_> = self
            .records
            .iter()
            .map(|((role, kind, op), record)| CalibrationEntry {
                implementation: *kind,
                operation: *op,
                role: *role,
                time: record.time,
                memory: record.memory,
            })
            .collect();
        rows.sort_by_key(|row| (row.implementation, row.operation, row.role));
        rows
    }

    /// Builds a table from calibration rows; later rows win.
    pub fn from_entries(rows: impl IntoIterator<Item = CalibrationEntry>) -> Self {
        let mut table = Self::new();
        for row in rows {
            let record = CostRecord {
                time: row.time,
                memory: row.memory,
            };
            match row.role {
                Some(role) => table.insert_for_role(role, row.implementation, row.operation, record),
                None => table.insert(row.implementation, row.operation, record),
            }
        }
        table
    }

    /// Parses a TOML calibration document.
    pub fn from_toml_str(contents: &str, origin: &Path) -> Result<Self> {
        let doc: CalibrationDocument =
            toml::from_str(contents).map_err(|source| HotSwapError::Toml {
                path: origin.to_path_buf(),
                source,
            })?;
        Ok(Self::from_entries(doc.entry))
    }

    /// Loads a TOML calibration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents, path)
    }

    /// Renders the table as a TOML document.
    pub fn to_toml_string(&self) -> Result<String> {
        let doc = CalibrationDocument {
            entry: self.entries(),
        };
        Ok(toml::to_string_pretty(&doc)?)
    }
}

/// Complexity class each implementation is expected to exhibit.
pub fn default_class(kind: ImplKind, op: OperationKind) -> ComplexityClass {
    use ComplexityClass::*;
    use OperationKind::*;
    match (kind, op) {
        (_, Initialize) | (_, Size) => Constant,
        (_, Iterate) => Linear,
        (ImplKind::Array, Add) => Constant,
        (ImplKind::Array, Remove | Contains | Get) => Linear,
        (ImplKind::SortedArray, Add | Remove) => Linear,
        (ImplKind::SortedArray, Contains | Get) => Logarithmic,
        (ImplKind::HashSet, _) => Constant,
        (ImplKind::BTreeSet, _) => Logarithmic,
        (ImplKind::SlotArray, _) => Constant,
    }
}

fn default_time_factor(kind: ImplKind, op: OperationKind) -> f64 {
    use OperationKind::*;
    match (kind, op) {
        (_, Size) => 1.0,
        (ImplKind::Array, Initialize) => 20.0,
        (ImplKind::Array, Add) => 3.0,
        (ImplKind::Array, Remove) => 1.0,
        (ImplKind::Array, Contains | Get) => 0.8,
        (ImplKind::Array, Iterate) => 0.5,
        (ImplKind::SortedArray, Initialize) => 20.0,
        (ImplKind::SortedArray, Add | Remove) => 0.5,
        (ImplKind::SortedArray, Contains | Get) => 4.0,
        (ImplKind::SortedArray, Iterate) => 0.5,
        (ImplKind::HashSet, Initialize) => 60.0,
        (ImplKind::HashSet, Add | Remove) => 25.0,
        (ImplKind::HashSet, Contains | Get) => 20.0,
        (ImplKind::HashSet, Iterate) => 2.0,
        (ImplKind::BTreeSet, Initialize) => 30.0,
        (ImplKind::BTreeSet, Add | Remove) => 12.0,
        (ImplKind::BTreeSet, Contains | Get) => 10.0,
        (ImplKind::BTreeSet, Iterate) => 3.0,
        (ImplKind::SlotArray, Initialize) => 20.0,
        (ImplKind::SlotArray, Add | Remove) => 4.0,
        (ImplKind::SlotArray, Contains | Get) => 2.0,
        (ImplKind::SlotArray, Iterate) => 1.5,
    }
}

/// Memory charged to an operation: container header on creation, element
/// footprint on insertion.
pub fn default_memory(kind: ImplKind, op: OperationKind) -> Complexity {
    match op {
        OperationKind::Initialize => Complexity::constant(match kind {
            ImplKind::HashSet => 48.0,
            ImplKind::BTreeSet => 32.0,
            _ => 24.0,
        }),
        OperationKind::Add => Complexity::constant(match kind {
            ImplKind::Array | ImplKind::SortedArray => 8.0,
            ImplKind::SlotArray => 16.0,
            ImplKind::HashSet => 24.0,
            ImplKind::BTreeSet => 32.0,
        }),
        _ => Complexity::constant(0.0),
    }
}

/// Converts operation counts into comparable cost estimates.
#[derive(Clone, Debug)]
pub struct CostModel {
    table: CalibrationTable,
}

impl CostModel {
    /// Creates a model over a fixed calibration table.
    pub fn new(table: CalibrationTable) -> Self {
        Self { table }
    }

    /// Model backed by [`CalibrationTable::builtin`].
    pub fn builtin() -> Self {
        Self::new(CalibrationTable::builtin())
    }

    /// Underlying calibration data.
    pub fn table(&self) -> &CalibrationTable {
        &self.table
    }

    /// Estimated cost of one `op` on a `kind` container of `size` elements
    /// serving `role`. Combinations outside the table, or roles the
    /// implementation cannot back, cost [`CostVector::INFINITE`].
    pub fn estimate(&self, role: StorageRole, op: OperationKind, kind: ImplKind, size: f64) -> CostVector {
        if !kind.supports(role) {
            return CostVector::INFINITE;
        }
        match self.table.lookup(role, kind, op) {
            Some(record) => record.estimate(size),
            None => CostVector::INFINITE,
        }
    }

    /// Cost of replaying `entry` against `assignment`.
    pub fn aggregate(
        &self,
        assignment: &ContainerAssignment,
        entry: &ProfileEntry,
        sizes: &RoleSizes,
    ) -> CostVector {
        entry
            .nonzero()
            .map(|(role, op, count)| {
                let size = sizes.get(role).mean_size;
                self.estimate(role, op, assignment.get(role), size) * count as f64
            })
            .sum()
    }

    /// Cost of rebuilding every role that differs between `from` and `to`:
    /// one initialization per container plus one insertion per element.
    pub fn swap_cost(
        &self,
        from: &ContainerAssignment,
        to: &ContainerAssignment,
        sizes: &RoleSizes,
    ) -> CostVector {
        to.changed_roles(from)
            .into_iter()
            .map(|role| {
                let size = sizes.get(role);
                let kind = to.get(role);
                let init = self.estimate(role, OperationKind::Initialize, kind, size.mean_size)
                    * size.containers as f64;
                let fill = self.estimate(role, OperationKind::Add, kind, size.mean_size)
                    * size.total_elements();
                init + fill
            })
            .sum()
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(time: f64) -> CostRecord {
        CostRecord {
            time: Complexity::constant(time),
            memory: Complexity::constant(0.0),
        }
    }

    #[test]
    fn missing_record_is_infinite() {
        let model = CostModel::new(CalibrationTable::new());
        let cost = model.estimate(StorageRole::NodeList, OperationKind::Add, ImplKind::Array, 10.0);
        assert_eq!(cost, CostVector::INFINITE);
    }

    #[test]
    fn unsupported_role_is_infinite_even_when_calibrated() {
        let model = CostModel::builtin();
        let cost = model.estimate(
            StorageRole::AdjacentNodes,
            OperationKind::Contains,
            ImplKind::SlotArray,
            4.0,
        );
        assert!(!cost.is_finite());
    }

    #[test]
    fn role_specific_record_overrides_generic() {
        let mut table = CalibrationTable::new();
        table.insert(ImplKind::HashSet, OperationKind::Add, flat(5.0));
        table.insert_for_role(StorageRole::EdgeList, ImplKind::HashSet, OperationKind::Add, flat(9.0));
        let model = CostModel::new(table);
        assert_eq!(
            model.estimate(StorageRole::EdgeList, OperationKind::Add, ImplKind::HashSet, 0.0).time,
            9.0
        );
        assert_eq!(
            model.estimate(StorageRole::NodeList, OperationKind::Add, ImplKind::HashSet, 0.0).time,
            5.0
        );
    }

    #[test]
    fn aggregate_weights_estimates_by_count_at_mean_size() {
        let mut table = CalibrationTable::new();
        table.insert(
            ImplKind::Array,
            OperationKind::Contains,
            CostRecord {
                time: Complexity::scaled(ComplexityClass::Linear, 2.0),
                memory: Complexity::constant(0.0),
            },
        );
        let model = CostModel::new(table);
        let entry = ProfileEntry::new().with(StorageRole::IncidentEdges, OperationKind::Contains, 3);
        let sizes = RoleSizes::default().with(StorageRole::IncidentEdges, 5.0, 10);
        let cost = model.aggregate(&ContainerAssignment::uniform(ImplKind::Array), &entry, &sizes);
        assert_eq!(cost.time, 3.0 * 2.0 * 5.0);
    }

    #[test]
    fn swap_cost_only_charges_changed_roles() {
        let mut table = CalibrationTable::new();
        table.insert(ImplKind::HashSet, OperationKind::Initialize, flat(10.0));
        table.insert(ImplKind::HashSet, OperationKind::Add, flat(2.0));
        let model = CostModel::new(table);
        let sizes = RoleSizes::default()
            .with(StorageRole::NodeList, 100.0, 1)
            .with(StorageRole::AdjacentNodes, 4.0, 50);
        let from = ContainerAssignment::uniform(ImplKind::Array);
        let to = from.with(StorageRole::AdjacentNodes, ImplKind::HashSet);
        let cost = model.swap_cost(&from, &to, &sizes);
        assert_eq!(cost.time, 50.0 * 10.0 + 200.0 * 2.0);
        assert_eq!(model.swap_cost(&from, &from, &sizes), CostVector::ZERO);
    }

    #[test]
    fn builtin_covers_every_pair_and_survives_toml() {
        let table = CalibrationTable::builtin();
        assert_eq!(table.len(), ImplKind::COUNT * OperationKind::COUNT);
        let text = table.to_toml_string().unwrap();
        let back = CalibrationTable::from_toml_str(&text, Path::new("builtin.toml")).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn class_evaluation() {
        assert_eq!(ComplexityClass::Constant.eval(1e6), 1.0);
        assert_eq!(ComplexityClass::Logarithmic.eval(0.0), 0.0);
        assert_eq!(ComplexityClass::Logarithmic.eval(7.0), 3.0);
        assert_eq!(ComplexityClass::Linearithmic.eval(3.0), 6.0);
        assert_eq!(ComplexityClass::Quadratic.eval(-4.0), 0.0);
    }
}
