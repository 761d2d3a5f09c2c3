use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{HotSwapError, Result};
use crate::types::{ContainerAssignment, ImplKind, StorageRole};

/// Universe of assignments the tracker scores every batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CandidateSpace {
    /// Every combination of the allowed implementations per role. Roles left
    /// out of `allowed` may use any implementation that supports them.
    CrossProduct {
        /// Implementations permitted per role.
        #[serde(default)]
        allowed: BTreeMap<StorageRole, Vec<ImplKind>>,
    },
    /// A fixed list of assignments.
    Explicit {
        /// Assignments to score.
        assignments: Vec<ContainerAssignment>,
    },
}

impl Default for CandidateSpace {
    fn default() -> Self {
        CandidateSpace::CrossProduct {
            allowed: BTreeMap::new(),
        }
    }
}

impl CandidateSpace {
    /// Restricts `role` to `kinds`; converts an explicit list into a cross product.
    pub fn allow(self, role: StorageRole, kinds: impl IntoIterator<Item = ImplKind>) -> Self {
        let mut allowed = match self {
            CandidateSpace::CrossProduct { allowed } => allowed,
            CandidateSpace::Explicit { .. } => BTreeMap::new(),
        };
        allowed.insert(role, kinds.into_iter().collect());
        CandidateSpace::CrossProduct { allowed }
    }

    /// Validated, deduplicated candidates in identity order.
    pub fn enumerate(&self) -> Result<Vec<ContainerAssignment>> {
        let mut out = match self {
            CandidateSpace::CrossProduct { allowed } => cross_product(allowed)?,
            CandidateSpace::Explicit { assignments } => {
                for assignment in assignments {
                    assignment.validate()?;
                }
                assignments.clone()
            }
        };
        out.sort_unstable();
        out.dedup();
        if out.is_empty() {
            return Err(HotSwapError::config("candidate space is empty"));
        }
        Ok(out)
    }
}

fn cross_product(
    allowed: &BTreeMap<StorageRole, Vec<ImplKind>>,
) -> Result<Vec<ContainerAssignment>> {
    let mut out = vec![ContainerAssignment::default()];
    for role in StorageRole::ALL {
        let kinds: Vec<ImplKind> = match allowed.get(&role) {
            Some(kinds) => {
                if let Some(kind) = kinds.iter().find(|kind| !kind.supports(role)) {
                    return Err(HotSwapError::UnsupportedImpl { role, kind: *kind });
                }
                kinds.clone()
            }
            None => ImplKind::ALL
                .into_iter()
                .filter(|kind| kind.supports(role))
                .collect(),
        };
        if kinds.is_empty() {
            return Err(HotSwapError::config(format!(
                "no implementation allowed for {role}"
            )));
        }
        out = out
            .iter()
            .flat_map(|base| kinds.iter().map(move |kind| base.with(role, *kind)))
            .collect();
    }
    Ok(out)
}
