use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

use serde::{Deserialize, Serialize};

/// Estimated cost along each tracked dimension.
///
/// Both dimensions are non-negative; `f64::INFINITY` marks combinations the
/// calibration table cannot serve.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostVector {
    /// Estimated time in nanoseconds.
    pub time: f64,
    /// Estimated memory in bytes.
    pub memory: f64,
}

impl CostVector {
    /// No cost.
    pub const ZERO: CostVector = CostVector {
        time: 0.0,
        memory: 0.0,
    };

    /// Cost of an operation the implementation cannot perform.
    pub const INFINITE: CostVector = CostVector {
        time: f64::INFINITY,
        memory: f64::INFINITY,
    };

    /// Creates a vector, clamping negative inputs to zero.
    pub fn new(time: f64, memory: f64) -> Self {
        Self {
            time: time.max(0.0),
            memory: memory.max(0.0),
        }
    }

    /// Whether every dimension is finite.
    pub fn is_finite(&self) -> bool {
        self.time.is_finite() && self.memory.is_finite()
    }

    /// Multiplies every dimension by `factor`.
    ///
    /// A zero factor always yields [`CostVector::ZERO`], including for
    /// infinite vectors, so an unused operation never poisons a sum.
    pub fn scaled(self, factor: f64) -> Self {
        if factor == 0.0 {
            return CostVector::ZERO;
        }
        Self {
            time: self.time * factor,
            memory: self.memory * factor,
        }
    }
}

impl Add for CostVector {
    type Output = CostVector;

    fn add(self, rhs: CostVector) -> CostVector {
        CostVector {
            time: self.time + rhs.time,
            memory: self.memory + rhs.memory,
        }
    }
}

impl AddAssign for CostVector {
    fn add_assign(&mut self, rhs: CostVector) {
        self.time += rhs.time;
        self.memory += rhs.memory;
    }
}

impl Mul<f64> for CostVector {
    type Output = CostVector;

    fn mul(self, rhs: f64) -> CostVector {
        self.scaled(rhs)
    }
}

impl Sum for CostVector {
    fn sum<I: Iterator<Item = CostVector>>(iter: I) -> CostVector {
        iter.fold(CostVector::ZERO, Add::add)
    }
}

impl fmt::Display for CostVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time={:.1}ns memory={:.1}B", self.time, self.memory)
    }
}

/// Total order used whenever two cost vectors are compared.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CostOrdering {
    /// Compare time first, then memory.
    #[default]
    Lexicographic,
    /// Compare `time * time_weight + memory * memory_weight`.
    Weighted {
        /// Weight applied to the time dimension.
        time: f64,
        /// Weight applied to the memory dimension.
        memory: f64,
    },
}

impl CostOrdering {
    /// Orders `a` against `b`.
    pub fn compare(&self, a: &CostVector, b: &CostVector) -> Ordering {
        match *self {
            CostOrdering::Lexicographic => a
                .time
                .total_cmp(&b.time)
                .then_with(|| a.memory.total_cmp(&b.memory)),
            CostOrdering::Weighted { time, memory } => {
                weighted(a, time, memory).total_cmp(&weighted(b, time, memory))
            }
        }
    }

    /// Whether `a` is strictly cheaper than `b`.
    pub fn less(&self, a: &CostVector, b: &CostVector) -> bool {
        self.compare(a, b) == Ordering::Less
    }
}

// Zero weights drop their dimension entirely so `inf * 0` never turns into NaN.
fn weighted(cost: &CostVector, time_weight: f64, memory_weight: f64) -> f64 {
    let mut total = 0.0;
    if time_weight != 0.0 {
        total += cost.time * time_weight;
    }
    if memory_weight != 0.0 {
        total += cost.memory * memory_weight;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_scale_clears_infinite_cost() {
        assert_eq!(CostVector::INFINITE.scaled(0.0), CostVector::ZERO);
        assert_eq!(CostVector::new(2.0, 3.0) * 2.0, CostVector::new(4.0, 6.0));
    }

    #[test]
    fn lexicographic_breaks_time_ties_on_memory() {
        let ordering = CostOrdering::Lexicographic;
        let a = CostVector::new(10.0, 5.0);
        let b = CostVector::new(10.0, 7.0);
        let c = CostVector::new(9.0, 100.0);
        assert!(ordering.less(&a, &b));
        assert!(ordering.less(&c, &a));
        assert!(ordering.less(&b, &CostVector::INFINITE));
    }

    #[test]
    fn weighted_ignores_zero_weight_dimension() {
        let ordering = CostOrdering::Weighted {
            time: 1.0,
            memory: 0.0,
        };
        let a = CostVector {
            time: 1.0,
            memory: f64::INFINITY,
        };
        let b = CostVector::new(2.0, 0.0);
        assert!(ordering.less(&a, &b));
    }

    #[test]
    fn sum_adds_componentwise() {
        let total: CostVector = [CostVector::new(1.0, 2.0), CostVector::new(3.0, 4.0)]
            .into_iter()
            .sum();
        assert_eq!(total, CostVector::new(4.0, 6.0));
    }
}
