use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An inclusive range of integers, e.g. a span of network ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// A range covering a single value.
    pub fn single(value: u64) -> Self {
        Self {
            begin: value,
            end: value,
        }
    }

    pub fn contains(&self, value: u64) -> bool {
        value >= self.begin && value <= self.end
    }
}

/// The quantity carried by a resource.
///
/// A closed set of kinds: scalars (cpus, mem, disk), integer range sets
/// (ports) and discrete string sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    Scalar(f64),
    Ranges(Vec<Range>),
    Set(Vec<String>),
}

#[derive(Error, Debug)]
pub enum ValueError {
    #[error("value kinds differ: '{expected}' vs '{found}'")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

impl Value {
    /// Short symbolic name for the value kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Ranges(_) => "ranges",
            Value::Set(_) => "set",
        }
    }

    /// Whether an available quantity of `self` can satisfy `demand`.
    ///
    /// Scalars compare by magnitude; ranges and sets by containment.
    /// Mismatched kinds never fit.
    pub fn fits(&self, demand: &Value) -> bool {
        match (self, demand) {
            (Value::Scalar(avail), Value::Scalar(need)) => avail >= need,
            (Value::Ranges(avail), Value::Ranges(need)) => ranges_contain(avail, need),
            (Value::Set(avail), Value::Set(need)) => need.iter().all(|v| avail.contains(v)),
            _ => false,
        }
    }

    /// Combine two quantities of the same kind.
    pub fn merge(&self, other: &Value) -> Result<Value, ValueError> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a + b)),
            (Value::Ranges(a), Value::Ranges(b)) => Ok(Value::Ranges(merge_ranges(a, b))),
            (Value::Set(a), Value::Set(b)) => {
                let mut out = a.clone();
                for v in b {
                    if !out.contains(v) {
                        out.push(v.clone());
                    }
                }
                Ok(Value::Set(out))
            }
            _ => Err(ValueError::KindMismatch {
                expected: self.kind(),
                found: other.kind(),
            }),
        }
    }

    /// Remove `demand` from an available quantity.
    ///
    /// Callers are expected to have checked [`Value::fits`] first; scalar
    /// subtraction clamps at zero.
    pub fn subtract(&self, demand: &Value) -> Result<Value, ValueError> {
        match (self, demand) {
            (Value::Scalar(avail), Value::Scalar(need)) => {
                Ok(Value::Scalar((avail - need).max(0.0)))
            }
            (Value::Ranges(avail), Value::Ranges(need)) => {
                Ok(Value::Ranges(subtract_ranges(avail, need)))
            }
            (Value::Set(avail), Value::Set(need)) => Ok(Value::Set(
                avail.iter().filter(|v| !need.contains(v)).cloned().collect(),
            )),
            _ => Err(ValueError::KindMismatch {
                expected: self.kind(),
                found: demand.kind(),
            }),
        }
    }

    /// Iterate every individual integer covered by a ranges value.
    ///
    /// Empty for scalars and sets.
    pub fn flattened(&self) -> Vec<u64> {
        match self {
            Value::Ranges(ranges) => ranges.iter().flat_map(|r| r.begin..=r.end).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&[Range]> {
        match self {
            Value::Ranges(r) => Some(r),
            _ => None,
        }
    }
}

/// Union of two range lists, normalized: sorted, with overlapping and
/// adjacent ranges coalesced.
pub fn merge_ranges(a: &[Range], b: &[Range]) -> Vec<Range> {
    let mut all: Vec<Range> = a.iter().chain(b.iter()).copied().collect();
    all.sort();

    let mut out: Vec<Range> = Vec::with_capacity(all.len());
    for range in all {
        match out.last_mut() {
            // Coalesce when overlapping or directly adjacent.
            Some(last) if range.begin <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => out.push(range),
        }
    }
    out
}

/// Whether `avail` covers every value of `need`.
pub fn ranges_contain(avail: &[Range], need: &[Range]) -> bool {
    need.iter()
        .all(|n| avail.iter().any(|a| a.begin <= n.begin && a.end >= n.end))
}

/// Remove every value of `remove` from `from`, splitting ranges as needed.
pub fn subtract_ranges(from: &[Range], remove: &[Range]) -> Vec<Range> {
    let mut current: Vec<Range> = merge_ranges(from, &[]);
    for r in merge_ranges(remove, &[]) {
        let mut next = Vec::with_capacity(current.len() + 1);
        for c in current {
            if r.end < c.begin || r.begin > c.end {
                // No overlap.
                next.push(c);
                continue;
            }
            if c.begin < r.begin {
                next.push(Range::new(c.begin, r.begin - 1));
            }
            if c.end > r.end {
                next.push(Range::new(r.end + 1, c.end));
            }
        }
        current = next;
    }
    current
}
