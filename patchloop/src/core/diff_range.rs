//! Hunk header ranges (`-<start>[,<count>] +<start>[,<count>]`).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))?$").expect("hunk range regex")
});

/// One side of a hunk range. A missing count means one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSide {
    pub start: u32,
    pub count: Option<u32>,
}

impl RangeSide {
    /// Number of lines this side spans.
    pub fn len(&self) -> u32 {
        self.count.unwrap_or(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for RangeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            Some(count) => write!(f, "{},{}", self.start, count),
            None => write!(f, "{}", self.start),
        }
    }
}

/// Parsed `@@ ... @@` range. Renders back to the canonical header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiffRange {
    pub old: RangeSide,
    pub new: RangeSide,
}

impl fmt::Display for DiffRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{} +{}", self.old, self.new)
    }
}

impl FromStr for DiffRange {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let caps = RANGE_RE
            .captures(raw.trim())
            .ok_or_else(|| format!("diff range {raw:?} is not of the form '-a[,b] +c[,d]'"))?;
        let number = |idx: usize| -> Result<Option<u32>, String> {
            caps.get(idx)
                .map(|m| {
                    m.as_str()
                        .parse::<u32>()
                        .map_err(|err| format!("diff range {raw:?}: {err}"))
                })
                .transpose()
        };
        let old_start = number(1)?.unwrap_or_default();
        let new_start = number(3)?.unwrap_or_default();
        Ok(DiffRange {
            old: RangeSide {
                start: old_start,
                count: number(2)?,
            },
            new: RangeSide {
                start: new_start,
                count: number(4)?,
            },
        })
    }
}

impl TryFrom<String> for DiffRange {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<DiffRange> for String {
    fn from(range: DiffRange) -> Self {
        range.to_string()
    }
}
