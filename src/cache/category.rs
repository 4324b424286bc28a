//! Cache categories and key layout.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Partition of the service cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Package info keyed by package id
    Package,
    /// Course lists keyed by package id
    Courses,
    /// Enrollment counts keyed by course id, plus the aggregate summary
    Enrollment,
}

impl CacheCategory {
    pub const ALL: [CacheCategory; 3] = [
        CacheCategory::Package,
        CacheCategory::Courses,
        CacheCategory::Enrollment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Package => "package",
            CacheCategory::Courses => "courses",
            CacheCategory::Enrollment => "enrollment",
        }
    }

    /// Builds the store key for an id, e.g. `package:42`.
    pub fn key(&self, id: &str) -> String {
        format!("{}:{}", self.as_str(), id)
    }

    /// Builds the store key for a slot.
    ///
    /// The aggregate key uses `#` instead of `:`, so no id can produce it.
    pub fn slot_key(&self, slot: CacheSlot<'_>) -> String {
        match slot {
            CacheSlot::Id(id) => self.key(id),
            CacheSlot::Aggregate => format!("{}#aggregate", self.as_str()),
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            CacheCategory::Package => 0,
            CacheCategory::Courses => 1,
            CacheCategory::Enrollment => 2,
        }
    }
}

// == Cache Slot ==
/// One addressable entry within a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSlot<'a> {
    /// Entry for a single package or course id
    Id(&'a str),
    /// Category-wide figure, e.g. the enrollment summary
    Aggregate,
}

impl<'a> From<&'a str> for CacheSlot<'a> {
    fn from(id: &'a str) -> Self {
        CacheSlot::Id(id)
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "package" | "packages" => Ok(CacheCategory::Package),
            "courses" | "course" => Ok(CacheCategory::Courses),
            "enrollment" | "enrollments" => Ok(CacheCategory::Enrollment),
            other => Err(other.to_string()),
        }
    }
}
