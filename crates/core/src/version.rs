//! Client version integers (`year * 25000 + month * 1800 + day * 50 + build`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded client version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Release year.
    pub year: u32,
    /// Release month.
    pub month: u32,
    /// Release day.
    pub day: u32,
    /// Build number within the day.
    pub build: u32,
}

impl VersionInfo {
    /// Create a version from its parts.
    pub const fn new(year: u32, month: u32, day: u32, build: u32) -> Self {
        Self {
            year,
            month,
            day,
            build,
        }
    }

    /// Pack into the wire integer.
    pub const fn encode(&self) -> u32 {
        self.year * 25000 + self.month * 1800 + self.day * 50 + self.build
    }

    /// Unpack a wire integer.
    pub const fn decode(mut version: u32) -> Self {
        let year = version / 25000;
        version %= 25000;
        let month = version / 1800;
        version %= 1800;
        let day = version / 50;
        let build = version % 50;
        Self {
            year,
            month,
            day,
            build,
        }
    }
}

impl From<u32> for VersionInfo {
    fn from(value: u32) -> Self {
        Self::decode(value)
    }
}

/// Formats as `year.month.day`; the build number is not shown.
impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.year, self.month, self.day)
    }
}
