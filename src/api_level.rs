//! API level selection for dual-track remote APIs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which track of a remote API a handler speaks.
///
/// Pinned when a handler is registered and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiLevel {
    /// The stable `v1` API.
    #[default]
    Production,
    /// The `beta` API.
    Beta,
}

impl ApiLevel {
    /// Path segment of the Compute API for this level.
    #[must_use]
    pub const fn compute_version(self) -> &'static str {
        match self {
            Self::Production => "v1",
            Self::Beta => "beta",
        }
    }

    /// Returns true for the beta level.
    #[must_use]
    pub const fn is_beta(self) -> bool {
        matches!(self, Self::Beta)
    }
}

impl fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Production => write!(f, "PRODUCTION"),
            Self::Beta => write!(f, "BETA"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_version() {
        assert_eq!(ApiLevel::Production.compute_version(), "v1");
        assert_eq!(ApiLevel::Beta.compute_version(), "beta");
        assert_eq!(ApiLevel::default(), ApiLevel::Production);
    }
}
