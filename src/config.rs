//! Build configuration for SSA construction
//!
//! This module provides the options that decide how a package build reacts to
//! diagnostics, how much is written to the event log and whether a program builds
//! its packages concurrently.

use strum::{Display, EnumIter};

/// What a package build does after a statement produced a diagnostic.
///
/// The two policies produce different partial graphs for erroneous input, so the
/// choice is part of the build result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum ErrorPolicy {
    /// Record the diagnostic on the enclosing function and continue with the next
    /// sibling statement. Failing conditions of structured statements are replaced by
    /// an undefined marker so the control flow stays well-formed.
    #[default]
    #[strum(serialize = "best-effort")]
    BestEffort,
    /// Stop the package build at the first diagnostic.
    #[strum(serialize = "strict")]
    Strict,
}

/// Configuration for building packages into SSA form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildConfig {
    /// How diagnostics affect the remaining build
    pub error_policy: ErrorPolicy,

    /// Record resolver level events (block sealing, phi creation and simplification)
    /// in addition to the function and package level events
    pub trace: bool,

    /// Build the packages of a program on the rayon thread pool
    pub parallel: bool,

    /// Maximum nesting depth of function literals (default: 64)
    pub max_nesting_depth: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::BestEffort,
            trace: false,
            parallel: true,
            max_nesting_depth: 64,
        }
    }
}

impl BuildConfig {
    /// Creates a configuration that stops at the first diagnostic
    #[must_use]
    pub fn strict() -> Self {
        Self {
            error_policy: ErrorPolicy::Strict,
            ..Self::default()
        }
    }

    /// Creates a configuration that records every resolver event
    ///
    /// Useful when debugging phi placement, the event log grows with every
    /// variable read that crosses a block boundary.
    #[must_use]
    pub fn traced() -> Self {
        Self {
            trace: true,
            ..Self::default()
        }
    }

    /// Creates a configuration that builds packages on the calling thread only
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Returns true if the first diagnostic aborts the build
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.error_policy == ErrorPolicy::Strict
    }
}
