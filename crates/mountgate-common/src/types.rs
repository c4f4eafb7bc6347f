//! Domain primitive types used across the mountgate workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::MNT_SHARED;

/// Identifier of a mount-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MountId(u64);

impl MountId {
    /// Creates a mount ID from its raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mnt#{}", self.0)
    }
}

/// A mount's flags word.
///
/// Only [`MNT_SHARED`] has meaning to the hook; every other bit is carried
/// through untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MountFlags(u32);

impl MountFlags {
    /// The shared-propagation bit on its own.
    pub const SHARED: Self = Self(MNT_SHARED);

    /// Wraps a raw flags word.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw flags word.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether the shared-propagation bit is set.
    #[must_use]
    pub const fn is_shared(self) -> bool {
        self.0 & MNT_SHARED != 0
    }

    /// The same flags with the shared-propagation bit cleared.
    #[must_use]
    pub const fn without_shared(self) -> Self {
        Self(self.0 & !MNT_SHARED)
    }
}

impl std::ops::BitOr for MountFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for MountFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Address of a resolved kernel symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolAddr(u64);

impl SymbolAddr {
    /// Wraps a raw address.
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Whether this is the null address.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SymbolAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// How the hook decides whether an invocation is in scope.
///
/// The two modes are alternatives, never layered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// In scope while the controller has paused propagation.
    #[default]
    Toggle,
    /// In scope until the bootstrap signal, then only for the trusted
    /// source device.
    Bootstrap,
}

impl fmt::Display for ScopeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toggle => write!(f, "toggle"),
            Self::Bootstrap => write!(f, "bootstrap"),
        }
    }
}
