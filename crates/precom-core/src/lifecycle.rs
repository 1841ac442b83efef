//! Soft-delete lifecycle shared by joint records and master rows.
//!
//! ```text
//! active ⇄ soft_deleted → purged
//! ```
//!
//! `Purged` is terminal and never persisted: purging physically removes the row.
//! Storage uses two columns (`is_deleted`, `deleted_time`); [`Lifecycle::from_columns`]
//! and [`Lifecycle::to_columns`] convert between the two representations.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Active,
    SoftDeleted { deleted_at: DateTime<Utc> },
    Purged,
}

impl Lifecycle {
    /// Rebuild the lifecycle from its stored columns.
    ///
    /// Rows flagged deleted by an external writer without a timestamp fall back to
    /// `fallback` (usually the row's `updated_at`).
    #[must_use]
    pub const fn from_columns(
        is_deleted: bool,
        deleted_time: Option<DateTime<Utc>>,
        fallback: DateTime<Utc>,
    ) -> Self {
        if !is_deleted {
            return Self::Active;
        }
        match deleted_time {
            Some(deleted_at) => Self::SoftDeleted { deleted_at },
            None => Self::SoftDeleted {
                deleted_at: fallback,
            },
        }
    }

    /// Stored `(is_deleted, deleted_time)` pair. `Purged` maps to deleted with no time;
    /// callers never write it.
    #[must_use]
    pub const fn to_columns(self) -> (bool, Option<DateTime<Utc>>) {
        match self {
            Self::Active => (false, None),
            Self::SoftDeleted { deleted_at } => (true, Some(deleted_at)),
            Self::Purged => (true, None),
        }
    }

    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn deleted_at(self) -> Option<DateTime<Utc>> {
        match self {
            Self::SoftDeleted { deleted_at } => Some(deleted_at),
            Self::Active | Self::Purged => None,
        }
    }

    /// `Active → SoftDeleted`. Returns `None` from any other state.
    #[must_use]
    pub const fn soft_delete(self, now: DateTime<Utc>) -> Option<Self> {
        match self {
            Self::Active => Some(Self::SoftDeleted { deleted_at: now }),
            Self::SoftDeleted { .. } | Self::Purged => None,
        }
    }

    /// `SoftDeleted → Active`. Returns `None` from any other state.
    #[must_use]
    pub const fn restore(self) -> Option<Self> {
        match self {
            Self::SoftDeleted { .. } => Some(Self::Active),
            Self::Active | Self::Purged => None,
        }
    }

    /// `SoftDeleted → Purged` once the row has been deleted for longer than `grace`.
    #[must_use]
    pub fn purge(self, now: DateTime<Utc>, grace: Duration) -> Option<Self> {
        self.is_purgeable(now, grace).then_some(Self::Purged)
    }

    #[must_use]
    pub fn is_purgeable(self, now: DateTime<Utc>, grace: Duration) -> bool {
        match self {
            Self::SoftDeleted { deleted_at } => deleted_at < now - grace,
            Self::Active | Self::Purged => false,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::SoftDeleted { .. } => "soft_deleted",
            Self::Purged => "purged",
        }
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
