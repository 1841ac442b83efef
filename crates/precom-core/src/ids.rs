//! ID prefixes for text-keyed tables.
//!
//! IDs are generated in SQL as `{prefix}-{8 hex chars}` (see `PrecomDb::generate_id`).

pub const PREFIX_BACKUP: &str = "bkp";
pub const PREFIX_SYNC: &str = "syn";
pub const PREFIX_RUN: &str = "run";

/// Every prefix in use, for uniqueness checks in tests.
pub const ALL_PREFIXES: &[&str] = &[PREFIX_BACKUP, PREFIX_SYNC, PREFIX_RUN];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prefixes_are_unique() {
        let unique: HashSet<_> = ALL_PREFIXES.iter().collect();
        assert_eq!(unique.len(), ALL_PREFIXES.len());
    }
}
