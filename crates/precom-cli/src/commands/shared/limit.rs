//! Row caps for the listing commands (`status`, `backup list`).

/// Number of rows a listing prints. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLimit(u32);

impl RowLimit {
    /// First non-zero cap among the command's own flag and `--limit`,
    /// else `default`. A zero cap is treated as unset.
    #[must_use]
    pub fn resolve(command: Option<u32>, global: Option<u32>, default: u32) -> Self {
        let chosen = [command, global]
            .into_iter()
            .flatten()
            .find(|&n| n > 0)
            .unwrap_or(default);
        Self(chosen.max(1))
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}
