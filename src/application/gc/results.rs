/// Result of one sweep over the byte backend
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepResult {
    /// Stored objects old enough to be considered
    pub inspected: usize,
    /// Objects still referenced by a blob record
    pub referenced: usize,
    /// Unreferenced objects removed from the backend
    pub deleted: usize,
    /// Per-object failures; the sweep carries on past them
    pub errors: Vec<String>,
}

impl SweepResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_deletions(&self) -> bool {
        self.deleted > 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Sweep inspected {} objects: {} referenced, {} deleted, {} errors",
            self.inspected,
            self.referenced,
            self.deleted,
            self.errors.len()
        )
    }
}
