/// Outcome of a document save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSave {
    /// Other documents flipped to inactive by this save.
    pub deactivated: usize,
    /// The save left no active document. Only possible when the caller
    /// tolerates it (debug mode).
    pub left_without_active: bool,
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub document_count: u64,
    pub agreement_count: u64,
    pub user_count: u64,
    pub staff_count: u64,
    pub has_active_document: bool,
}
