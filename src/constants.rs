/// Export document schema understood by this build. Documents with a different
/// major version are refused.
pub const EXPORT_SCHEMA_VERSION: &str = "1.0";

/// Fence that opens and closes the front matter of an export document
pub const EXPORT_FENCE: &str = "+++";

// Status prefixes used when rendering per-record messages
pub const PREFIX_IMPORTED: &str = "IMPORTED";
pub const PREFIX_WOULD_IMPORT: &str = "WOULD IMPORT";
pub const PREFIX_UPDATED: &str = "UPDATED";
pub const PREFIX_WOULD_UPDATE: &str = "WOULD UPDATE";
pub const PREFIX_DUPLICATE: &str = "DUPLICATE";
pub const PREFIX_FLAGGED: &str = "FLAGGED FOR REVIEW";
pub const PREFIX_WOULD_FLAG: &str = "WOULD FLAG FOR REVIEW";
pub const PREFIX_REJECTED: &str = "REJECTED";
pub const PREFIX_ERROR: &str = "ERROR";
pub const PREFIX_SKIP: &str = "SKIP";

/// Default number of ranked suggestions returned on a fuzzy miss
pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

/// Default Jaro-Winkler score a catalog name must reach to be suggested
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.75;

/// Discovery statuses that mean the listing should not be imported
pub fn default_skip_statuses() -> Vec<String> {
    vec![
        "cancelled".to_string(),
        "canceled".to_string(),
        "postponed".to_string(),
    ]
}
