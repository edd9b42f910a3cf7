// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "apiquery";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".apiquery";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "apiquery.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "APIQUERY_CONFIG";

// =============================================================================
// Environment Variables - Logging
// =============================================================================

/// Environment variable for log filter (falls back to RUST_LOG)
pub const ENV_LOG: &str = "APIQUERY_LOG";

// =============================================================================
// Environment Variables - Query Compiler
// =============================================================================

/// Environment variable for the order applied when `@order` is absent
pub const ENV_DEFAULT_ORDER: &str = "APIQUERY_DEFAULT_ORDER";

/// Environment variable for the largest accepted `@limit`
pub const ENV_MAX_LIMIT: &str = "APIQUERY_MAX_LIMIT";

/// Environment variable for the seal ids `@verified` expands to (comma separated)
pub const ENV_VERIFIED_SEALS: &str = "APIQUERY_VERIFIED_SEALS";

// =============================================================================
// Query Compiler Defaults
// =============================================================================

/// Order applied when the request has no `@order`
pub const DEFAULT_ORDER: &str = "id ASC";

/// Properties always selected when the entity has them
pub const DEFAULT_IMPLICIT_SELECT: &[&str] = &["publicLocation"];

/// Maximum number of filter keys in one request
pub const DEFAULT_MAX_FILTERS: usize = 50;
