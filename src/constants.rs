// Messages
pub const MESSAGE_OK: &str = "ok";
pub const MESSAGE_DRAFT_CREATED: &str = "NFe draft created";
pub const MESSAGE_DRAFT_UPDATED: &str = "NFe draft items replaced";
pub const MESSAGE_AUTHORIZED: &str = "NFe authorized";
pub const MESSAGE_CANCELLED: &str = "NFe cancelled";
pub const MESSAGE_CERTIFICATE_UPLOADED: &str = "Certificate uploaded";
pub const MESSAGE_CERTIFICATE_DELETED: &str = "Certificate deleted";
pub const MESSAGE_INTERNAL_SERVER_ERROR: &str = "Internal server error";
pub const MESSAGE_USER_HEADER_MISSING: &str = "X-User-Id header is missing or invalid";

// Headers
pub const USER_ID_HEADER: &str = "X-User-Id";

// Cancellation rules
pub const CANCELLATION_WINDOW_HOURS: i64 = 24;
pub const MIN_JUSTIFICATION_LENGTH: usize = 15;
pub const MAX_JUSTIFICATION_LENGTH: usize = 255;

// Gateway
pub const TRANSPORT_ERROR_STATUS_CODE: &str = "999";
pub const ACCESS_KEY_LENGTH: usize = 44;
/// Added to the gateway timeout to form the lease of a submission claim.
pub const SUBMISSION_CLAIM_GRACE_SECS: i64 = 300;

// Document limits
pub const MAX_ITEMS_PER_DOCUMENT: usize = 990;
pub const MAX_SERIES: i32 = 999;
pub const MAX_DOCUMENT_NUMBER: i32 = 999_999_999;

// Pagination
pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 500;

// Certificates
pub const DEFAULT_EXPIRING_WINDOW_DAYS: i64 = 30;
