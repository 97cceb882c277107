/// Application namespace; every local storage key starts with this prefix.
pub const APP_ID: &str = "tinshine_packaging";

/// Application name
pub const APP_NAME: &str = "Tinshine Packaging";

/// Path prefix under which the REST API is mounted
pub const API_PREFIX: &str = "/api";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 3001;

/// Default API base URL used by clients
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api";

/// Maximum accepted request body in bytes (10 MiB)
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Version the server starts from on a fresh data directory
pub const INITIAL_VERSION: u64 = 1;

/// Remote call timeout in seconds
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Background resync interval in minutes
pub const DEFAULT_AUTO_SYNC_MINUTES: u64 = 15;

/// Foreground "check for updates" interval in seconds
pub const DEFAULT_UPDATE_CHECK_SECS: u64 = 60;

/// Poll interval for the cross-process change marker, in milliseconds
pub const DEFAULT_WATCH_POLL_MS: u64 = 1_000;

/// Image shown when neither the product nor its category has one
pub const DEFAULT_IMAGE_URL: &str = "https://space.coze.cn/api/coze_space/gen_image?image_size=square_hd&prompt=solid%20red%20background&sign=975fa253f980fadea83ff085bf52c70b";

/// Record keys owned by the store; caller-supplied values for these are ignored.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];
