/// Default config file name, looked up in the site root.
pub const CONFIG_FILENAME: &str = "sitepub.toml";

/// Number of hex characters of the SHA-256 digest embedded in asset names.
pub const ASSET_DIGEST_LEN: usize = 16;

/// Default number of concurrent object store requests per stage.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// One week.
pub const LONG_CACHE_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Five minutes.
pub const SHORT_CACHE_SECONDS: u64 = 5 * 60;

pub const DELETE_TAG_KEY: &str = "sitepub-delete";
pub const DELETE_TAG_VALUE: &str = "true";

/// Maximum keys a single bucket listing page returns.
pub const LIST_PAGE_SIZE: usize = 1000;

/// Directory (relative to the output root) that hashed assets are written under.
pub const ASSETS_OUTPUT_DIR: &str = "assets";

/// Directory (relative to the output root) that posts are written under.
pub const POSTS_OUTPUT_DIR: &str = "blog/posts";
