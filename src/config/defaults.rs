//! Default configuration values

/// Longest accepted build name
pub const MAX_BUILD_NAME_LEN: usize = 64;

/// Server key size in bytes
pub const SERVER_KEY_LEN: usize = 32;

/// Random input mixed into each ticket secret, in bytes
pub const SECRET_NONCE_LEN: usize = 32;

/// Events buffered per subscriber before it lags
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// On-disk registry layout version
pub const REGISTRY_FORMAT_VERSION: u32 = 1;

/// Prefix of staged artifact files
pub const STAGING_PREFIX: &str = "external-build";

/// Compiler runs longer than this are killed
pub const DEFAULT_COMPILER_TIMEOUT_SECS: u64 = 600; // 10 minutes

/// Default compiler program, looked up on `PATH`
pub const DEFAULT_COMPILER_PROGRAM: &str = "buildyard-compile";

/// Registry file name under the data directory
pub const REGISTRY_FILE: &str = "registry.toml";

/// Server key file name under the data directory
pub const SERVER_KEY_FILE: &str = "server.key";

/// Minimum proptest iterations
pub const MIN_PROPTEST_ITERATIONS: u32 = 100;
