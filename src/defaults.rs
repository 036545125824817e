// Centralized default values for the launcher stub

// =================================
// License defaults
// =================================
pub const LICENSE_FILE_NAME: &str = "key.x"; // Sits next to the stub executable
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S"; // Local time zone
pub const AES_BLOCK_SIZE: usize = 16;

// =================================
// Key handoff
// =================================
pub const HANDOFF_LINE_TERMINATOR: &[u8] = b"\r\n";

// =================================
// Run directory layout
// =================================
pub const DEPLOY_DIR: &str = "deploy"; // Under the system temp directory
pub const RUNTIME_DIR: &str = "jdk";
pub const BIN_DIR: &str = "bin";
pub const RUN_ID_HEX_LEN: usize = 10; // Leading hex chars of hex(code)
pub const RUN_TOKEN_LEN: usize = 12; // Random suffix for unique run dirs
pub const STAGED_ARTIFACT_NAME: &str = "app.jar"; // Under bin/, whatever the source was called

// =================================
// File permissions defaults
// =================================
pub const DEFAULT_FILE_PERMS: u16 = 0o600; // Read/write for owner only
pub const DEFAULT_DIR_PERMS: u16 = 0o700; // Read/write/execute for owner only

// =================================
// Runtime environment variables
// =================================
pub const CLI_ENV: &str = "XLAUNCH_CLI";
pub const UNIQUE_RUN_DIR_ENV: &str = "XLAUNCH_UNIQUE_RUN_DIR";
pub const DEV_RUNTIME_IMAGE_ENV: &str = "XLAUNCH_DEV_RUNTIME_IMAGE"; // Unembedded builds only
