//! xlaunch - license-gated launcher stub
//!
//! The stub checks a time-bounded license, stages a private runtime from
//! assets compiled into the binary, runs the protected application on it and
//! kills the application when the license runs out.

// Enforce strict code quality and reliability
#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,
    unreachable_pub,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,
)]
#![warn(
    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_enum_variant,

    // Code clarity and maintainability
    clippy::cognitive_complexity,
    clippy::too_many_arguments,
    clippy::type_complexity,

    // Best practices
    clippy::clone_on_ref_ptr,
    clippy::wildcard_imports,
    clippy::enum_glob_use,
    clippy::if_not_else,
    clippy::single_match_else,
    clippy::needless_continue,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]

pub mod assets;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod defaults;
pub mod exceptions;
pub mod exit_codes;
pub mod handoff;
pub mod launcher;
pub mod license;
pub mod logger;
pub mod paths;
pub mod stage;
pub mod supervisor;
pub mod utils;
pub mod version;

pub use assets::EmbeddedAssets;
pub use config::StubConfig;
pub use exceptions::StubError;
pub use launcher::{LaunchFailure, LaunchOptions, LaunchPhase, launch};
pub use license::{LicenseRecord, Remaining};
pub use supervisor::RunOutcome;
