//! xlaunch stub binary

use std::{env, panic, process};
use xlaunch::assets::dev_runtime_image;
use xlaunch::defaults::CLI_ENV;
use xlaunch::exit_codes::{EXIT_FAILURE, EXIT_PANIC, EXIT_SUCCESS};
use xlaunch::utils::is_env_true;
use xlaunch::{EmbeddedAssets, LaunchOptions, StubConfig, launch};

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {panic_info}");
        process::exit(EXIT_PANIC);
    }));

    // Wrap main logic in catch_unwind for extra safety
    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in stub");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    xlaunch::logger::JsonLogger::init();

    log::debug!("🚀 Stub process started");

    // Every argument belongs to the application unless CLI mode is on
    let args: Vec<String> = env::args().skip(1).collect();
    log::trace!("📋 Arguments: {args:?}");

    let config = StubConfig::embedded();
    let options = LaunchOptions::from_env();

    if is_env_true(CLI_ENV) {
        return xlaunch::cli::dispatch(&args, &config, &options);
    }

    let embedded = EmbeddedAssets::embedded();
    let dev_image = dev_runtime_image();
    let assets = match &dev_image {
        Some(image) => EmbeddedAssets::new(image, embedded.artifact),
        None => embedded,
    };

    match launch(&config, &assets, &args, &options) {
        Ok(()) => {
            log::debug!("✅ Application finished");
            EXIT_SUCCESS
        }
        Err(failure) => {
            log::error!("❌ {failure}");
            // The only stdout line the stub itself ever writes
            println!("{}", failure.message());
            EXIT_FAILURE
        }
    }
}
