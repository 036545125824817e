//! xlaunch license issuer
//!
//! Seals a license record into the encrypted `key.x` form read by the stub.

use anyhow::{Context, bail};
use clap::Parser;
use std::{fs, panic, path::PathBuf, process};
use xlaunch::LicenseRecord;
use xlaunch::defaults::LICENSE_FILE_NAME;
use xlaunch::exit_codes::{EXIT_CONFIG_ERROR, EXIT_IO_ERROR, EXIT_PANIC, EXIT_SUCCESS};
use xlaunch::license::parse_local;

const VERSION: &str = xlaunch::version::VERSION;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Issue xlaunch license files")]
struct Args {
    /// License code; must match the code built into the stub
    #[arg(long)]
    code: String,

    /// First valid instant, "YYYY-MM-DD HH:MM:SS" local time
    #[arg(long)]
    start: String,

    /// Last valid instant; omit for a license that never expires
    #[arg(long)]
    end: Option<String>,

    /// AES key, hex encoded (16, 24 or 32 bytes)
    #[arg(long)]
    hex_key: String,

    /// AES IV, hex encoded (16 bytes)
    #[arg(long)]
    hex_iv: String,

    /// Output file
    #[arg(short, long, default_value = LICENSE_FILE_NAME)]
    output: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

/// Failures the issuer reports with distinct exit codes
enum IssueError {
    Config(anyhow::Error),
    Io(anyhow::Error),
}

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {panic_info}");
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in license issuer");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    let args = Args::parse();

    if let Some(ref level) = args.log_level {
        xlaunch::logger::JsonLogger::init_with_level(level);
    } else {
        xlaunch::logger::JsonLogger::init();
    }

    match issue(&args) {
        Ok(()) => {
            println!("✅ Wrote {}", args.output.display());
            EXIT_SUCCESS
        }
        Err(IssueError::Config(e)) => {
            eprintln!("Config error: {e:#}");
            EXIT_CONFIG_ERROR
        }
        Err(IssueError::Io(e)) => {
            eprintln!("IO error: {e:#}");
            EXIT_IO_ERROR
        }
    }
}

fn issue(args: &Args) -> Result<(), IssueError> {
    let blob = seal(args).map_err(IssueError::Config)?;
    fs::write(&args.output, blob)
        .with_context(|| format!("failed to write {}", args.output.display()))
        .map_err(IssueError::Io)?;
    log::info!("🔑 License for {:?} written to {:?}", args.code, args.output);
    Ok(())
}

fn seal(args: &Args) -> anyhow::Result<Vec<u8>> {
    let start = parse_local(&args.start).context("invalid --start")?;
    let end = args.end.clone().unwrap_or_default();
    if !end.is_empty() {
        let end_at = parse_local(&end).context("invalid --end")?;
        if end_at <= start {
            bail!("--end {end:?} is not after --start {:?}", args.start);
        }
    }

    let key = hex::decode(&args.hex_key).context("--hex-key is not valid hex")?;
    let iv = hex::decode(&args.hex_iv).context("--hex-iv is not valid hex")?;

    let record = LicenseRecord {
        code: args.code.clone(),
        valid_start_date: args.start.clone(),
        valid_end_date: end,
    };
    record
        .seal(&key, &iv)
        .map_err(|e| anyhow::anyhow!("failed to seal license: {e}"))
}
