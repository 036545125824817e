use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed key and IV for development builds; release builds must set their own.
const DEV_HEX_KEY: &str = "000102030405060708090a0b0c0d0e0f";
const DEV_HEX_IV: &str = "0f0e0d0c0b0a09080706050403020100";

/// Build-time inputs baked into the stub as `env!` constants.
const STAMPED_VARS: &[(&str, &str)] = &[
    ("XLAUNCH_CODE", "xlaunch-dev"),
    ("XLAUNCH_HEX_KEY", DEV_HEX_KEY),
    ("XLAUNCH_HEX_IV", DEV_HEX_IV),
    ("XLAUNCH_VALID_END", ""),
    ("XLAUNCH_KEY_ALGORITHM", "AES/CBC/PKCS5Padding"),
    ("XLAUNCH_KEY_SIZE", "128"),
    ("XLAUNCH_IV_SIZE", "128"),
    ("XLAUNCH_KEY_PASSWORD", ""),
    ("XLAUNCH_APP_ARGS", ""),
    ("XLAUNCH_RUNTIME_COMMAND", "java"),
];

fn main() {
    // Read version from VERSION file at the repo root unless overridden
    let version = if let Ok(v) = env::var("XLAUNCH_VERSION") {
        v
    } else {
        let version_file = Path::new("VERSION");
        if version_file.exists() {
            fs::read_to_string(version_file)
                .unwrap_or_else(|_| "0.0.1".to_string())
                .trim()
                .to_string()
        } else {
            "0.0.1".to_string()
        }
    };
    println!("cargo:rustc-env=XLAUNCH_VERSION={}", version);
    println!("cargo:rerun-if-changed=VERSION");
    println!("cargo:rerun-if-env-changed=XLAUNCH_VERSION");

    let release = env::var("PROFILE").is_ok_and(|p| p == "release");
    for (key, default) in STAMPED_VARS {
        let dev_secret = *default == DEV_HEX_KEY || *default == DEV_HEX_IV;
        if release && dev_secret && env::var(key).is_err() {
            println!("cargo:warning={} is unset, using the development value", key);
        }
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        println!("cargo:rustc-env={}={}", key, value);
        println!("cargo:rerun-if-env-changed={}", key);
    }

    // An unset start date means "valid from the moment the stub was built"
    let valid_start = env::var("XLAUNCH_VALID_START")
        .unwrap_or_else(|_| chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
    println!("cargo:rustc-env=XLAUNCH_VALID_START={}", valid_start);
    println!("cargo:rerun-if-env-changed=XLAUNCH_VALID_START");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    embed_asset("XLAUNCH_RUNTIME_IMAGE", &out_dir.join("runtime.img"));
    embed_asset("XLAUNCH_APP_ARTIFACT", &out_dir.join("app.artifact"));
}

/// Copy the file named by `var` into OUT_DIR, or leave an empty placeholder.
fn embed_asset(var: &str, dest: &Path) {
    println!("cargo:rerun-if-env-changed={}", var);
    match env::var(var) {
        Ok(src) if !src.is_empty() => {
            println!("cargo:rerun-if-changed={}", src);
            fs::copy(&src, dest).unwrap_or_else(|e| panic!("failed to embed {}: {}", src, e));
        }
        _ => {
            fs::write(dest, b"").expect("failed to write empty asset placeholder");
        }
    }
}
