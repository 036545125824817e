//! Fixtures shared by the integration tests

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use xlaunch::StubConfig;
use xlaunch::handoff::KeyBundle;

pub const CODE: &str = "integration-build";
pub const HEX_KEY: &str = "603deb1015ca71be2b73aef0857d7781";
pub const HEX_IV: &str = "000102030405060708090a0b0c0d0e0f";

pub fn config(start: &str, end: &str) -> StubConfig {
    StubConfig {
        code: CODE.to_string(),
        hex_key: HEX_KEY.to_string(),
        hex_iv: HEX_IV.to_string(),
        valid_start_date: start.to_string(),
        valid_end_date: end.to_string(),
        key_bundle: KeyBundle::new("AES/CBC/PKCS5Padding", "128", "128", "s3cret"),
        app_args: "-Xmx64m -Dmode=test".to_string(),
        runtime_command: "java".to_string(),
    }
}

/// Gzipped tar holding `bin/java` with the given shell script body
pub fn runtime_image(script: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut dir = tar::Header::new_gnu();
    dir.set_entry_type(tar::EntryType::Directory);
    dir.set_size(0);
    dir.set_mode(0o755);
    builder.append_data(&mut dir, "bin/", &[][..]).unwrap();

    let body = format!("#!/bin/sh\n{script}\n");
    let mut java = tar::Header::new_gnu();
    java.set_size(body.len() as u64);
    java.set_mode(0o755);
    builder.append_data(&mut java, "bin/java", body.as_bytes()).unwrap();

    let notes = b"runtime library";
    let mut lib = tar::Header::new_gnu();
    lib.set_size(notes.len() as u64);
    lib.set_mode(0o644);
    builder.append_data(&mut lib, "lib/rt.txt", &notes[..]).unwrap();

    let tar = builder.into_inner().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}
