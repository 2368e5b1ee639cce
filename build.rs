//! Stamps the binary with a version and commit for `mpd-control --version`.
//!
//! Release builds export `MPDC_VERSION` (the tag being released) and
//! `MPDC_GIT_SHA`. Local builds fall back to the crate version and
//! `git rev-parse`; CI runs without an explicit SHA use `GITHUB_SHA`.

use std::env;
use std::process::Command;

const SHORT_SHA_LEN: usize = 7;

fn main() {
    let version = env::var("MPDC_VERSION")
        .or_else(|_| env::var("CARGO_PKG_VERSION"))
        .unwrap_or_else(|_| "unknown".into());

    let git_sha = env::var("MPDC_GIT_SHA")
        .or_else(|_| env::var("GITHUB_SHA").map(|sha| short_sha(&sha)))
        .ok()
        .or_else(git_head)
        .unwrap_or_else(|| "unknown".into());

    println!("cargo:rustc-env=MPDC_VERSION={}", version);
    println!("cargo:rustc-env=MPDC_GIT_SHA={}", git_sha);

    for var in ["MPDC_VERSION", "MPDC_GIT_SHA", "GITHUB_SHA"] {
        println!("cargo:rerun-if-env-changed={}", var);
    }
}

fn short_sha(sha: &str) -> String {
    sha.chars().take(SHORT_SHA_LEN).collect()
}

/// Short hash of HEAD, if this is a git checkout
fn git_head() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8(output.stdout).ok()?;
    Some(sha.trim().to_string())
}
