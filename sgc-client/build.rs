//! Build script for sgc-client
//!
//! Stamps the binary with the commit, build time and profile so support logs
//! identify the exact client build.

use std::process::Command;

fn git_commit() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    let commit = git_commit().unwrap_or_else(|| "unknown".to_string());
    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=SGC_GIT_COMMIT={}", commit);
    println!("cargo:rustc-env=SGC_BUILT_AT={}", built_at);
    println!("cargo:rustc-env=SGC_BUILD_PROFILE={}", profile);
}
