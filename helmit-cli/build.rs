// Build script to inject version information from git tags
//
// Falls back to CARGO_PKG_VERSION when git is unavailable.

use std::process::Command;

fn main() {
    let version = git_version().unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=HELMIT_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn git_version() -> Option<String> {
    // "v0.1.0", "v0.1.0-5-gabc123", or "abc123-dirty"
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let described = String::from_utf8(output.stdout).ok()?;
    let described = described.trim();

    if let Some(tagged) = described.strip_prefix('v') {
        // Keep only the release part of "0.1.0-5-gabc123"
        Some(tagged.split('-').next().unwrap_or(tagged).to_string())
    } else {
        let base_version = env!("CARGO_PKG_VERSION");
        Some(format!("{}-{}", base_version, described))
    }
}
