//! Build script - embeds the short git revision as WALK_TRACKER_REVISION

use std::process::Command;

fn main() {
    let revision = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=WALK_TRACKER_REVISION={revision}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
