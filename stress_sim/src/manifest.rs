//! Reproducibility manifest for a sweep run.

use std::process::Command;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub run_id: String,
    pub generated_at_utc: String,
    pub commit_hash: String,
    pub grid_hash: String,
    pub output_hash: String,
    pub compiler: String,
    pub runtime: String,
    pub base_seed: u64,
    pub paths_per_config: u32,
}

impl RunManifest {
    pub fn build(
        grid_hash: &str,
        records_json: &[u8],
        base_seed: u64,
        paths_per_config: u32,
    ) -> Self {
        let generated_at_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let output_hash = hex(&Sha256::digest(records_json));
        let run_id = hex(&Sha256::digest(
            format!("{grid_hash}:{base_seed}:{generated_at_utc}").as_bytes(),
        ))[..16]
            .to_string();

        Self {
            run_id,
            generated_at_utc,
            commit_hash: commit_hash(),
            grid_hash: grid_hash.to_string(),
            output_hash,
            compiler: compiler_version(),
            runtime: format!(
                "{}-{} stress_sim/{}",
                std::env::consts::OS,
                std::env::consts::ARCH,
                env!("CARGO_PKG_VERSION"),
            ),
            base_seed,
            paths_per_config,
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Current commit, or the sentinel for a repository without one.
fn commit_hash() -> String {
    Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "UNBORN_HEAD".to_string())
}

fn compiler_version() -> String {
    Command::new("rustc")
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "rustc unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_hash_pins_the_records() {
        let a = RunManifest::build("gridhash", b"records-a", 1, 10);
        let b = RunManifest::build("gridhash", b"records-a", 1, 10);
        let c = RunManifest::build("gridhash", b"records-b", 1, 10);
        assert_eq!(a.output_hash, b.output_hash);
        assert_ne!(a.output_hash, c.output_hash);
        assert_eq!(a.run_id.len(), 16);
    }
}
