pub mod artifact;
pub mod config;
pub mod datum;
pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod queue;
pub mod registry;
pub mod signature;
pub mod stats;
pub mod store;
pub mod tristate;

use sha1::{Digest, Sha1};
use statrs::statistics::Statistics;

/// Boot-time self-test confirming the pipeline's dependency stack is wired
/// correctly: the fingerprint hasher, JSON serialization, and the windowed
/// statistics kernel's `statrs` backend.
pub fn pipeline_self_check() -> Result<String, String> {
    let mut report = String::from("perfsignal pipeline check:\n");

    let mut hasher = Sha1::new();
    hasher.update(b"perfsignal");
    let digest = hex::encode(hasher.finalize());
    report.push_str(&format!("- sha1 fingerprinting: {digest}\n"));

    let value = serde_json::json!({"suite": "speedometer3", "platform": "linux64"});
    let _ = serde_json::to_string(&value).map_err(|e| e.to_string())?;
    report.push_str("- serde_json sorted serialization: ok\n");

    let data = [1.0, 2.0, 3.0, 4.0, 5.0];
    let mean = data.mean();
    let std_dev = data.std_dev();
    report.push_str(&format!(
        "- statrs kernel: mean={mean:.1} std_dev={std_dev:.4}\n"
    ));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_check_succeeds() {
        assert!(pipeline_self_check().unwrap().contains("sha1"));
    }
}
