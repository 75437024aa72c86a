//! External JSON shape of a performance artifact (§6). Parsing is the only
//! validation this core performs; full schema validation is assumed to
//! happen upstream (§1) — a parse failure here is already past that gate
//! and is surfaced as `IngestError::Validation`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ArtifactEnvelope {
    pub performance_data: PerformanceDataField,
}

/// `performance_data` may be a single object or a list of them (§6).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PerformanceDataField {
    One(PerfArtifact),
    Many(Vec<PerfArtifact>),
}

impl PerformanceDataField {
    pub fn into_vec(self) -> Vec<PerfArtifact> {
        match self {
            PerformanceDataField::One(a) => vec![a],
            PerformanceDataField::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FrameworkRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationRef {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct PerfArtifact {
    pub framework: FrameworkRef,
    pub application: Option<ApplicationRef>,
    #[serde(rename = "pushTimestamp")]
    pub push_timestamp: Option<i64>,
    pub suites: Vec<Suite>,
}

impl PerfArtifact {
    pub fn application_name(&self) -> String {
        self.application.as_ref().map(|a| a.name.clone()).unwrap_or_default()
    }

    pub fn application_version(&self) -> String {
        self.application
            .as_ref()
            .map(|a| a.version.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
pub struct Suite {
    pub name: String,
    #[serde(rename = "publicName")]
    pub public_name: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    #[serde(rename = "lowerIsBetter")]
    pub lower_is_better: Option<bool>,
    #[serde(rename = "extraOptions")]
    pub extra_options: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "shouldAlert")]
    pub should_alert: Option<bool>,
    pub monitor: Option<bool>,
    #[serde(rename = "alertNotifyEmails", default)]
    pub alert_notify_emails: Vec<String>,
    #[serde(rename = "alertChangeType")]
    pub alert_change_type: Option<String>,
    #[serde(rename = "alertThreshold")]
    pub alert_threshold: Option<f64>,
    #[serde(rename = "minBackWindow")]
    pub min_back_window: Option<u32>,
    #[serde(rename = "maxBackWindow")]
    pub max_back_window: Option<u32>,
    #[serde(rename = "foreWindow")]
    pub fore_window: Option<u32>,
    #[serde(default)]
    pub subtests: Vec<Subtest>,
}

#[derive(Debug, Deserialize)]
pub struct Subtest {
    pub name: String,
    #[serde(rename = "publicName")]
    pub public_name: Option<String>,
    pub value: f64,
    pub unit: Option<String>,
    #[serde(rename = "lowerIsBetter")]
    pub lower_is_better: Option<bool>,
    #[serde(rename = "shouldAlert")]
    pub should_alert: Option<bool>,
    #[serde(rename = "alertChangeType")]
    pub alert_change_type: Option<String>,
    #[serde(rename = "alertThreshold")]
    pub alert_threshold: Option<f64>,
    #[serde(rename = "minBackWindow")]
    pub min_back_window: Option<u32>,
    #[serde(rename = "maxBackWindow")]
    pub max_back_window: Option<u32>,
    #[serde(rename = "foreWindow")]
    pub fore_window: Option<u32>,
    #[serde(default)]
    pub replicates: Vec<f64>,
}

/// Re-scans `subtests` by name and takes the first match, reproducing the
/// source's O(n²) lookup verbatim (§9 Open Question: callers must ensure
/// unique subtest names per suite — this is not "fixed" to a direct field
/// read, since the spec asks that open questions not be silently resolved).
pub fn first_subtest_value_by_name(subtests: &[Subtest], name: &str) -> Option<f64> {
    subtests.iter().find(|s| s.name == name).map(|s| s.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_object_performance_data() {
        let raw = r#"{
            "performance_data": {
                "framework": {"name": "talos"},
                "suites": [{"name": "tp5", "value": 10.0, "subtests": []}]
            }
        }"#;
        let envelope: ArtifactEnvelope = serde_json::from_str(raw).unwrap();
        let artifacts = envelope.performance_data.into_vec();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].suites[0].name, "tp5");
    }

    #[test]
    fn parses_list_performance_data() {
        let raw = r#"{
            "performance_data": [
                {"framework": {"name": "talos"}, "suites": []},
                {"framework": {"name": "talos"}, "suites": []}
            ]
        }"#;
        let envelope: ArtifactEnvelope = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.performance_data.into_vec().len(), 2);
    }

    #[test]
    fn application_defaults_to_empty_strings_when_absent() {
        let raw = r#"{"framework": {"name": "talos"}, "suites": []}"#;
        let artifact: PerfArtifact = serde_json::from_str(raw).unwrap();
        assert_eq!(artifact.application_name(), "");
        assert_eq!(artifact.application_version(), "");
    }

    #[test]
    fn first_subtest_value_by_name_takes_first_match() {
        let raw = r#"[
            {"name": "t1", "value": 1.0, "replicates": []},
            {"name": "t1", "value": 2.0, "replicates": []}
        ]"#;
        let subtests: Vec<Subtest> = serde_json::from_str(raw).unwrap();
        assert_eq!(first_subtest_value_by_name(&subtests, "t1"), Some(1.0));
        assert_eq!(first_subtest_value_by_name(&subtests, "missing"), None);
    }
}
