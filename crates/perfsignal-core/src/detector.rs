//! C6 — Change-Point Detector.
//!
//! Scans an ordered series of revision points, widens the back window
//! after runs of quiescent data, computes a confidence statistic per point,
//! applies a three-criterion anomaly rule, then a magnitude post-filter.
//!
//! Per §9, the detector is a parameter bundle plus a pluggable confidence
//! function rather than an inheritance hierarchy: `ConfidenceFn` stands in
//! for the source's abstract `calc_confidence` method, and the windowing /
//! threshold logic is free functions shared by every confidence function.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::signature::{AlertChangeType, Signature};
use crate::stats::{analyze, linear_weights, uniform_weights, Bucket, Stats};

/// One point in a signature's time series, with the mutable annotation
/// fields the scan attaches. Each point is an owned record initialized to
/// sentinels — never a shared reference into the series itself (§9).
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionPoint {
    pub push_timestamp: DateTime<Utc>,
    pub values: Vec<f64>,
    pub amount_prev_data: usize,
    pub amount_next_data: usize,
    pub historical_stats: Stats,
    pub forward_stats: Stats,
    pub confidence: HashMap<String, f64>,
    pub change_detected: bool,
    pub alert_properties: Option<AlertProperties>,
}

impl RevisionPoint {
    pub fn new(push_timestamp: DateTime<Utc>, values: Vec<f64>) -> Self {
        Self {
            push_timestamp,
            values,
            amount_prev_data: 0,
            amount_next_data: 0,
            historical_stats: Stats { avg: 0.0, n: 0, variance: 0.0 },
            forward_stats: Stats { avg: 0.0, n: 0, variance: 0.0 },
            confidence: HashMap::new(),
            change_detected: false,
            alert_properties: None,
        }
    }
}

/// Mirrors the source's `AlertProperties` named tuple (`get_alert_properties`):
/// attached to flagged points so a downstream alert consumer has the
/// magnitude and direction of the shift, not just a boolean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertProperties {
    pub pct_change: f64,
    pub delta: f64,
    pub is_regression: bool,
    pub prev_value: f64,
    pub new_value: f64,
}

/// `get_alert_properties(prev_value, new_value, lower_is_better)`.
pub fn get_alert_properties(prev_value: f64, new_value: f64, lower_is_better: bool) -> AlertProperties {
    let pct_change = if prev_value != 0.0 {
        100.0 * (new_value - prev_value).abs() / prev_value
    } else {
        0.0
    };
    let delta = new_value - prev_value;
    let is_regression = (delta > 0.0 && lower_is_better) || (delta < 0.0 && !lower_is_better);
    AlertProperties { pct_change, delta, is_regression, prev_value, new_value }
}

/// A pluggable confidence statistic. Implementations compute a t-like
/// score from the back/fore windows and decide how `last_seen_regression`
/// evolves (it resets to 0 on a detected regression, otherwise increments,
/// which is what widens the back window in `Detector::detect_changes`).
pub trait ConfidenceFn: Send + Sync {
    fn calc_confidence(
        &self,
        back_window: &[Bucket],
        fore_window: &[Bucket],
        confidence_threshold: f64,
        last_seen_regression: u32,
    ) -> (f64, u32);
}

/// The Student-t-like confidence variant (§4.6).
pub struct StudentConfidence;

impl ConfidenceFn for StudentConfidence {
    fn calc_confidence(
        &self,
        back_window: &[Bucket],
        fore_window: &[Bucket],
        confidence_threshold: f64,
        last_seen_regression: u32,
    ) -> (f64, u32) {
        let confidence = if back_window.is_empty() || fore_window.is_empty() {
            0.0
        } else {
            let s1 = analyze(back_window, linear_weights);
            let s2 = analyze(fore_window, linear_weights);
            let delta = s2.avg - s1.avg;
            if delta == 0.0 {
                0.0
            } else if s1.variance == 0.0 && s2.variance == 0.0 {
                f64::INFINITY
            } else {
                delta / ((s1.variance / s1.n as f64) + (s2.variance / s2.n as f64)).sqrt()
            }
        };

        let next_last_seen_regression = if confidence > confidence_threshold {
            0
        } else {
            last_seen_regression + 1
        };

        (confidence, next_last_seen_regression)
    }
}

/// Parameter bundle for a detector instance. `name` identifies this
/// detector's slot in each point's `confidence` map (several detectors
/// could in principle scan the same series).
#[derive(Debug, Clone)]
pub struct DetectorParams {
    pub name: String,
    pub min_back_window: u32,
    pub max_back_window: u32,
    pub fore_window: u32,
    pub magnitude_threshold: f64,
    pub confidence_threshold: f64,
    pub mag_check: bool,
    pub above_threshold_is_anomaly: bool,
}

impl DetectorParams {
    /// The Student detector's historical defaults.
    pub fn student_defaults() -> Self {
        DetectorParams {
            name: "student".to_string(),
            min_back_window: 12,
            max_back_window: 24,
            fore_window: 12,
            magnitude_threshold: 2.0,
            confidence_threshold: 7.0,
            mag_check: true,
            above_threshold_is_anomaly: true,
        }
    }
}

struct ResolvedParams {
    min_back_window: usize,
    max_back_window: usize,
    fore_window: usize,
    magnitude_threshold: f64,
}

/// A detector instance: a parameter bundle shared read-only across workers
/// plus one confidence function. Safe to share across concurrent scans —
/// it carries no mutable state of its own (§5).
pub struct Detector {
    pub params: DetectorParams,
    confidence_fn: Box<dyn ConfidenceFn>,
}

impl Detector {
    pub fn new(params: DetectorParams, confidence_fn: Box<dyn ConfidenceFn>) -> Self {
        Self { params, confidence_fn }
    }

    pub fn student() -> Self {
        Self::new(DetectorParams::student_defaults(), Box::new(StudentConfidence))
    }

    fn resolve(&self, signature: &Signature) -> ResolvedParams {
        ResolvedParams {
            min_back_window: signature
                .min_back_window
                .unwrap_or(self.params.min_back_window) as usize,
            max_back_window: signature
                .max_back_window
                .unwrap_or(self.params.max_back_window) as usize,
            fore_window: signature.fore_window.unwrap_or(self.params.fore_window) as usize,
            magnitude_threshold: signature
                .alert_threshold
                .unwrap_or(self.params.magnitude_threshold),
        }
    }

    /// `detect_changes(series, signature)` from §4.6. Mutates `series` in
    /// place. A series of fewer than two points is returned unchanged
    /// (§7f, `DetectorEmpty` — a no-op, not an error).
    pub fn detect_changes(&self, series: &mut Vec<RevisionPoint>, signature: &Signature) {
        if series.len() < 2 {
            return;
        }
        series.sort_by_key(|p| p.push_timestamp);

        let resolved = self.resolve(signature);
        self.scan_windows_and_confidence(series, &resolved);
        self.flag_anomalies(series, &resolved);
        if self.params.mag_check {
            self.filter_by_magnitude(series, signature, resolved.magnitude_threshold);
        }
    }

    /// Pass 1 — back/fore windowing and confidence, widening the back
    /// window after a run of quiescent (non-regressing) points.
    fn scan_windows_and_confidence(&self, series: &mut [RevisionPoint], resolved: &ResolvedParams) {
        let mut last_seen_regression: u32 = 0;

        for i in 1..series.len() {
            let mut back_window = Vec::new();
            let mut amount_prev_data = 0usize;
            let mut prev = i as isize - 1;
            loop {
                if amount_prev_data >= resolved.max_back_window || prev < 0 {
                    break;
                }
                let distance = (i as isize - prev) as usize;
                let bound = last_seen_regression
                    .max(resolved.min_back_window as u32)
                    .min(resolved.max_back_window as u32) as usize;
                if distance > bound {
                    break;
                }
                let values = series[prev as usize].values.clone();
                amount_prev_data += values.len();
                back_window.push(Bucket::new(values));
                prev -= 1;
            }

            let mut fore_window = Vec::new();
            let mut amount_next_data = 0usize;
            let mut next = i;
            while amount_next_data < resolved.fore_window && next < series.len() {
                let values = series[next].values.clone();
                amount_next_data += values.len();
                fore_window.push(Bucket::new(values));
                next += 1;
            }

            let historical_stats = analyze(&back_window, uniform_weights);
            let forward_stats = analyze(&fore_window, uniform_weights);
            let (confidence, next_last_seen) = self.confidence_fn.calc_confidence(
                &back_window,
                &fore_window,
                self.params.confidence_threshold,
                last_seen_regression,
            );
            last_seen_regression = next_last_seen;

            let point = &mut series[i];
            point.amount_prev_data = amount_prev_data;
            point.amount_next_data = amount_next_data;
            point.historical_stats = historical_stats;
            point.forward_stats = forward_stats;
            point.confidence.insert(self.params.name.clone(), confidence);
        }
    }

    /// Pass 2 — the three-criterion anomaly rule: enough context on both
    /// sides, confidence past the threshold, and locally more anomalous
    /// than both neighbors.
    fn flag_anomalies(&self, series: &mut [RevisionPoint], resolved: &ResolvedParams) {
        for i in 1..series.len() {
            if series[i].amount_prev_data < resolved.min_back_window
                || series[i].amount_next_data < resolved.fore_window
            {
                continue;
            }

            let confidence = series[i].confidence[&self.params.name];
            if check_threshold(
                confidence,
                self.params.confidence_threshold,
                self.params.above_threshold_is_anomaly,
            ) {
                continue;
            }

            let prev_confidence = series[i - 1]
                .confidence
                .get(&self.params.name)
                .copied()
                .unwrap_or(0.0);
            if is_more_anomalous(prev_confidence, confidence, self.params.above_threshold_is_anomaly) {
                continue;
            }

            if i + 1 < series.len() {
                let next_confidence = series[i + 1]
                    .confidence
                    .get(&self.params.name)
                    .copied()
                    .unwrap_or(0.0);
                if is_more_anomalous(next_confidence, confidence, self.params.above_threshold_is_anomaly)
                {
                    continue;
                }
            }

            series[i].change_detected = true;
        }
    }

    /// Pass 3 — magnitude filter (§4.6). Runs inside a single logical
    /// snapshot (see `store::Datastore::begin_transaction` for the
    /// persistence-side counterpart); clears flags below the configured
    /// percentage/absolute threshold.
    fn filter_by_magnitude(&self, series: &mut [RevisionPoint], signature: &Signature, magnitude_threshold: f64) {
        let change_type = signature.alert_change_type.unwrap_or(AlertChangeType::Pct);

        for point in series.iter_mut().skip(1) {
            if !point.change_detected {
                continue;
            }
            let prev_value = point.historical_stats.avg;
            let new_value = point.forward_stats.avg;
            let alert_properties = get_alert_properties(prev_value, new_value, signature.lower_is_better);

            let below_threshold = match change_type {
                AlertChangeType::Pct => alert_properties.pct_change < magnitude_threshold,
                AlertChangeType::Abs => alert_properties.delta.abs() < magnitude_threshold,
            };
            point.alert_properties = Some(alert_properties);
            if below_threshold {
                point.change_detected = false;
            }
        }
    }
}

/// `check_threshold(confidence, confidence_threshold, above_threshold_is_anomaly)`.
/// `true` means "not anomalous, skip this point".
pub fn check_threshold(confidence: f64, confidence_threshold: f64, above_threshold_is_anomaly: bool) -> bool {
    if above_threshold_is_anomaly {
        confidence <= confidence_threshold
    } else {
        confidence >= confidence_threshold
    }
}

/// Is `a` more anomalous than `b`, under the detector's polarity?
fn is_more_anomalous(a: f64, b: f64, above_threshold_is_anomaly: bool) -> bool {
    if above_threshold_is_anomaly {
        a > b
    } else {
        a < b
    }
}
