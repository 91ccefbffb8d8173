// Resultant magnitude analysis
//
// For every sample the acceleration and angular-velocity vectors are reduced
// to their Euclidean norm. Each alert band then counts the samples whose norm
// is strictly above its threshold. Bands are independent: a violent sample is
// counted by every band it exceeds.
//
// A sample missing any axis of a signal is left out of that signal's series
// and counts entirely; it is never treated as zero.

use crate::config::BandSet;
use crate::types::{AlertBand, AlertSummary, BandCount, Sample, SignalKind, SignalSummary};
use serde::{Deserialize, Serialize};

/// Euclidean norm of a 3-axis vector.
pub fn resultant(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Resultants for one sample. `None` where the signal has a missing axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResultantPoint {
    pub ts: Option<u64>,
    #[serde(rename = "acc_resultant")]
    pub acceleration: Option<f64>,
    #[serde(rename = "gyro_resultant")]
    pub gyroscope: Option<f64>,
}

impl ResultantPoint {
    pub fn from_sample(sample: &Sample) -> Self {
        Self {
            ts: sample.ts,
            acceleration: sample.acceleration().map(resultant),
            gyroscope: sample.rotation().map(resultant),
        }
    }

    pub fn value(&self, signal: SignalKind) -> Option<f64> {
        match signal {
            SignalKind::Acceleration => self.acceleration,
            SignalKind::Gyroscope => self.gyroscope,
        }
    }
}

/// Per-sample resultants for a whole trace, in trace order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultantSeries {
    pub points: Vec<ResultantPoint>,
}

impl ResultantSeries {
    pub fn from_samples(samples: &[Sample]) -> Self {
        Self {
            points: samples.iter().map(ResultantPoint::from_sample).collect(),
        }
    }

    /// Magnitudes of qualifying samples only.
    pub fn values(&self, signal: SignalKind) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(move |p| p.value(signal))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Count values strictly above each band's threshold, bands in given order.
pub fn count_crossings(values: &[f64], bands: &[AlertBand]) -> Vec<BandCount> {
    bands
        .iter()
        .map(|band| BandCount {
            label: band.label.clone(),
            threshold: band.threshold,
            count: values.iter().filter(|&&v| v > band.threshold).count(),
        })
        .collect()
}

fn summarize(series: &ResultantSeries, signal: SignalKind, bands: &[AlertBand]) -> SignalSummary {
    let values: Vec<f64> = series.values(signal).collect();
    let peak = values.iter().copied().fold(None, |acc: Option<f64>, v| match acc {
        Some(m) if m >= v => Some(m),
        _ => Some(v),
    });

    SignalSummary {
        signal,
        qualifying_samples: values.len(),
        peak,
        bands: count_crossings(&values, bands),
    }
}

/// Alert summary for an already computed series.
pub fn analyze_series(series: &ResultantSeries, bands: &BandSet) -> AlertSummary {
    AlertSummary {
        total_samples: series.len(),
        acceleration: summarize(series, SignalKind::Acceleration, &bands.acceleration),
        gyroscope: summarize(series, SignalKind::Gyroscope, &bands.gyroscope),
    }
}

/// Alert summary for a trace. An empty trace yields zero counts.
pub fn analyze(samples: &[Sample], bands: &BandSet) -> AlertSummary {
    analyze_series(&ResultantSeries::from_samples(samples), bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_GRAVITY;

    fn still(ts: u64) -> Sample {
        Sample::new(ts, [0.0, 0.0, 0.0], [0.0, 0.0, 0.0])
    }

    #[test]
    fn test_resultant() {
        assert_eq!(resultant([3.0, 4.0, 12.0]), 13.0);
        assert_eq!(resultant([0.0, 0.0, 0.0]), 0.0);
        assert_eq!(resultant([-3.0, 0.0, -4.0]), 5.0);
    }

    #[test]
    fn test_still_samples_cross_nothing() {
        let trace = vec![still(1), still(2), still(3)];
        let summary = analyze(&trace, &BandSet::default());

        assert_eq!(summary.total_samples, 3);
        assert_eq!(summary.acceleration.qualifying_samples, 3);
        assert_eq!(summary.acceleration.peak, Some(0.0));
        assert!(summary.acceleration.bands.iter().all(|b| b.count == 0));
        assert!(summary.gyroscope.bands.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_extreme_sample_hits_every_acceleration_band_once() {
        let bands = BandSet::default();
        let mut trace = vec![still(1), still(2)];
        trace.push(Sample::new(3, [120.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
        assert!(120.0 > 10.0 * STANDARD_GRAVITY);

        let summary = analyze(&trace, &bands);
        assert_eq!(summary.acceleration.bands.len(), bands.acceleration.len());
        for band in &summary.acceleration.bands {
            assert_eq!(band.count, 1, "band {}", band.label);
        }
        assert!(summary.gyroscope.bands.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_threshold_is_strict() {
        let bands = vec![AlertBand::new("> 5", 5.0)];
        let counts = count_crossings(&[5.0, 5.000001, 4.99], &bands);
        assert_eq!(counts[0].count, 1);
    }

    #[test]
    fn test_incomplete_samples_are_excluded_not_zeroed() {
        let bands = BandSet {
            acceleration: vec![AlertBand::new("any", -1.0)],
            gyroscope: vec![AlertBand::new("any", -1.0)],
        };
        let trace = vec![
            Sample {
                ts: Some(1),
                ax: Some(50.0),
                ay: None,
                az: Some(50.0),
                gx: Some(1.0),
                gy: Some(1.0),
                gz: Some(1.0),
            },
            still(2),
        ];

        let summary = analyze(&trace, &bands);
        // Treated as zero it would still cross -1.0; excluded it doesn't count
        assert_eq!(summary.acceleration.qualifying_samples, 1);
        assert_eq!(summary.acceleration.bands[0].count, 1);
        assert_eq!(summary.gyroscope.qualifying_samples, 2);
        assert_eq!(summary.gyroscope.bands[0].count, 2);

        let series = ResultantSeries::from_samples(&trace);
        assert_eq!(series.points[0].acceleration, None);
        assert_eq!(series.points[0].gyroscope, Some(3.0_f64.sqrt()));
    }

    #[test]
    fn test_lower_bands_never_count_less() {
        let bands = BandSet::default();
        let trace: Vec<Sample> = (0..200)
            .map(|i| {
                let a = i as f64 * 0.75;
                let g = i as f64 * 0.12;
                Sample::new(i, [a, a * 0.5, -a * 0.25], [g, -g, g * 0.3])
            })
            .collect();

        let summary = analyze(&trace, &bands);
        for signal in [&summary.acceleration, &summary.gyroscope] {
            let mut by_threshold = signal.bands.clone();
            by_threshold.sort_by(|a, b| a.threshold.total_cmp(&b.threshold));
            for pair in by_threshold.windows(2) {
                assert!(pair[0].count >= pair[1].count);
            }
        }
    }

    #[test]
    fn test_band_order_is_preserved() {
        let bands = BandSet {
            acceleration: vec![
                AlertBand::new("low", 1.0),
                AlertBand::new("high", 100.0),
                AlertBand::new("mid", 10.0),
            ],
            gyroscope: vec![],
        };
        let summary = analyze(&[still(1)], &bands);
        let labels: Vec<&str> = summary
            .acceleration
            .bands
            .iter()
            .map(|b| b.label.as_str())
            .collect();
        assert_eq!(labels, vec!["low", "high", "mid"]);
        assert!(summary.gyroscope.bands.is_empty());
    }

    #[test]
    fn test_empty_trace() {
        let summary = analyze(&[], &BandSet::default());
        assert_eq!(summary.total_samples, 0);
        assert_eq!(summary.acceleration.peak, None);
        assert!(summary.acceleration.bands.iter().all(|b| b.count == 0));
    }
}
