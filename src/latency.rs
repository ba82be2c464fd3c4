//! This module provides the latency extractor.
//!
//! A latency is the time from stimulus onset to the first sustained
//! excursion of the spike-density function outside its baseline band
//! `mean ± k·std`. Two extraction strategies implement the same
//! [`LatencyStrategy`] contract:
//!
//! - [`MeanSdfStrategy`] scans the trial-averaged SDF (v1.1),
//! - [`TrialEnsembleStrategy`] scans every per-trial SDF and only reports a
//!   response when enough trials individually cross threshold (v1.2).
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{AnalysisConfig, StrategyKind};
use crate::error::LatencyError;
use crate::psth::Psth;
use crate::sdf::Sdf;
use crate::spike_train::TrialAlignedTrain;
use crate::stats::{mean_std, median};

/// Classification of a unit's reaction to the stimulus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    /// Firing rate rises above the baseline band.
    Excited,
    /// Firing rate falls below the baseline band.
    Inhibited,
    /// No sustained excursion in the response window.
    NoResponse,
    /// Excited and inhibited excursions too close to order.
    Ambiguous,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResponseType::Excited => write!(f, "excited"),
            ResponseType::Inhibited => write!(f, "inhibited"),
            ResponseType::NoResponse => write!(f, "no_response"),
            ResponseType::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// The outcome of latency extraction for one unit and condition.
///
/// `latency` is `None` whenever no sustained excursion was found; zero is
/// never used as a stand-in for "not computed".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    /// Response onset in seconds after stimulus onset, if any.
    pub latency: Option<f64>,
    pub response_type: ResponseType,
}

impl LatencyResult {
    fn no_response() -> Self {
        LatencyResult {
            latency: None,
            response_type: ResponseType::NoResponse,
        }
    }
}

/// Resting firing statistics estimated from the pre-stimulus window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineStats {
    pub mean: f64,
    pub std: f64,
    pub num_samples: usize,
}

impl BaselineStats {
    /// Estimate baseline statistics from the SDF samples inside `window`.
    ///
    /// Fails with `InsufficientBaseline` when fewer than `min_samples` points
    /// fall inside the window.
    pub fn estimate(
        sdf: &Sdf,
        window: (f64, f64),
        min_samples: usize,
    ) -> Result<Self, LatencyError> {
        let indices = sdf.indices_in(window);
        if indices.len() < min_samples {
            return Err(LatencyError::InsufficientBaseline {
                required: min_samples,
                found: indices.len(),
            });
        }
        let values: Vec<f64> = indices.iter().map(|&i| sdf.rate[i]).collect();
        let (mean, std) = mean_std(&values).expect("baseline indices are non-empty");
        Ok(BaselineStats {
            mean,
            std,
            num_samples: indices.len(),
        })
    }
}

/// Scan an SDF for the first sustained departure from baseline.
///
/// Baseline statistics come from `baseline_window` (which must end at or
/// before onset); the scan covers `response_window` (which must start at or
/// after onset). An excursion counts only if it persists for at least
/// `config.sustain` seconds. When both an excited and an inhibited excursion
/// exist, the one preceding the other by more than `config.ambiguity_margin`
/// wins; otherwise the result is [`ResponseType::Ambiguous`] with the earlier
/// onset as the latency.
pub fn threshold_scan(
    sdf: &Sdf,
    baseline_window: (f64, f64),
    response_window: (f64, f64),
    config: &AnalysisConfig,
) -> Result<LatencyResult, LatencyError> {
    if baseline_window.1 > 0.0 {
        return Err(LatencyError::InvalidWindow(format!(
            "baseline window must end at or before stimulus onset, got end {}",
            baseline_window.1
        )));
    }
    if response_window.0 < 0.0 {
        return Err(LatencyError::InvalidWindow(format!(
            "response window must start at or after stimulus onset, got start {}",
            response_window.0
        )));
    }
    let stats = BaselineStats::estimate(sdf, baseline_window, config.min_baseline_samples)?;
    let sustain_bins = sustain_bins(sdf, config.sustain)?;
    let (excited, inhibited) = scan_onsets(
        sdf,
        response_window,
        &stats,
        config.threshold_k,
        sustain_bins,
    )?;
    Ok(classify(excited, inhibited, config.ambiguity_margin))
}

/// Number of consecutive samples an excursion must span, at least one.
fn sustain_bins(sdf: &Sdf, sustain: f64) -> Result<usize, LatencyError> {
    if sdf.len() < 2 {
        return Err(LatencyError::InvalidWindow(
            "SDF must contain at least two samples".to_string(),
        ));
    }
    let step = sdf.time[1] - sdf.time[0];
    Ok(((sustain / step).ceil() as usize).max(1))
}

/// Find the onset times of the first sustained excited and inhibited
/// excursions inside `window`.
fn scan_onsets(
    sdf: &Sdf,
    window: (f64, f64),
    stats: &BaselineStats,
    threshold_k: f64,
    sustain_bins: usize,
) -> Result<(Option<f64>, Option<f64>), LatencyError> {
    let indices = sdf.indices_in(window);
    if indices.is_empty() {
        return Err(LatencyError::InvalidWindow(
            "response window contains no samples".to_string(),
        ));
    }
    let upper = stats.mean + threshold_k * stats.std;
    let lower = stats.mean - threshold_k * stats.std;

    let excited = first_sustained(sdf, &indices, sustain_bins, |r| r > upper);
    let inhibited = first_sustained(sdf, &indices, sustain_bins, |r| r < lower);
    Ok((excited, inhibited))
}

/// First time point opening a run of at least `sustain_bins` consecutive
/// samples satisfying the predicate.
fn first_sustained<F: Fn(f64) -> bool>(
    sdf: &Sdf,
    indices: &[usize],
    sustain_bins: usize,
    pred: F,
) -> Option<f64> {
    let mut run_start = None;
    let mut run_len = 0;
    for &i in indices {
        if pred(sdf.rate[i]) {
            if run_len == 0 {
                run_start = Some(i);
            }
            run_len += 1;
            if run_len >= sustain_bins {
                return run_start.map(|s| sdf.time[s]);
            }
        } else {
            run_len = 0;
            run_start = None;
        }
    }
    None
}

/// Deterministic tie-break between competing excursions.
fn classify(excited: Option<f64>, inhibited: Option<f64>, margin: f64) -> LatencyResult {
    match (excited, inhibited) {
        (None, None) => LatencyResult::no_response(),
        (Some(t), None) => LatencyResult {
            latency: Some(t),
            response_type: ResponseType::Excited,
        },
        (None, Some(t)) => LatencyResult {
            latency: Some(t),
            response_type: ResponseType::Inhibited,
        },
        (Some(te), Some(ti)) => {
            if te + margin < ti {
                LatencyResult {
                    latency: Some(te),
                    response_type: ResponseType::Excited,
                }
            } else if ti + margin < te {
                LatencyResult {
                    latency: Some(ti),
                    response_type: ResponseType::Inhibited,
                }
            } else {
                LatencyResult {
                    latency: Some(te.min(ti)),
                    response_type: ResponseType::Ambiguous,
                }
            }
        }
    }
}

/// A swappable latency extraction algorithm.
pub trait LatencyStrategy {
    /// Extract the latency and response type of one unit and condition from
    /// its trial-aligned spike trains.
    fn extract(
        &self,
        trials: &[TrialAlignedTrain],
        config: &AnalysisConfig,
    ) -> Result<LatencyResult, LatencyError>;
}

/// Select the strategy implementation for a [`StrategyKind`].
pub fn strategy_for(kind: StrategyKind) -> &'static dyn LatencyStrategy {
    match kind {
        StrategyKind::MeanSdf => &MeanSdfStrategy,
        StrategyKind::TrialEnsemble => &TrialEnsembleStrategy,
    }
}

/// v1.1: threshold scan on the trial-averaged SDF.
pub struct MeanSdfStrategy;

impl LatencyStrategy for MeanSdfStrategy {
    fn extract(
        &self,
        trials: &[TrialAlignedTrain],
        config: &AnalysisConfig,
    ) -> Result<LatencyResult, LatencyError> {
        let psth = Psth::bin(trials, config.bin_width, config.trial_window())?;
        let sdf = Sdf::estimate(&psth, &config.smoothing, config.padding)?;
        threshold_scan(
            &sdf,
            config.baseline_window,
            config.response_window,
            config,
        )
    }
}

/// v1.2: per-trial threshold scans with a reliability gate.
///
/// Every trial is binned and smoothed on its own and scanned against the
/// baseline statistics of the trial-averaged SDF (single-trial baselines at
/// millisecond bins are too sparse for a usable std). A response type is
/// reported only when at least `config.min_reliable_fraction` of the trials
/// individually cross threshold inside the response window; the latency is
/// the median onset of the crossing trials.
pub struct TrialEnsembleStrategy;

impl LatencyStrategy for TrialEnsembleStrategy {
    fn extract(
        &self,
        trials: &[TrialAlignedTrain],
        config: &AnalysisConfig,
    ) -> Result<LatencyResult, LatencyError> {
        let window = config.trial_window();
        let pooled = Psth::bin(trials, config.bin_width, window)?;
        let mean_sdf = Sdf::estimate(&pooled, &config.smoothing, config.padding)?;
        let stats =
            BaselineStats::estimate(&mean_sdf, config.baseline_window, config.min_baseline_samples)?;
        let sustain = sustain_bins(&mean_sdf, config.sustain)?;

        let mut excited_onsets = Vec::new();
        let mut inhibited_onsets = Vec::new();
        for psth in Psth::bin_per_trial(trials, config.bin_width, window)? {
            let sdf = Sdf::estimate(&psth, &config.smoothing, config.padding)?;
            let (excited, inhibited) = scan_onsets(
                &sdf,
                config.response_window,
                &stats,
                config.threshold_k,
                sustain,
            )?;
            if let Some(t) = excited {
                excited_onsets.push(t);
            }
            if let Some(t) = inhibited {
                inhibited_onsets.push(t);
            }
        }

        if trials.is_empty() {
            return Ok(LatencyResult::no_response());
        }
        let num_trials = trials.len() as f64;
        let excited_reliable = excited_onsets.len() as f64 / num_trials >= config.min_reliable_fraction;
        let inhibited_reliable =
            inhibited_onsets.len() as f64 / num_trials >= config.min_reliable_fraction;

        let excited = excited_reliable
            .then(|| median(&excited_onsets))
            .flatten();
        let inhibited = inhibited_reliable
            .then(|| median(&inhibited_onsets))
            .flatten();
        Ok(classify(excited, inhibited, config.ambiguity_margin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spike_train::{SpikeTrain, StimulusEvent};
    use rand::{rngs::StdRng, SeedableRng};

    /// An SDF on 5 ms centers over (-0.1, 0.35) with the given rate function.
    fn synthetic_sdf<F: Fn(f64) -> f64>(rate_fn: F) -> Sdf {
        let time: Vec<f64> = (0..90).map(|i| -0.0975 + i as f64 * 0.005).collect();
        let rate = time.iter().map(|&t| rate_fn(t)).collect();
        Sdf { time, rate }
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    fn step_trials(
        latency: f64,
        base_rate: f64,
        peak_rate: f64,
        num_trials: usize,
        seed: u64,
    ) -> Vec<TrialAlignedTrain> {
        let mut rng = StdRng::seed_from_u64(seed);
        let events: Vec<StimulusEvent> = (0..num_trials)
            .map(|i| StimulusEvent::new(1.0 + i as f64, 1.25 + i as f64, 0))
            .collect();
        let onsets: Vec<f64> = events.iter().map(|e| e.start).collect();
        let duration = 2.0 + num_trials as f64;
        let train = SpikeTrain::rand_step(
            base_rate, peak_rate, &onsets, latency, 0.15, duration, &mut rng,
        )
        .unwrap();
        events
            .iter()
            .map(|e| TrialAlignedTrain::align(&train, e, 0.1, 0.1))
            .collect()
    }

    #[test]
    fn test_excited_step() {
        let sdf = synthetic_sdf(|t| if t >= 0.05 { 40.0 } else { 10.0 });
        let result = threshold_scan(&sdf, (-0.1, 0.0), (0.0, 0.25), &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::Excited);
        // First center at or above 0.05 is 0.0525
        assert!((result.latency.unwrap() - 0.0525).abs() < 1e-12);
    }

    #[test]
    fn test_inhibited_step() {
        let sdf = synthetic_sdf(|t| if t >= 0.05 { 0.0 } else { 10.0 });
        let result = threshold_scan(&sdf, (-0.1, 0.0), (0.0, 0.25), &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::Inhibited);
        assert!((result.latency.unwrap() - 0.0525).abs() < 1e-12);
    }

    #[test]
    fn test_flat_sdf_no_response() {
        let sdf = synthetic_sdf(|_| 10.0);
        let result = threshold_scan(&sdf, (-0.1, 0.0), (0.0, 0.25), &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::NoResponse);
        assert_eq!(result.latency, None);
    }

    #[test]
    fn test_single_bin_spike_rejected_by_sustain() {
        // One isolated 5 ms excursion must not count with a 10 ms sustain
        let sdf = synthetic_sdf(|t| {
            if (0.05..0.055).contains(&t) {
                100.0
            } else {
                10.0
            }
        });
        let result = threshold_scan(&sdf, (-0.1, 0.0), (0.0, 0.25), &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::NoResponse);
    }

    #[test]
    fn test_ambiguity_tie_break() {
        // Excited run at 0.05, inhibited run at 0.07
        let rate_fn = |t: f64| {
            if (0.05..0.07).contains(&t) {
                40.0
            } else if (0.07..0.12).contains(&t) {
                0.0
            } else {
                10.0
            }
        };

        // Margin below the 20 ms separation: the earlier (excited) onset wins
        let sdf = synthetic_sdf(rate_fn);
        let cfg = AnalysisConfig {
            ambiguity_margin: 0.005,
            ..config()
        };
        let result = threshold_scan(&sdf, (-0.1, 0.0), (0.0, 0.25), &cfg).unwrap();
        assert_eq!(result.response_type, ResponseType::Excited);

        // Margin above the separation: ambiguous, latency is the earlier onset
        let cfg = AnalysisConfig {
            ambiguity_margin: 0.05,
            ..config()
        };
        let result = threshold_scan(&sdf, (-0.1, 0.0), (0.0, 0.25), &cfg).unwrap();
        assert_eq!(result.response_type, ResponseType::Ambiguous);
        assert!((result.latency.unwrap() - 0.0525).abs() < 1e-12);
    }

    #[test]
    fn test_insufficient_baseline() {
        let sdf = synthetic_sdf(|_| 10.0);
        let result = threshold_scan(&sdf, (-0.01, 0.0), (0.0, 0.25), &config());
        assert_eq!(
            result,
            Err(LatencyError::InsufficientBaseline {
                required: 10,
                found: 2
            })
        );
    }

    #[test]
    fn test_mean_sdf_recovers_known_latency() {
        let trials = step_trials(0.06, 5.0, 80.0, 50, 42);
        let cfg = config();
        let result = MeanSdfStrategy.extract(&trials, &cfg).unwrap();
        assert_eq!(result.response_type, ResponseType::Excited);
        assert!((result.latency.unwrap() - 0.06).abs() <= 2.0 * cfg.bin_width);
    }

    #[test]
    fn test_ensemble_recovers_known_latency() {
        let trials = step_trials(0.06, 2.0, 120.0, 50, 7);
        let cfg = AnalysisConfig {
            strategy: StrategyKind::TrialEnsemble,
            ..config()
        };
        let result = TrialEnsembleStrategy.extract(&trials, &cfg).unwrap();
        assert_eq!(result.response_type, ResponseType::Excited);
        assert!((result.latency.unwrap() - 0.06).abs() <= 3.0 * cfg.bin_width);
    }

    #[test]
    fn test_flat_poisson_no_response() {
        let mut rng = StdRng::seed_from_u64(3);
        let events: Vec<StimulusEvent> = (0..50)
            .map(|i| StimulusEvent::new(1.0 + i as f64, 1.25 + i as f64, 0))
            .collect();
        let train = SpikeTrain::rand_homogeneous(10.0, 52.0, &mut rng).unwrap();
        let trials: Vec<TrialAlignedTrain> = events
            .iter()
            .map(|e| TrialAlignedTrain::align(&train, e, 0.1, 0.1))
            .collect();

        // Wider sustain and threshold keep the unmodulated-rate check robust
        // against single-bin fluctuations
        let cfg = AnalysisConfig {
            threshold_k: 3.0,
            sustain: 0.02,
            ..config()
        };
        let result = MeanSdfStrategy.extract(&trials, &cfg).unwrap();
        assert_eq!(result.response_type, ResponseType::NoResponse);
        assert_eq!(result.latency, None);
    }

    #[test]
    fn test_ensemble_gates_unreliable_response() {
        // A response in a single trial out of ten is not reliable
        let mut trials: Vec<TrialAlignedTrain> = (0..9)
            .map(|_| TrialAlignedTrain::from_offsets(vec![-0.08, -0.02]))
            .collect();
        trials.push(TrialAlignedTrain::from_offsets(
            (0..20).map(|i| 0.05 + i as f64 * 0.002).collect(),
        ));

        let result = TrialEnsembleStrategy.extract(&trials, &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::NoResponse);
    }

    #[test]
    fn test_empty_trials_no_response() {
        let result = MeanSdfStrategy.extract(&[], &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::NoResponse);
        let result = TrialEnsembleStrategy.extract(&[], &config()).unwrap();
        assert_eq!(result.response_type, ResponseType::NoResponse);
    }

    #[test]
    fn test_strategy_selection() {
        let trials = step_trials(0.06, 5.0, 80.0, 30, 11);
        let cfg = config();
        let via_kind = strategy_for(StrategyKind::MeanSdf)
            .extract(&trials, &cfg)
            .unwrap();
        let direct = MeanSdfStrategy.extract(&trials, &cfg).unwrap();
        assert_eq!(via_kind, direct);
    }
}
