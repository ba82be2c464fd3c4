//! This module provides the analysis configuration.
//!
//! Every invocation parameter of the pipeline is carried explicitly here;
//! there is no process-wide state. All times are in seconds.
use serde::{Deserialize, Serialize};

use crate::error::LatencyError;
use crate::sdf::{KernelSpec, PaddingMode};
use crate::{
    DEFAULT_AMBIGUITY_MARGIN, DEFAULT_BIN_WIDTH, DEFAULT_MIN_BASELINE_SAMPLES,
    DEFAULT_MIN_RELIABLE_FRACTION, DEFAULT_POST_BUFFER, DEFAULT_PRE_TIME, DEFAULT_SMOOTHING_SIGMA,
    DEFAULT_SUSTAIN, DEFAULT_THRESHOLD_K,
};

/// Selects the latency extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Threshold scan on the trial-averaged SDF (v1.1).
    MeanSdf,
    /// Per-trial threshold scans with a reliability gate (v1.2).
    TrialEnsemble,
}

/// Configuration of the full latency pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Pre-stimulus time included in each trial window (seconds).
    pub pre_time: f64,
    /// Buffer appended after each stimulus offset (seconds).
    pub post_buffer: f64,
    /// PSTH bin width (seconds).
    pub bin_width: f64,
    /// Window used to estimate resting statistics; must end at or before onset.
    pub baseline_window: (f64, f64),
    /// Window scanned for a response; must start at or after onset.
    pub response_window: (f64, f64),
    /// Threshold multiplier applied to the baseline standard deviation.
    pub threshold_k: f64,
    /// Duration a threshold excursion must persist to count as a response (seconds).
    pub sustain: f64,
    /// Margin below which competing excited/inhibited onsets are ambiguous (seconds).
    pub ambiguity_margin: f64,
    /// Minimum number of baseline samples required.
    pub min_baseline_samples: usize,
    /// Fraction of trials that must individually cross threshold for the
    /// ensemble strategy to report a reliable response.
    pub min_reliable_fraction: f64,
    /// Smoothing kernel applied when estimating the SDF.
    pub smoothing: KernelSpec,
    /// Boundary handling of the smoothing convolution.
    pub padding: PaddingMode,
    /// Latency extraction strategy.
    pub strategy: StrategyKind,
    /// Analyze each stimulus frame as its own condition, one row per unit × frame.
    pub split_by_frame: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            pre_time: DEFAULT_PRE_TIME,
            post_buffer: DEFAULT_POST_BUFFER,
            bin_width: DEFAULT_BIN_WIDTH,
            baseline_window: (-DEFAULT_PRE_TIME, 0.0),
            response_window: (0.0, 0.25),
            threshold_k: DEFAULT_THRESHOLD_K,
            sustain: DEFAULT_SUSTAIN,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            min_baseline_samples: DEFAULT_MIN_BASELINE_SAMPLES,
            min_reliable_fraction: DEFAULT_MIN_RELIABLE_FRACTION,
            smoothing: KernelSpec::Gaussian {
                sigma: DEFAULT_SMOOTHING_SIGMA,
            },
            padding: PaddingMode::Reflect,
            strategy: StrategyKind::MeanSdf,
            split_by_frame: false,
        }
    }
}

impl AnalysisConfig {
    /// Validate the configuration before any processing.
    ///
    /// A violation here would invalidate every row, so it fails the whole run
    /// rather than being recorded against individual units.
    pub fn validate(&self) -> Result<(), LatencyError> {
        if !self.bin_width.is_finite() || self.bin_width <= 0.0 {
            return Err(LatencyError::InvalidConfig(format!(
                "bin width must be positive, got {}",
                self.bin_width
            )));
        }
        if self.pre_time < 0.0 || self.post_buffer < 0.0 {
            return Err(LatencyError::InvalidConfig(
                "pre-stimulus time and post buffer must be non-negative".to_string(),
            ));
        }
        if self.baseline_window.1 <= self.baseline_window.0 {
            return Err(LatencyError::InvalidWindow(format!(
                "baseline window end must exceed its start, got ({}, {})",
                self.baseline_window.0, self.baseline_window.1
            )));
        }
        if self.baseline_window.1 > 0.0 {
            return Err(LatencyError::InvalidWindow(format!(
                "baseline window must end at or before stimulus onset, got end {}",
                self.baseline_window.1
            )));
        }
        if self.response_window.1 <= self.response_window.0 {
            return Err(LatencyError::InvalidWindow(format!(
                "response window end must exceed its start, got ({}, {})",
                self.response_window.0, self.response_window.1
            )));
        }
        if self.response_window.0 < 0.0 {
            return Err(LatencyError::InvalidWindow(format!(
                "response window must start at or after stimulus onset, got start {}",
                self.response_window.0
            )));
        }
        if !self.threshold_k.is_finite() || self.threshold_k <= 0.0 {
            return Err(LatencyError::InvalidConfig(format!(
                "threshold multiplier must be positive, got {}",
                self.threshold_k
            )));
        }
        if self.sustain < 0.0 || self.ambiguity_margin < 0.0 {
            return Err(LatencyError::InvalidConfig(
                "sustain and ambiguity margin must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_reliable_fraction) {
            return Err(LatencyError::InvalidConfig(format!(
                "reliable fraction must be in [0, 1], got {}",
                self.min_reliable_fraction
            )));
        }
        if self.min_baseline_samples == 0 {
            return Err(LatencyError::InvalidConfig(
                "minimum baseline sample count must be at least 1".to_string(),
            ));
        }
        match self.smoothing {
            KernelSpec::Gaussian { sigma } => {
                if !sigma.is_finite() || sigma <= 0.0 {
                    return Err(LatencyError::InvalidConfig(format!(
                        "smoothing sigma must be positive, got {}",
                        sigma
                    )));
                }
            }
        }
        Ok(())
    }

    /// The full trial window `(-pre_time, response_window.1 + post_buffer)`
    /// covered by the PSTH.
    pub fn trial_window(&self) -> (f64, f64) {
        (-self.pre_time, self.response_window.1 + self.post_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_bin_width() {
        let config = AnalysisConfig {
            bin_width: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LatencyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_baseline_after_onset_rejected() {
        let config = AnalysisConfig {
            baseline_window: (-0.05, 0.05),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LatencyError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_response_before_onset_rejected() {
        let config = AnalysisConfig {
            response_window: (-0.05, 0.25),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LatencyError::InvalidWindow(_))
        ));
    }

    #[test]
    fn test_reliable_fraction_bounds() {
        let config = AnalysisConfig {
            min_reliable_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LatencyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = AnalysisConfig {
            strategy: StrategyKind::TrialEnsemble,
            split_by_frame: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_trial_window() {
        let config = AnalysisConfig::default();
        assert_eq!(config.trial_window(), (-0.1, 0.35));
    }
}
