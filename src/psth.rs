//! This module provides the peri-stimulus time histogram (PSTH).
//!
//! A PSTH counts spikes in fixed-width time bins relative to stimulus onset,
//! pooled over the trials of one unit and stimulus condition.
use serde::{Deserialize, Serialize};

use crate::error::LatencyError;
use crate::spike_train::TrialAlignedTrain;

/// Spike counts per fixed-width time bin relative to stimulus onset.
///
/// Invariants: `counts.len() == bin_edges.len() - 1` and the edges are
/// uniformly spaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psth {
    /// Bin edges (seconds, stimulus-relative), uniformly spaced.
    pub bin_edges: Vec<f64>,
    /// Spike counts, one per bin.
    pub counts: Vec<u32>,
    /// Number of trials pooled into the counts.
    pub num_trials: usize,
}

impl Psth {
    /// Bin the spikes of all trials into a PSTH covering `window`.
    ///
    /// The number of bins is `floor((window.1 - window.0) / bin_width)`; a
    /// trailing remainder narrower than one bin is not counted. An empty
    /// trial set yields all-zero counts, which is a valid "no spikes" signal
    /// rather than an error.
    ///
    /// # Arguments
    ///
    /// * `trials` - The trial-aligned spike trains to pool.
    /// * `bin_width` - The bin width in seconds, must be positive.
    /// * `window` - The `(start, end)` of the histogram in stimulus-relative seconds.
    pub fn bin(
        trials: &[TrialAlignedTrain],
        bin_width: f64,
        window: (f64, f64),
    ) -> Result<Psth, LatencyError> {
        let num_bins = Self::validate_window(bin_width, window)?;

        let bin_edges: Vec<f64> = (0..=num_bins)
            .map(|i| window.0 + i as f64 * bin_width)
            .collect();

        let mut counts = vec![0u32; num_bins];
        for trial in trials {
            for &t in trial.offsets() {
                if t < window.0 || t >= window.1 {
                    continue;
                }
                let bin_idx = ((t - window.0) / bin_width) as usize;
                if bin_idx < num_bins {
                    counts[bin_idx] += 1;
                }
            }
        }

        Ok(Psth {
            bin_edges,
            counts,
            num_trials: trials.len(),
        })
    }

    /// Bin each trial separately over the same edges, one single-trial PSTH
    /// per aligned train. Feeds the trial-ensemble latency strategy.
    pub fn bin_per_trial(
        trials: &[TrialAlignedTrain],
        bin_width: f64,
        window: (f64, f64),
    ) -> Result<Vec<Psth>, LatencyError> {
        Self::validate_window(bin_width, window)?;
        trials
            .iter()
            .map(|trial| Psth::bin(std::slice::from_ref(trial), bin_width, window))
            .collect()
    }

    fn validate_window(bin_width: f64, window: (f64, f64)) -> Result<usize, LatencyError> {
        if !bin_width.is_finite() || bin_width <= 0.0 {
            return Err(LatencyError::InvalidWindow(format!(
                "bin width must be positive, got {}",
                bin_width
            )));
        }
        if !window.0.is_finite() || !window.1.is_finite() || window.1 <= window.0 {
            return Err(LatencyError::InvalidWindow(format!(
                "window end must exceed window start, got ({}, {})",
                window.0, window.1
            )));
        }
        let num_bins = ((window.1 - window.0) / bin_width).floor() as usize;
        if num_bins == 0 {
            return Err(LatencyError::InvalidWindow(
                "window must span at least one bin".to_string(),
            ));
        }
        Ok(num_bins)
    }

    pub fn num_bins(&self) -> usize {
        self.counts.len()
    }

    /// The (uniform) bin width in seconds.
    pub fn bin_width(&self) -> f64 {
        self.bin_edges[1] - self.bin_edges[0]
    }

    /// The bin centers, halfway between consecutive edges.
    pub fn centers(&self) -> Vec<f64> {
        let half = self.bin_width() / 2.0;
        self.bin_edges[..self.num_bins()]
            .iter()
            .map(|&e| e + half)
            .collect()
    }
}
