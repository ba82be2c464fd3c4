//! This module provides the spike-density function (SDF) estimator.
//!
//! The estimator converts PSTH counts into a firing rate (Hz) and convolves
//! it with a smoothing kernel to remove binning artifacts. The kernel taps
//! are non-negative and normalized to unit sum, so a non-negative input rate
//! always yields a non-negative SDF.
use serde::{Deserialize, Serialize};

use crate::error::LatencyError;
use crate::psth::Psth;
use crate::KERNEL_SUPPORT_SIGMAS;

/// Specification of the smoothing kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelSpec {
    /// Gaussian kernel with the given half-width (seconds). The support spans
    /// [`KERNEL_SUPPORT_SIGMAS`] standard deviations on each side.
    Gaussian { sigma: f64 },
}

impl KernelSpec {
    /// Discretize the kernel into taps for the given bin width.
    ///
    /// The taps are symmetric around the center, non-negative, and normalized
    /// to unit sum.
    fn taps(&self, bin_width: f64) -> Result<Vec<f64>, LatencyError> {
        match *self {
            KernelSpec::Gaussian { sigma } => {
                if !sigma.is_finite() || sigma <= 0.0 {
                    return Err(LatencyError::InvalidConfig(format!(
                        "smoothing sigma must be positive, got {}",
                        sigma
                    )));
                }
                let sigma_bins = sigma / bin_width;
                let radius = (KERNEL_SUPPORT_SIGMAS * sigma_bins).ceil() as usize;
                let scale = -0.5 / (sigma_bins * sigma_bins);

                let mut taps = Vec::with_capacity(2 * radius + 1);
                for i in 0..=2 * radius {
                    let x = i as f64 - radius as f64;
                    taps.push((x * x * scale).exp());
                }
                let sum: f64 = taps.iter().sum();
                for tap in taps.iter_mut() {
                    *tap /= sum;
                }
                Ok(taps)
            }
        }
    }
}

/// Boundary handling for the smoothing convolution.
///
/// Both modes are deterministic; they differ in how the first and last
/// `radius` samples are smoothed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PaddingMode {
    /// Samples beyond the boundary are treated as zero rate, pulling the
    /// smoothed estimate towards zero at the edges.
    Zero,
    /// Samples beyond the boundary mirror the interior, preserving the edge
    /// rate level.
    Reflect,
}

/// A smoothed firing-rate estimate over time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sdf {
    /// Time axis (seconds, stimulus-relative), equal to the PSTH bin centers.
    pub time: Vec<f64>,
    /// Firing rate (Hz), one value per time point.
    pub rate: Vec<f64>,
}

impl Sdf {
    /// Estimate the SDF of a PSTH.
    ///
    /// Counts are converted to spikes/second by dividing by the bin width and
    /// the trial count, then convolved with `kernel`. The time axis equals the
    /// PSTH bin centers, so downstream windows keep their alignment.
    pub fn estimate(
        psth: &Psth,
        kernel: &KernelSpec,
        padding: PaddingMode,
    ) -> Result<Sdf, LatencyError> {
        let bin_width = psth.bin_width();
        let taps = kernel.taps(bin_width)?;
        let radius = taps.len() / 2;

        let norm = bin_width * psth.num_trials.max(1) as f64;
        let raw_rate: Vec<f64> = psth.counts.iter().map(|&c| c as f64 / norm).collect();

        let n = raw_rate.len();
        let mut rate = vec![0.0; n];
        for i in 0..n {
            let mut sum = 0.0;
            for (k, &tap) in taps.iter().enumerate() {
                let src = i as isize + k as isize - radius as isize;
                let value = match padding {
                    PaddingMode::Zero => {
                        if src < 0 || src >= n as isize {
                            0.0
                        } else {
                            raw_rate[src as usize]
                        }
                    }
                    PaddingMode::Reflect => {
                        let mirrored = if src < 0 {
                            -src
                        } else if src >= n as isize {
                            2 * (n as isize - 1) - src
                        } else {
                            src
                        };
                        // A kernel wider than the signal can mirror out of range again
                        if mirrored < 0 || mirrored >= n as isize {
                            0.0
                        } else {
                            raw_rate[mirrored as usize]
                        }
                    }
                };
                sum += tap * value;
            }
            rate[i] = sum;
        }

        Ok(Sdf {
            time: psth.centers(),
            rate,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// The indices of the time points falling inside `window` (inclusive bounds).
    pub fn indices_in(&self, window: (f64, f64)) -> Vec<usize> {
        self.time
            .iter()
            .enumerate()
            .filter(|(_, &t)| t >= window.0 && t <= window.1)
            .map(|(i, _)| i)
            .collect()
    }
}
