//! This module provides the raw data types of the pipeline: spike trains,
//! stimulus presentations, and trial-aligned spike trains.
//!
//! # Examples
//!
//! ```
//! use ephys_latency::spike_train::{SpikeTrain, StimulusEvent, TrialAlignedTrain};
//!
//! let train = SpikeTrain::build(vec![0.95, 1.04, 1.21, 2.5]).unwrap();
//! let event = StimulusEvent::new(1.0, 1.25, 7);
//!
//! // Keep spikes in (start - pre_time, end + post_buffer), re-zeroed to the onset
//! let trial = TrialAlignedTrain::align(&train, &event, 0.1, 0.1);
//! assert_eq!(trial.num_spikes(), 3);
//! assert!((trial.offsets()[0] + 0.05).abs() < 1e-12);
//! ```
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::error::LatencyError;

/// An ordered sequence of spike timestamps (seconds) for one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeTrain {
    times: Vec<f64>,
}

impl SpikeTrain {
    /// Create a new `SpikeTrain` from the given timestamps.
    ///
    /// The timestamps are sorted; non-finite values are rejected.
    pub fn build(times: Vec<f64>) -> Result<Self, LatencyError> {
        if times.iter().any(|t| !t.is_finite()) {
            return Err(LatencyError::InvalidSpikeTrain(
                "timestamps must be finite".to_string(),
            ));
        }
        let mut times = times;
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Ok(SpikeTrain { times })
    }

    /// The spike timestamps, in ascending order.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn num_spikes(&self) -> usize {
        self.times.len()
    }

    /// Sample a homogeneous Poisson spike train on `[0, duration)` with the
    /// given firing rate (Hz), by accumulating exponential inter-spike intervals.
    pub fn rand_homogeneous<R: Rng>(
        rate: f64,
        duration: f64,
        rng: &mut R,
    ) -> Result<Self, LatencyError> {
        if rate < 0.0 || !rate.is_finite() {
            return Err(LatencyError::InvalidSpikeTrain(
                "firing rate must be finite and non-negative".to_string(),
            ));
        }
        if duration <= 0.0 {
            return Err(LatencyError::InvalidSpikeTrain(
                "duration must be positive".to_string(),
            ));
        }
        if rate == 0.0 {
            return Ok(SpikeTrain { times: Vec::new() });
        }

        let isi_dist = Exp::new(rate).map_err(|e| {
            LatencyError::InvalidSpikeTrain(format!("invalid rate parameter: {}", e))
        })?;
        let mut times = Vec::new();
        let mut t = isi_dist.sample(rng);
        while t < duration {
            times.push(t);
            t += isi_dist.sample(rng);
        }
        Ok(SpikeTrain { times })
    }

    /// Sample a Poisson spike train firing at `base_rate` everywhere, stepping
    /// up to `peak_rate` for `sustain` seconds starting `latency` seconds after
    /// each of the given stimulus onsets.
    ///
    /// Used to synthesize units with a known response latency.
    pub fn rand_step<R: Rng>(
        base_rate: f64,
        peak_rate: f64,
        onsets: &[f64],
        latency: f64,
        sustain: f64,
        duration: f64,
        rng: &mut R,
    ) -> Result<Self, LatencyError> {
        if peak_rate < base_rate {
            return Err(LatencyError::InvalidSpikeTrain(
                "peak rate must be at least the base rate".to_string(),
            ));
        }
        let base = SpikeTrain::rand_homogeneous(base_rate, duration, rng)?;
        let mut times = base.times;

        let extra_rate = peak_rate - base_rate;
        if extra_rate > 0.0 && sustain > 0.0 {
            let isi_dist = Exp::new(extra_rate).map_err(|e| {
                LatencyError::InvalidSpikeTrain(format!("invalid rate parameter: {}", e))
            })?;
            for &onset in onsets {
                let begin = onset + latency;
                let mut t = begin + isi_dist.sample(rng);
                while t < begin + sustain && t < duration {
                    times.push(t);
                    t += isi_dist.sample(rng);
                }
            }
        }
        SpikeTrain::build(times)
    }
}

/// A single stimulus presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusEvent {
    /// Presentation onset time (seconds, recording clock).
    pub start: f64,
    /// Presentation offset time (seconds, recording clock).
    pub end: f64,
    /// Stimulus frame identifier (image index, grating orientation, ...).
    pub frame: u32,
}

impl StimulusEvent {
    pub fn new(start: f64, end: f64, frame: u32) -> Self {
        StimulusEvent { start, end, frame }
    }
}

/// A spike train re-zeroed to one stimulus presentation.
///
/// Offsets are relative to the presentation onset and restricted to
/// `[-pre_time, end - start + post_buffer)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialAlignedTrain {
    offsets: Vec<f64>,
}

impl TrialAlignedTrain {
    /// Build a trial directly from stimulus-relative spike offsets.
    pub fn from_offsets(offsets: Vec<f64>) -> Self {
        let mut offsets = offsets;
        offsets.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        TrialAlignedTrain { offsets }
    }

    /// Extract the spikes around one presentation and re-zero them to its onset.
    pub fn align(
        train: &SpikeTrain,
        event: &StimulusEvent,
        pre_time: f64,
        post_buffer: f64,
    ) -> Self {
        let offsets = train
            .times()
            .iter()
            .filter(|&&t| t > event.start - pre_time && t < event.end + post_buffer)
            .map(|&t| t - event.start)
            .collect();
        // Source times are sorted, so offsets stay sorted
        TrialAlignedTrain { offsets }
    }

    /// The stimulus-relative spike offsets, in ascending order.
    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn num_spikes(&self) -> usize {
        self.offsets.len()
    }
}
