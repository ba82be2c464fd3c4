//! This crate provides tools for estimating stimulus response latencies from
//! extracellular ("neuropixel") spike recordings.
//!
//! The pipeline goes from raw spike trains to a per-unit results table:
//! trial alignment → peri-stimulus time histogram (PSTH) → spike-density
//! function (SDF) → latency extraction → aggregation.
//!
//! # Binning spikes
//!
//! ```rust
//! use ephys_latency::psth::Psth;
//! use ephys_latency::spike_train::TrialAlignedTrain;
//!
//! // Ten trials, each with a single spike 50 ms after stimulus onset
//! let trials: Vec<TrialAlignedTrain> = (0..10)
//!     .map(|_| TrialAlignedTrain::from_offsets(vec![0.05]))
//!     .collect();
//!
//! let psth = Psth::bin(&trials, 0.005, (-0.1, 0.25)).unwrap();
//! assert_eq!(psth.num_bins(), 70);
//! assert_eq!(psth.counts[30], 10);
//! ```
//!
//! # Extracting a latency
//!
//! ```rust
//! use ephys_latency::config::AnalysisConfig;
//! use ephys_latency::latency::{LatencyStrategy, MeanSdfStrategy, ResponseType};
//! use ephys_latency::spike_train::{SpikeTrain, StimulusEvent, TrialAlignedTrain};
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let events: Vec<StimulusEvent> = (0..50)
//!     .map(|i| StimulusEvent::new(1.0 + i as f64, 1.25 + i as f64, 0))
//!     .collect();
//!
//! // A unit firing at 5 Hz that jumps to 80 Hz from 60 ms after each onset
//! let onsets: Vec<f64> = events.iter().map(|e| e.start).collect();
//! let train = SpikeTrain::rand_step(5.0, 80.0, &onsets, 0.06, 0.1, 52.0, &mut rng).unwrap();
//!
//! let config = AnalysisConfig::default();
//! let trials: Vec<TrialAlignedTrain> = events
//!     .iter()
//!     .map(|e| TrialAlignedTrain::align(&train, e, config.pre_time, config.post_buffer))
//!     .collect();
//!
//! let result = MeanSdfStrategy.extract(&trials, &config).unwrap();
//! assert_eq!(result.response_type, ResponseType::Excited);
//! assert!((result.latency.unwrap() - 0.06).abs() <= 2.0 * config.bin_width);
//! ```
//!
//! # Aggregating an experiment
//!
//! Use [`experiment::aggregate`] (or [`experiment::aggregate_par`]) to run
//! the pipeline over every unit of a recording and collect one row per unit
//! (or per unit × stimulus frame) into an [`experiment::ResultsTable`].

pub mod config;
pub mod error;
pub mod experiment;
pub mod latency;
pub mod psth;
pub mod sdf;
pub mod spike_train;
pub mod stats;

/// The default pre-stimulus time included in each trial window (seconds).
pub const DEFAULT_PRE_TIME: f64 = 0.1;
/// The default buffer appended after each stimulus offset (seconds).
pub const DEFAULT_POST_BUFFER: f64 = 0.1;
/// The default PSTH bin width (seconds).
pub const DEFAULT_BIN_WIDTH: f64 = 0.005;
/// The default threshold multiplier applied to the baseline standard deviation.
pub const DEFAULT_THRESHOLD_K: f64 = 2.5;
/// The default duration a threshold excursion must persist to count as a response (seconds).
pub const DEFAULT_SUSTAIN: f64 = 0.01;
/// The default margin below which competing excited/inhibited onsets are ambiguous (seconds).
pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 0.005;
/// The default minimum number of baseline samples required to estimate resting statistics.
pub const DEFAULT_MIN_BASELINE_SAMPLES: usize = 10;
/// The default fraction of trials that must individually cross threshold for the
/// ensemble strategy to report a reliable response.
pub const DEFAULT_MIN_RELIABLE_FRACTION: f64 = 0.5;
/// The default Gaussian smoothing half-width (seconds).
pub const DEFAULT_SMOOTHING_SIGMA: f64 = 0.005;
/// The number of standard deviations spanned by the Gaussian kernel support.
pub const KERNEL_SUPPORT_SIGMAS: f64 = 3.0;
