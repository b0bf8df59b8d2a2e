use std::path::PathBuf;
use thiserror::Error;
use wiresim_common::{Channel, PlaneIndex};

pub(crate) type SimulationResult<T> = Result<T, SimulationError>;

/// Fatal misconfiguration, detected either while building the simulation or
/// while processing the first channel that exposes it.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("Cannot open file {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed JSON in {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Cannot find {0:?} directly or in the search path")]
    NotInSearchPath(PathBuf),
    #[error("Noise histogram '{name}' not found in {path:?}")]
    MissingHistogram { name: String, path: PathBuf },
    #[error("Noise template has {bins} bins but FFT size {fft_size} requires {expected}")]
    TemplateLength {
        bins: usize,
        fft_size: usize,
        expected: usize,
    },
    #[error("Response kernel has {bins} bins but FFT size {fft_size} requires {expected}")]
    KernelLength {
        bins: usize,
        fft_size: usize,
        expected: usize,
    },
    #[error("Buffer of length {len} does not match FFT size {fft_size}")]
    BufferLength { len: usize, fft_size: usize },
    #[error("FFT size {fft_size} is smaller than the readout length {readout}")]
    ReadoutExceedsFft { readout: usize, fft_size: usize },
    #[error("FFT size must be positive")]
    ZeroFftSize,
    #[error("FFT failure: {0}")]
    Fft(#[from] realfft::FftError),
    #[error("Mismatched test pulses: {indices} indices but {charges} charges")]
    TestPulseMismatch { indices: usize, charges: usize },
    #[error("Unsupported compression requested: '{0}'")]
    UnsupportedCompression(String),
    #[error(
        "Shaping time {0} us is not one of the allowed values: 0.6, 1.0, 1.3, 3.0 us"
    )]
    UnregisteredShapingTime(f64),
    #[error("No noise factor for plane {plane} at shaping time class {class}")]
    MissingNoiseFactor { plane: PlaneIndex, class: usize },
    #[error("No noise generator configured for plane {0}")]
    MissingNoiseGenerator(PlaneIndex),
    #[error("No pedestal configured for plane {0}")]
    MissingPedestal(PlaneIndex),
    #[error("No response configured for plane {0}")]
    MissingPlaneResponse(PlaneIndex),
    #[error("Channels per board must be positive")]
    ZeroChannelsPerBoard,
    #[error("ASIC gain for plane {plane} must be positive, got {gain}")]
    NonPositiveGain { plane: PlaneIndex, gain: f64 },
    #[error("Sampling rate must be positive, got {0} ns")]
    NonPositiveSamplingRate(f64),
    #[error("Invalid pedestal RMS for channel {channel}: {source}")]
    PedestalRms {
        channel: Channel,
        source: rand_distr::NormalError,
    },
    #[error("Invalid {parameter} for analytic noise: {value}")]
    AnalyticNoise { parameter: &'static str, value: f64 },
    #[error("Semi-Gaussian response order must be positive")]
    ZeroShaperOrder,
}

/// A channel, wire or TPC that does not exist in the detector.
#[derive(Debug, Error)]
pub(crate) enum BoundsError {
    #[error("Channel {channel} outside detector range 0..{num_channels}")]
    Channel {
        channel: Channel,
        num_channels: Channel,
    },
    #[error("Wire {wire} outside plane {plane} of TPC {tpc} in cryostat {cryostat}")]
    Wire {
        cryostat: u32,
        tpc: u32,
        plane: PlaneIndex,
        wire: u32,
    },
    #[error("TPC {tpc} in cryostat {cryostat} does not exist")]
    Tpc { cryostat: u32, tpc: u32 },
    #[error("Invalid test wire channel: {wire} (detector has {num_channels} channels)")]
    TestWire { wire: u32, num_channels: Channel },
}

/// Malformed compressed waveform.
#[derive(Debug, Error, PartialEq)]
pub(crate) enum CompressionError {
    #[error("Code word at position {0} has no preceding sample")]
    NoReferenceSample(usize),
    #[error("Escape word at position {0} is not followed by a literal")]
    TruncatedEscape(usize),
    #[error("Code word at position {0} contains an unknown prefix code")]
    UnknownCode(usize),
    #[error("Difference at position {0} leaves the sample range")]
    SampleOverflow(usize),
    #[error("Decoded {decoded} samples, expected {expected}")]
    SampleCount { decoded: usize, expected: usize },
}

#[derive(Debug, Error)]
pub(crate) enum InputError {
    #[error("Cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed event input {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Write to {path:?} failed: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Serialising event {event} failed: {source}")]
    Serialise {
        event: u32,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub(crate) enum SimulationError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Bounds Error: {0}")]
    Bounds(#[from] BoundsError),
    #[error("Compression Error: {0}")]
    Compression(#[from] CompressionError),
    #[error("Input/Output Error: {0}")]
    Input(#[from] InputError),
}
