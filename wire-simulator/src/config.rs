use crate::{
    charge::TestInjection,
    compression::Compression,
    detector::DetectorConfig,
    error::ConfigError,
    noise::NoiseGeneratorConfig,
    random::Seeds,
    response::ResponseConfig,
};
use serde::Deserialize;
use std::{fs::File, io::BufReader, num::NonZeroU32, path::Path};
use tracing::warn;
use wiresim_common::{PlaneIndex, Tdc};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct ReadoutConfig {
    /// Ticks digitised per channel.
    pub(crate) num_time_samples: usize,
    /// Defaults to the smallest power of two holding the readout window.
    #[serde(default)]
    pub(crate) fft_size: Option<usize>,
    pub(crate) sampling_rate_ns: f64,
    /// TDC count of the first readout tick.
    #[serde(default)]
    pub(crate) tdc_offset: Tdc,
}

impl ReadoutConfig {
    pub(crate) fn fft_size(&self) -> Result<usize, ConfigError> {
        let fft_size = self
            .fft_size
            .unwrap_or_else(|| self.num_time_samples.next_power_of_two());
        if fft_size == 0 {
            return Err(ConfigError::ZeroFftSize);
        }
        if fft_size < self.num_time_samples {
            return Err(ConfigError::ReadoutExceedsFft {
                readout: self.num_time_samples,
                fft_size,
            });
        }
        if fft_size % 2 != 0 {
            warn!("FFT size {fft_size} is odd, convolution may be affected");
        }
        Ok(fft_size)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "region-type")]
pub(crate) enum Region {
    #[default]
    AllTpcs,
    Tpc { cryostat: u32, tpc: u32 },
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct SimulationConfig {
    pub(crate) detector: DetectorConfig,
    pub(crate) readout: ReadoutConfig,
    #[serde(default)]
    pub(crate) region: Region,
    #[serde(default = "default_compression_type")]
    pub(crate) compression_type: String,
    /// Only digitise boards holding at least one channel with signal.
    #[serde(default)]
    pub(crate) suppress_no_signal: bool,
    #[serde(default = "default_channels_per_board")]
    pub(crate) channels_per_board: u32,
    /// Withhold charge from bad and missing channels.
    #[serde(default)]
    pub(crate) sim_dead_channels: bool,
    #[serde(default = "default_true")]
    pub(crate) smear_pedestals: bool,
    #[serde(default)]
    pub(crate) make_histograms: bool,
    #[serde(default = "default_histogram_plane")]
    pub(crate) histogram_plane: PlaneIndex,
    pub(crate) seeds: Seeds,
    /// One per plane index.
    pub(crate) noise_generators: Vec<NoiseGeneratorConfig>,
    pub(crate) response: ResponseConfig,
    #[serde(default)]
    pub(crate) test: Option<TestInjection>,
}

fn default_compression_type() -> String {
    "none".to_owned()
}

fn default_channels_per_board() -> u32 {
    32
}

fn default_true() -> bool {
    true
}

fn default_histogram_plane() -> PlaneIndex {
    2
}

impl SimulationConfig {
    #[tracing::instrument(skip_all, fields(path = ?path))]
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub(crate) fn compression(&self) -> Result<Compression, ConfigError> {
        self.compression_type.parse()
    }

    pub(crate) fn channels_per_board(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.channels_per_board).ok_or(ConfigError::ZeroChannelsPerBoard)
    }
}
