use crate::{
    compression::{self, Compression},
    error::CompressionError,
};
use serde::{Deserialize, Serialize};
use wiresim_common::{AdcCount, Channel};

/// The digitised waveform of one channel in one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct RawDigit {
    channel: Channel,
    /// Readout length before compression.
    samples: usize,
    pedestal: f32,
    compression: Compression,
    adcs: Vec<u16>,
}

impl RawDigit {
    pub(crate) fn new(
        channel: Channel,
        adcs: &[AdcCount],
        pedestal: f32,
        compression: Compression,
    ) -> Self {
        Self {
            channel,
            samples: adcs.len(),
            pedestal,
            compression,
            adcs: compression::encode(adcs, compression),
        }
    }

    #[cfg(test)]
    pub(crate) fn channel(&self) -> Channel {
        self.channel
    }

    #[cfg(test)]
    pub(crate) fn pedestal(&self) -> f32 {
        self.pedestal
    }

    #[cfg(test)]
    pub(crate) fn compression(&self) -> Compression {
        self.compression
    }

    /// Number of stored words, after compression.
    pub(crate) fn stored_len(&self) -> usize {
        self.adcs.len()
    }

    pub(crate) fn uncompressed(&self) -> Result<Vec<AdcCount>, CompressionError> {
        compression::decode(&self.adcs, self.compression, self.samples)
    }
}
