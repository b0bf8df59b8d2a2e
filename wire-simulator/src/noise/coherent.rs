use super::{NoiseGenerator, frequency::NoiseSample, histogram::HistogramNoise};
use crate::{error::ConfigError, fft::FftEngine};
use rand::rngs::StdRng;

/// Channel noise plus a component common to the whole readout board.
///
/// The board-wide waveform is drawn once per board from the correlated
/// stream and added to every channel of that board.
#[derive(Debug)]
pub(crate) struct CoherentNoise {
    incoherent: HistogramNoise,
    coherent: HistogramNoise,
}

impl CoherentNoise {
    pub(crate) fn new(incoherent: HistogramNoise, coherent: HistogramNoise) -> Self {
        Self {
            incoherent,
            coherent,
        }
    }
}

impl NoiseGenerator for CoherentNoise {
    fn channel_noise(
        &self,
        rng: &mut StdRng,
        fft: &FftEngine,
        noise_factor: f64,
    ) -> Result<NoiseSample, ConfigError> {
        self.incoherent.channel_noise(rng, fft, noise_factor)
    }

    fn board_noise(
        &self,
        rng: &mut StdRng,
        fft: &FftEngine,
        noise_factor: f64,
    ) -> Result<Option<NoiseSample>, ConfigError> {
        self.coherent.channel_noise(rng, fft, noise_factor).map(Some)
    }
}
