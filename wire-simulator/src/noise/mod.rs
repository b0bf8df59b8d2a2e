//! Noise generation strategies.
//!
//! Each wire plane is given one [NoiseGenerator], chosen in the configuration
//! by the `generator-type` tag and built by [NoiseGeneratorConfig::build].
//! Every strategy ends up in [frequency::generate]: a magnitude template is
//! randomised bin by bin and transformed back to the time domain.

pub(crate) mod analytic;
pub(crate) mod coherent;
pub(crate) mod frequency;
pub(crate) mod histogram;
pub(crate) mod spectrum;

use crate::{error::ConfigError, fft::FftEngine};
use analytic::AnalyticNoise;
use coherent::CoherentNoise;
pub(crate) use frequency::NoiseSample;
use histogram::HistogramNoise;
use rand::rngs::StdRng;
use serde::Deserialize;
use spectrum::{NoiseSource, NoiseSpectrumStore};
use std::fmt::Debug;

pub(crate) trait NoiseGenerator: Debug + Send + Sync {
    /// Noise drawn independently for every channel.
    fn channel_noise(
        &self,
        rng: &mut StdRng,
        fft: &FftEngine,
        noise_factor: f64,
    ) -> Result<NoiseSample, ConfigError>;

    /// Noise shared by every channel of one readout board on this plane,
    /// for generators that model it.
    fn board_noise(
        &self,
        _rng: &mut StdRng,
        _fft: &FftEngine,
        _noise_factor: f64,
    ) -> Result<Option<NoiseSample>, ConfigError> {
        Ok(None)
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "generator-type")]
pub(crate) enum NoiseGeneratorConfig {
    /// Measured noise spectrum read from a histogram file.
    #[serde(rename_all = "kebab-case")]
    Histogram {
        noise_rand: f64,
        source: NoiseSource,
        #[serde(default = "unit_norm")]
        norm_factor: f64,
    },
    /// Exponentially falling spectrum with a logistic low-frequency cut.
    #[serde(rename_all = "kebab-case")]
    Analytic {
        noise_rand: f64,
        amplitude: f64,
        width_khz: f64,
        low_cutoff_khz: f64,
    },
    /// Histogram noise per channel plus a board-wide component.
    #[serde(rename_all = "kebab-case")]
    Coherent {
        noise_rand: f64,
        incoherent: NoiseSource,
        coherent: NoiseSource,
        #[serde(default = "unit_norm")]
        norm_factor: f64,
        #[serde(default = "unit_norm")]
        coherent_norm_factor: f64,
    },
    Quiet,
}

fn unit_norm() -> f64 {
    1.0
}

impl NoiseGeneratorConfig {
    /// Builds the generator, loading any template it needs and checking it
    /// against the FFT size.
    pub(crate) fn build(
        &self,
        store: &mut NoiseSpectrumStore,
        fft_size: usize,
        sampling_rate_ns: f64,
    ) -> Result<Box<dyn NoiseGenerator>, ConfigError> {
        Ok(match self {
            Self::Histogram {
                noise_rand,
                source,
                norm_factor,
            } => Box::new(HistogramNoise::new(
                store.load(source)?,
                fft_size,
                *noise_rand,
                *norm_factor,
            )?),
            Self::Analytic {
                noise_rand,
                amplitude,
                width_khz,
                low_cutoff_khz,
            } => Box::new(AnalyticNoise::new(
                fft_size,
                sampling_rate_ns,
                *noise_rand,
                *amplitude,
                *width_khz,
                *low_cutoff_khz,
            )?),
            Self::Coherent {
                noise_rand,
                incoherent,
                coherent,
                norm_factor,
                coherent_norm_factor,
            } => Box::new(CoherentNoise::new(
                HistogramNoise::new(store.load(incoherent)?, fft_size, *noise_rand, *norm_factor)?,
                HistogramNoise::new(
                    store.load(coherent)?,
                    fft_size,
                    *noise_rand,
                    *coherent_norm_factor,
                )?,
            )),
            Self::Quiet => Box::new(QuietNoise),
        })
    }
}

/// Produces no noise at all.
#[derive(Debug)]
pub(crate) struct QuietNoise;

impl NoiseGenerator for QuietNoise {
    fn channel_noise(
        &self,
        _rng: &mut StdRng,
        fft: &FftEngine,
        _noise_factor: f64,
    ) -> Result<NoiseSample, ConfigError> {
        Ok(NoiseSample::zeros(fft.size()))
    }
}
