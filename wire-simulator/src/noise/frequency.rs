use super::spectrum::NoiseTemplate;
use crate::{
    error::ConfigError,
    fft::{FftEngine, Spectrum},
};
use rand::Rng;
use realfft::num_complex::Complex;
use std::f64::consts::PI;

/// Time-domain noise for one channel, one value per FFT tick.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NoiseSample {
    values: Vec<f64>,
}

impl NoiseSample {
    pub(crate) fn new(values: Vec<f64>, fft_size: usize) -> Result<Self, ConfigError> {
        if values.len() == fft_size {
            Ok(Self { values })
        } else {
            Err(ConfigError::BufferLength {
                len: values.len(),
                fft_size,
            })
        }
    }

    pub(crate) fn zeros(fft_size: usize) -> Self {
        Self {
            values: vec![0.0; fft_size],
        }
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    /// Adds `other` tick by tick. Both samples share the run's FFT size.
    pub(crate) fn superpose(&mut self, other: &NoiseSample) {
        self.values
            .iter_mut()
            .zip(other.values.iter())
            .for_each(|(a, b)| *a += b);
    }
}

/// Draws the random complex noise spectrum around `template`.
///
/// For each bin the magnitude is `template[i] * ((1 - f) + 2 f r0) * scale`
/// and the phase is `2π r1`, with `r0` and `r1` uniform in `[0, 1)` and `f`
/// the randomness fraction.
pub(crate) fn noise_spectrum<R: Rng>(
    template: &NoiseTemplate,
    fft_size: usize,
    randomness_fraction: f64,
    scale_factor: f64,
    rng: &mut R,
) -> Result<Spectrum, ConfigError> {
    template.check_fft_size(fft_size)?;
    Ok(template
        .magnitudes()
        .iter()
        .map(|magnitude| {
            let r0: f64 = rng.random();
            let r1: f64 = rng.random();
            let p = magnitude
                * ((1.0 - randomness_fraction) + 2.0 * randomness_fraction * r0)
                * scale_factor;
            Complex::from_polar(p, r1 * 2.0 * PI)
        })
        .collect())
}

/// Generates one noise waveform by inverse transforming a randomised spectrum.
pub(crate) fn generate<R: Rng>(
    template: &NoiseTemplate,
    fft: &FftEngine,
    randomness_fraction: f64,
    scale_factor: f64,
    rng: &mut R,
) -> Result<NoiseSample, ConfigError> {
    let spectrum = noise_spectrum(
        template,
        fft.size(),
        randomness_fraction,
        scale_factor,
        rng,
    )?;
    NoiseSample::new(fft.inverse(spectrum)?, fft.size())
}
