use super::{
    NoiseGenerator,
    frequency::{self, NoiseSample},
    spectrum::NoiseTemplate,
};
use crate::{error::ConfigError, fft::FftEngine};
use rand::rngs::StdRng;
use std::sync::Arc;

/// Noise shaped by a measured spectrum.
#[derive(Debug)]
pub(crate) struct HistogramNoise {
    template: Arc<NoiseTemplate>,
    /// Fraction by which each bin's magnitude may deviate from the template.
    noise_rand: f64,
    norm_factor: f64,
}

impl HistogramNoise {
    pub(crate) fn new(
        template: Arc<NoiseTemplate>,
        fft_size: usize,
        noise_rand: f64,
        norm_factor: f64,
    ) -> Result<Self, ConfigError> {
        template.check_fft_size(fft_size)?;
        Ok(Self {
            template,
            noise_rand,
            norm_factor,
        })
    }
}

impl NoiseGenerator for HistogramNoise {
    fn channel_noise(
        &self,
        rng: &mut StdRng,
        fft: &FftEngine,
        noise_factor: f64,
    ) -> Result<NoiseSample, ConfigError> {
        frequency::generate(
            &self.template,
            fft,
            self.noise_rand,
            self.norm_factor * noise_factor,
            rng,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::SeedableRng;

    #[test]
    fn scale_is_norm_times_noise_factor() {
        let fft = FftEngine::new(16).unwrap();
        let template = Arc::new(NoiseTemplate::new(vec![1.0; 9]));
        let generator = HistogramNoise::new(template.clone(), 16, 0.0, 2.0).unwrap();
        let noise = generator
            .channel_noise(&mut StdRng::seed_from_u64(4), &fft, 1.5)
            .unwrap();
        let expected =
            frequency::generate(&template, &fft, 0.0, 3.0, &mut StdRng::seed_from_u64(4)).unwrap();
        for (a, b) in noise.values().iter().zip(expected.values()) {
            assert_approx_eq!(*a, *b, 1e-12);
        }
    }

    #[test]
    fn template_checked_at_construction() {
        let template = Arc::new(NoiseTemplate::new(vec![1.0; 8]));
        assert!(HistogramNoise::new(template, 16, 0.1, 1.0).is_err());
    }
}
