use super::{
    NoiseGenerator,
    frequency::{self, NoiseSample},
    spectrum::NoiseTemplate,
};
use crate::{error::ConfigError, fft::FftEngine};
use rand::rngs::StdRng;

/// Width, in bins, of the logistic edge of the low-frequency cut.
const LOW_CUTOFF_EDGE_BINS: f64 = 0.5;

/// Noise with an exponentially falling spectrum,
/// `amplitude * exp(-f / width)`, suppressed below `low_cutoff`.
///
/// The magnitude shape is fixed for the run, so it is evaluated once into a
/// template and randomised like a measured one.
#[derive(Debug)]
pub(crate) struct AnalyticNoise {
    template: NoiseTemplate,
    noise_rand: f64,
}

impl AnalyticNoise {
    pub(crate) fn new(
        fft_size: usize,
        sampling_rate_ns: f64,
        noise_rand: f64,
        amplitude: f64,
        width_khz: f64,
        low_cutoff_khz: f64,
    ) -> Result<Self, ConfigError> {
        if width_khz.is_nan() || width_khz <= 0.0 {
            return Err(ConfigError::AnalyticNoise {
                parameter: "width-khz",
                value: width_khz,
            });
        }
        if amplitude.is_nan() || amplitude < 0.0 {
            return Err(ConfigError::AnalyticNoise {
                parameter: "amplitude",
                value: amplitude,
            });
        }
        if sampling_rate_ns.is_nan() || sampling_rate_ns <= 0.0 {
            return Err(ConfigError::NonPositiveSamplingRate(sampling_rate_ns));
        }
        let bin_width_khz = 1.0e6 / (fft_size as f64 * sampling_rate_ns);
        let cutoff_bin = low_cutoff_khz / bin_width_khz;
        let magnitudes = (0..fft_size / 2 + 1)
            .map(|i| {
                let i = i as f64;
                let low_filter = 1.0 / (1.0 + (-(i - cutoff_bin) / LOW_CUTOFF_EDGE_BINS).exp());
                amplitude * (-i * bin_width_khz / width_khz).exp() * low_filter
            })
            .collect();
        Ok(Self {
            template: NoiseTemplate::new(magnitudes),
            noise_rand,
        })
    }
}

impl NoiseGenerator for AnalyticNoise {
    fn channel_noise(
        &self,
        rng: &mut StdRng,
        fft: &FftEngine,
        noise_factor: f64,
    ) -> Result<NoiseSample, ConfigError> {
        frequency::generate(&self.template, fft, self.noise_rand, noise_factor, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn spectrum_falls_above_cutoff() {
        let noise = AnalyticNoise::new(1024, 400.0, 0.0, 1.0, 100.0, 5.0).unwrap();
        let magnitudes = noise.template.magnitudes();
        assert_eq!(magnitudes.len(), 513);
        // Bin width is 1e6 / (1024 * 400) ≈ 2.44 kHz, so the cut sits near bin 2.
        assert!(magnitudes[0] < 0.05);
        assert!(magnitudes[10] > magnitudes[100]);
        assert!(magnitudes[100] > magnitudes[500]);
    }

    #[test]
    fn invalid_width_rejected() {
        assert!(matches!(
            AnalyticNoise::new(64, 400.0, 0.1, 1.0, 0.0, 1.0),
            Err(ConfigError::AnalyticNoise {
                parameter: "width-khz",
                ..
            })
        ));
    }

    #[test]
    fn generates_fft_sized_noise() {
        let fft = FftEngine::new(64).unwrap();
        let noise = AnalyticNoise::new(64, 400.0, 0.1, 1.0, 500.0, 1.0).unwrap();
        let sample = noise
            .channel_noise(&mut StdRng::seed_from_u64(2), &fft, 1.0)
            .unwrap();
        assert_eq!(sample.values().len(), 64);
    }
}
