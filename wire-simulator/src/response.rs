//! Detector response: the signal-shaping contract and its kernel-based
//! implementation.

use crate::{
    charge::ChargeSeries,
    error::ConfigError,
    fft::{FftEngine, Spectrum},
};
use serde::Deserialize;
use tracing::info;
use wiresim_common::{Channel, PlaneIndex};

/// Shaping times the electronics support, in microseconds, with the column
/// each selects in a plane's noise-factor table.
pub(crate) const SHAPING_TIME_CLASSES: [(f64, usize); 4] =
    [(0.6, 0), (1.0, 1), (1.3, 2), (3.0, 3)];

pub(crate) fn shaping_time_class(shaping_time_us: f64) -> Result<usize, ConfigError> {
    SHAPING_TIME_CLASSES
        .iter()
        .find(|(time, _)| (time - shaping_time_us).abs() < 1e-9)
        .map(|&(_, class)| class)
        .ok_or(ConfigError::UnregisteredShapingTime(shaping_time_us))
}

/// Frequency response over the bins of one real transform.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ResponseKernel {
    bins: Spectrum,
}

impl ResponseKernel {
    pub(crate) fn new(bins: Spectrum, fft_size: usize) -> Result<Self, ConfigError> {
        let expected = fft_size / 2 + 1;
        if bins.len() == expected {
            Ok(Self { bins })
        } else {
            Err(ConfigError::KernelLength {
                bins: bins.len(),
                fft_size,
                expected,
            })
        }
    }

    /// Transforms an impulse response, zero padded to the FFT size.
    pub(crate) fn from_impulse(impulse: &[f64], fft: &FftEngine) -> Result<Self, ConfigError> {
        if impulse.len() > fft.size() {
            return Err(ConfigError::BufferLength {
                len: impulse.len(),
                fft_size: fft.size(),
            });
        }
        let mut padded = impulse.to_vec();
        padded.resize(fft.size(), 0.0);
        Self::new(fft.forward(&padded)?, fft.size())
    }

    /// Circular convolution of `charge` with the impulse response.
    pub(crate) fn apply(
        &self,
        charge: &mut ChargeSeries,
        fft: &FftEngine,
    ) -> Result<(), ConfigError> {
        if self.bins.len() != fft.spectrum_len() {
            return Err(ConfigError::KernelLength {
                bins: self.bins.len(),
                fft_size: fft.size(),
                expected: fft.spectrum_len(),
            });
        }
        let mut spectrum = fft.forward(charge.values())?;
        spectrum
            .iter_mut()
            .zip(&self.bins)
            .for_each(|(bin, response)| *bin *= response);
        charge.replace(fft.inverse(spectrum)?)
    }
}

/// Everything the synthesizer needs from the electronics model.
pub(crate) trait SignalShaping: Send + Sync {
    /// Replaces the charge series of `channel` by the induced or collected
    /// signal.
    fn convolute(
        &self,
        channel: Channel,
        plane: PlaneIndex,
        charge: &mut ChargeSeries,
        fft: &FftEngine,
    ) -> Result<(), ConfigError>;

    /// Electrons per microsecond that produce one ADC count.
    fn asic_gain(&self, channel: Channel, plane: PlaneIndex) -> Result<f64, ConfigError>;

    fn shaping_time(&self) -> f64;

    /// Noise scale for `plane` at the configured shaping time.
    fn noise_factor(&self, plane: PlaneIndex) -> Result<f64, ConfigError>;
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "response-type")]
pub(crate) enum ImpulseResponse {
    /// No shaping; charge passes through unchanged.
    Delta,
    /// Explicit response, one value per tick.
    Sampled { samples: Vec<f64> },
    /// CR-RCⁿ unipolar shaper peaking at the shaping time, with unit area.
    SemiGaussian { order: u32 },
    /// Derivative of the semi-Gaussian, as seen on induction planes.
    Bipolar { order: u32 },
}

impl ImpulseResponse {
    pub(crate) fn samples(
        &self,
        fft_size: usize,
        shaping_time_us: f64,
        sampling_rate_ns: f64,
    ) -> Result<Vec<f64>, ConfigError> {
        match self {
            Self::Delta => Ok(vec![1.0]),
            Self::Sampled { samples } => Ok(samples.clone()),
            Self::SemiGaussian { order } => {
                semi_gaussian(*order, fft_size, shaping_time_us, sampling_rate_ns)
            }
            Self::Bipolar { order } => {
                let unipolar = semi_gaussian(*order, fft_size, shaping_time_us, sampling_rate_ns)?;
                let mut previous = 0.0;
                let mut bipolar: Vec<f64> = unipolar
                    .iter()
                    .map(|&value| {
                        let difference = value - previous;
                        previous = value;
                        difference
                    })
                    .collect();
                let positive_lobe: f64 = bipolar.iter().filter(|&&x| x > 0.0).sum();
                if positive_lobe > 0.0 {
                    bipolar.iter_mut().for_each(|x| *x /= positive_lobe);
                }
                Ok(bipolar)
            }
        }
    }
}

/// `(t/τ)ⁿ exp(-t/τ)`, which peaks at `t = nτ`, normalised to unit area.
fn semi_gaussian(
    order: u32,
    fft_size: usize,
    shaping_time_us: f64,
    sampling_rate_ns: f64,
) -> Result<Vec<f64>, ConfigError> {
    if order == 0 {
        return Err(ConfigError::ZeroShaperOrder);
    }
    let tau = shaping_time_us * 1000.0 / sampling_rate_ns / f64::from(order);
    let mut samples: Vec<f64> = (0..fft_size)
        .map(|tick| {
            let t = tick as f64 / tau;
            t.powi(order as i32) * (-t).exp()
        })
        .collect();
    let area: f64 = samples.iter().sum();
    if area > 0.0 {
        samples.iter_mut().for_each(|x| *x /= area);
    }
    Ok(samples)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct PlaneResponseConfig {
    pub(crate) asic_gain: f64,
    pub(crate) impulse: ImpulseResponse,
    /// Noise scale per shaping-time class.
    pub(crate) noise_factors: Vec<f64>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct ResponseConfig {
    /// Microseconds.
    pub(crate) shaping_time: f64,
    /// Indexed by plane.
    pub(crate) planes: Vec<PlaneResponseConfig>,
}

#[derive(Clone, Debug)]
struct PlaneShaping {
    kernel: ResponseKernel,
    asic_gain: f64,
    noise_factor: f64,
}

/// One kernel, gain and noise factor per plane.
#[derive(Clone, Debug)]
pub(crate) struct KernelShaping {
    shaping_time: f64,
    planes: Vec<PlaneShaping>,
}

impl KernelShaping {
    #[tracing::instrument(skip_all, fields(shaping_time = config.shaping_time))]
    pub(crate) fn new(
        config: &ResponseConfig,
        fft: &FftEngine,
        sampling_rate_ns: f64,
    ) -> Result<Self, ConfigError> {
        if sampling_rate_ns.is_nan() || sampling_rate_ns <= 0.0 {
            return Err(ConfigError::NonPositiveSamplingRate(sampling_rate_ns));
        }
        let class = shaping_time_class(config.shaping_time)?;
        let planes = config
            .planes
            .iter()
            .enumerate()
            .map(|(plane, plane_config)| -> Result<PlaneShaping, ConfigError> {
                if plane_config.asic_gain.is_nan() || plane_config.asic_gain <= 0.0 {
                    return Err(ConfigError::NonPositiveGain {
                        plane,
                        gain: plane_config.asic_gain,
                    });
                }
                let impulse = plane_config.impulse.samples(
                    fft.size(),
                    config.shaping_time,
                    sampling_rate_ns,
                )?;
                let noise_factor = plane_config
                    .noise_factors
                    .get(class)
                    .copied()
                    .ok_or(ConfigError::MissingNoiseFactor { plane, class })?;
                Ok(PlaneShaping {
                    kernel: ResponseKernel::from_impulse(&impulse, fft)?,
                    asic_gain: plane_config.asic_gain,
                    noise_factor,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!("Built response kernels for {} planes", planes.len());
        Ok(Self {
            shaping_time: config.shaping_time,
            planes,
        })
    }

    fn plane(&self, plane: PlaneIndex) -> Result<&PlaneShaping, ConfigError> {
        self.planes
            .get(plane)
            .ok_or(ConfigError::MissingPlaneResponse(plane))
    }
}

impl SignalShaping for KernelShaping {
    fn convolute(
        &self,
        _channel: Channel,
        plane: PlaneIndex,
        charge: &mut ChargeSeries,
        fft: &FftEngine,
    ) -> Result<(), ConfigError> {
        self.plane(plane)?.kernel.apply(charge, fft)
    }

    fn asic_gain(&self, _channel: Channel, plane: PlaneIndex) -> Result<f64, ConfigError> {
        Ok(self.plane(plane)?.asic_gain)
    }

    fn shaping_time(&self) -> f64 {
        self.shaping_time
    }

    fn noise_factor(&self, plane: PlaneIndex) -> Result<f64, ConfigError> {
        Ok(self.plane(plane)?.noise_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use realfft::num_complex::Complex;

    fn plane(impulse: ImpulseResponse) -> PlaneResponseConfig {
        PlaneResponseConfig {
            asic_gain: 14.0,
            impulse,
            noise_factors: vec![1.0, 1.1, 1.2, 1.3],
        }
    }

    #[test]
    fn registered_shaping_times() {
        assert_eq!(shaping_time_class(0.6).unwrap(), 0);
        assert_eq!(shaping_time_class(1.0).unwrap(), 1);
        assert_eq!(shaping_time_class(1.3).unwrap(), 2);
        assert_eq!(shaping_time_class(3.0).unwrap(), 3);
    }

    #[test]
    fn unregistered_shaping_time() {
        assert!(matches!(
            shaping_time_class(2.0),
            Err(ConfigError::UnregisteredShapingTime(t)) if t == 2.0
        ));
        let fft = FftEngine::new(16).unwrap();
        let config = ResponseConfig {
            shaping_time: 2.0,
            planes: vec![plane(ImpulseResponse::Delta)],
        };
        assert!(matches!(
            KernelShaping::new(&config, &fft, 400.0),
            Err(ConfigError::UnregisteredShapingTime(_))
        ));
    }

    #[test]
    fn kernel_length_is_checked() {
        assert!(ResponseKernel::new(vec![Complex::new(1.0, 0.0); 9], 16).is_ok());
        assert!(matches!(
            ResponseKernel::new(vec![Complex::new(1.0, 0.0); 8], 16),
            Err(ConfigError::KernelLength { bins: 8, fft_size: 16, expected: 9 })
        ));
        let kernel = ResponseKernel::new(vec![Complex::new(1.0, 0.0); 9], 16).unwrap();
        let mut charge = ChargeSeries::zeros(32);
        assert!(matches!(
            kernel.apply(&mut charge, &FftEngine::new(32).unwrap()),
            Err(ConfigError::KernelLength { .. })
        ));
    }

    #[test]
    fn delta_response_is_identity() {
        let fft = FftEngine::new(16).unwrap();
        let kernel = ResponseKernel::from_impulse(&[1.0], &fft).unwrap();
        assert!(kernel.bins.iter().all(|bin| (bin - Complex::new(1.0, 0.0)).norm() < 1e-12));
        let input: Vec<f64> = (0..16).map(|i| (i % 5) as f64).collect();
        let mut charge = ChargeSeries::new(input.clone(), 16).unwrap();
        kernel.apply(&mut charge, &fft).unwrap();
        for (out, expected) in charge.values().iter().zip(input) {
            assert_approx_eq!(*out, expected, 1e-9);
        }
    }

    #[test]
    fn shift_response_delays_charge() {
        let fft = FftEngine::new(8).unwrap();
        let kernel = ResponseKernel::from_impulse(&[0.0, 0.0, 1.0], &fft).unwrap();
        let mut charge =
            ChargeSeries::new(vec![0.0, 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], 8).unwrap();
        kernel.apply(&mut charge, &fft).unwrap();
        assert_approx_eq!(charge.values()[3], 3.0, 1e-9);
        assert_approx_eq!(charge.values()[1], 0.0, 1e-9);
    }

    #[test]
    fn semi_gaussian_peaks_at_shaping_time() {
        // 1.3 us at 400 ns per tick peaks at tick 3.25
        let samples = ImpulseResponse::SemiGaussian { order: 4 }
            .samples(64, 1.3, 400.0)
            .unwrap();
        assert_approx_eq!(samples.iter().sum::<f64>(), 1.0, 1e-12);
        let peak = samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(tick, _)| tick)
            .unwrap();
        assert_eq!(peak, 3);
        assert!(ImpulseResponse::SemiGaussian { order: 0 }
            .samples(64, 1.3, 400.0)
            .is_err());
    }

    #[test]
    fn bipolar_has_no_net_area() {
        let samples = ImpulseResponse::Bipolar { order: 2 }
            .samples(256, 3.0, 400.0)
            .unwrap();
        assert_approx_eq!(samples.iter().sum::<f64>(), 0.0, 1e-6);
        let positive: f64 = samples.iter().filter(|&&x| x > 0.0).sum();
        assert_approx_eq!(positive, 1.0, 1e-12);
    }

    #[test]
    fn convolution_preserves_area() {
        let fft = FftEngine::new(128).unwrap();
        let config = ResponseConfig {
            shaping_time: 1.3,
            planes: vec![
                plane(ImpulseResponse::Bipolar { order: 4 }),
                plane(ImpulseResponse::SemiGaussian { order: 4 }),
            ],
        };
        let shaping = KernelShaping::new(&config, &fft, 400.0).unwrap();
        let mut values = vec![0.0; 128];
        values[20] = 50.0;
        let mut charge = ChargeSeries::new(values, 128).unwrap();
        shaping.convolute(7, 1, &mut charge, &fft).unwrap();
        assert_approx_eq!(charge.values().iter().sum::<f64>(), 50.0, 1e-6);
        assert!(charge.values()[20] < 50.0);
    }

    #[test]
    fn plane_lookups() {
        let fft = FftEngine::new(16).unwrap();
        let config = ResponseConfig {
            shaping_time: 1.3,
            planes: vec![plane(ImpulseResponse::Delta)],
        };
        let shaping = KernelShaping::new(&config, &fft, 400.0).unwrap();
        assert_approx_eq!(shaping.noise_factor(0).unwrap(), 1.2);
        assert_approx_eq!(shaping.asic_gain(3, 0).unwrap(), 14.0);
        assert_approx_eq!(shaping.shaping_time(), 1.3);
        assert!(matches!(
            shaping.noise_factor(1),
            Err(ConfigError::MissingPlaneResponse(1))
        ));
    }

    #[test]
    fn short_noise_factor_table() {
        let fft = FftEngine::new(16).unwrap();
        let mut short = plane(ImpulseResponse::Delta);
        short.noise_factors.truncate(2);
        let config = ResponseConfig {
            shaping_time: 3.0,
            planes: vec![short],
        };
        assert!(matches!(
            KernelShaping::new(&config, &fft, 400.0),
            Err(ConfigError::MissingNoiseFactor { plane: 0, class: 3 })
        ));
    }

    #[test]
    fn response_tags() {
        let impulses: Vec<ImpulseResponse> = serde_json::from_str(
            r#"[
                { "response-type": "delta" },
                { "response-type": "sampled", "samples": [0.5, 0.5] },
                { "response-type": "semi-gaussian", "order": 4 },
                { "response-type": "bipolar", "order": 2 }
            ]"#,
        )
        .unwrap();
        assert!(matches!(
            impulses[1],
            ImpulseResponse::Sampled { ref samples } if samples.len() == 2
        ));
        assert!(matches!(impulses[3], ImpulseResponse::Bipolar { order: 2 }));
    }
}
