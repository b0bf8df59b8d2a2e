use crate::error::ConfigError;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex, num_complex::Complex};
use std::{fmt, sync::Arc};

pub(crate) type Spectrum = Vec<Complex<f64>>;

/// Forward and inverse real transforms of a single fixed length, planned once
/// per run and shared between workers. Every call allocates its own scratch
/// so the engine can be used from several threads at once.
#[derive(Clone)]
pub(crate) struct FftEngine {
    size: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

impl fmt::Debug for FftEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftEngine").field("size", &self.size).finish()
    }
}

impl FftEngine {
    pub(crate) fn new(size: usize) -> Result<Self, ConfigError> {
        if size == 0 {
            return Err(ConfigError::ZeroFftSize);
        }
        let mut planner = RealFftPlanner::<f64>::new();
        Ok(Self {
            size,
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
        })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Number of independent frequency bins, `size / 2 + 1`.
    pub(crate) fn spectrum_len(&self) -> usize {
        self.size / 2 + 1
    }

    pub(crate) fn check_len(&self, len: usize) -> Result<(), ConfigError> {
        if len == self.size {
            Ok(())
        } else {
            Err(ConfigError::BufferLength {
                len,
                fft_size: self.size,
            })
        }
    }

    pub(crate) fn forward(&self, samples: &[f64]) -> Result<Spectrum, ConfigError> {
        self.check_len(samples.len())?;
        let mut input = samples.to_vec();
        let mut spectrum = self.forward.make_output_vec();
        self.forward.process(&mut input, &mut spectrum)?;
        Ok(spectrum)
    }

    /// Inverse transform normalised by `1/size`, so `inverse(forward(x)) == x`.
    ///
    /// A real sequence has purely real DC and Nyquist bins; any imaginary part
    /// in those bins is discarded.
    pub(crate) fn inverse(&self, mut spectrum: Spectrum) -> Result<Vec<f64>, ConfigError> {
        if spectrum.len() != self.spectrum_len() {
            return Err(ConfigError::BufferLength {
                len: spectrum.len(),
                fft_size: self.size,
            });
        }
        if let Some(dc) = spectrum.first_mut() {
            dc.im = 0.0;
        }
        if self.size % 2 == 0 {
            if let Some(nyquist) = spectrum.last_mut() {
                nyquist.im = 0.0;
            }
        }
        let mut output = self.inverse.make_output_vec();
        self.inverse.process(&mut spectrum, &mut output)?;
        let norm = 1.0 / self.size as f64;
        output.iter_mut().for_each(|x| *x *= norm);
        Ok(output)
    }
}
