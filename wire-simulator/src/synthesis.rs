use wiresim_common::{ADC_MAX, AdcCount};

/// Sums noise, signal and pedestal tick by tick over the readout window,
/// then clamps to the digitiser range and rounds to the nearest count.
///
/// `noise` and `signal` cover the whole FFT window; only the first
/// `readout_len` ticks are digitised.
pub(crate) fn synthesize(
    noise: &[f64],
    signal: &[f64],
    pedestal: f64,
    readout_len: usize,
) -> Vec<AdcCount> {
    noise
        .iter()
        .zip(signal)
        .take(readout_len)
        .map(|(noise, signal)| digitise(noise + signal + pedestal))
        .collect()
}

fn digitise(value: f64) -> AdcCount {
    // NaN casts to zero
    value.clamp(0.0, f64::from(ADC_MAX)).round() as AdcCount
}
