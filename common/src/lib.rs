pub mod metrics;
pub mod tracer;

/// Readout channel identifier, unique across the whole detector.
pub type Channel = u32;
/// Index of a readout board, `channel / channels_per_board`.
pub type BoardIndex = u32;
/// Index of a wire plane within a TPC.
pub type PlaneIndex = usize;
/// Drift-time bin in which ionization electrons arrive at a wire.
pub type Tdc = u32;
pub type AdcCount = u16;
pub type EventNumber = u32;

/// Largest code the digitizer can produce.
pub const ADC_MAX: AdcCount = 4095;
