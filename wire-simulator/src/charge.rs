use crate::{
    detector::Geometry,
    error::{BoundsError, ConfigError, SimulationError},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use wiresim_common::{Channel, Tdc};

/// Electrons drifted onto a wire at one TDC count.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct ChargeDeposit {
    pub(crate) tdc: Tdc,
    pub(crate) electrons: f64,
}

/// All ionization charge seen by one channel in one event.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct IonizationRecord {
    pub(crate) channel: Channel,
    #[serde(default)]
    pub(crate) deposits: Vec<ChargeDeposit>,
}

/// Charge per tick, in electrons divided by the channel's gain, over the
/// full FFT window.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ChargeSeries {
    values: Vec<f64>,
}

impl ChargeSeries {
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

    /// Bins the record's deposits into ticks, where tick `t` holds TDC
    /// `t + tdc_offset`. Deposits outside the window are dropped.
    pub(crate) fn from_record(
        record: &IonizationRecord,
        fft_size: usize,
        electrons_per_tick: f64,
        tdc_offset: Tdc,
    ) -> Self {
        let mut series = Self::zeros(fft_size);
        for deposit in &record.deposits {
            let Some(tick) = deposit.tdc.checked_sub(tdc_offset) else {
                continue;
            };
            if let Some(value) = series.values.get_mut(tick as usize) {
                *value += deposit.electrons / electrons_per_tick;
            }
        }
        series
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.values.iter().all(|&x| x == 0.0)
    }

    pub(crate) fn replace(&mut self, values: Vec<f64>) -> Result<(), ConfigError> {
        *self = Self::new(values, self.values.len())?;
        Ok(())
    }
}

/// The channel-to-record mapping of one event.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChannelSignals {
    records: BTreeMap<Channel, IonizationRecord>,
}

impl ChannelSignals {
    /// Indexes `records` by channel. A channel listed twice keeps its last
    /// record.
    pub(crate) fn new(
        records: Vec<IonizationRecord>,
        num_channels: Channel,
    ) -> Result<Self, BoundsError> {
        let mut signals = BTreeMap::new();
        for record in records {
            if record.channel >= num_channels {
                return Err(BoundsError::Channel {
                    channel: record.channel,
                    num_channels,
                });
            }
            if let Some(previous) = signals.insert(record.channel, record) {
                warn!("Duplicate ionization record for channel {}", previous.channel);
            }
        }
        Ok(Self { records: signals })
    }

    pub(crate) fn get(&self, channel: Channel) -> Option<&IonizationRecord> {
        self.records.get(&channel)
    }

    pub(crate) fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.records.keys().copied()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Synthetic pulses placed on one wire of every plane, replacing the
/// event input.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct TestInjection {
    pub(crate) wire: u32,
    pub(crate) index: Vec<Tdc>,
    pub(crate) charge: Vec<f64>,
}

impl TestInjection {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.index.len() == self.charge.len() {
            Ok(())
        } else {
            Err(ConfigError::TestPulseMismatch {
                indices: self.index.len(),
                charges: self.charge.len(),
            })
        }
    }

    /// One record per plane, on the channel of that plane's test wire.
    pub(crate) fn records(
        &self,
        geometry: &dyn Geometry,
    ) -> Result<Vec<IonizationRecord>, SimulationError> {
        self.validate()?;
        let num_channels = geometry.num_channels();
        if self.wire >= num_channels {
            return Err(BoundsError::TestWire {
                wire: self.wire,
                num_channels,
            }
            .into());
        }
        let deposits: Vec<ChargeDeposit> = self
            .index
            .iter()
            .zip(&self.charge)
            .map(|(&tdc, &electrons)| ChargeDeposit { tdc, electrons })
            .collect();
        geometry
            .planes()
            .iter()
            .map(|plane| -> Result<_, SimulationError> {
                Ok(IonizationRecord {
                    channel: geometry.plane_wire_to_channel(plane, self.wire)?,
                    deposits: deposits.clone(),
                })
            })
            .collect()
    }
}
