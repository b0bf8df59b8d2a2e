//! Geometry and calibration lookups.
//!
//! The simulation reaches the detector only through the [Geometry],
//! [PedestalProvider] and [ChannelStatusProvider] traits. [DetectorLayout]
//! and [CalibrationTable] implement them from the run configuration.

use crate::error::{BoundsError, ConfigError, SimulationResult};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    ops::Range,
};
use wiresim_common::{Channel, PlaneIndex};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PlaneId {
    pub(crate) cryostat: u32,
    pub(crate) tpc: u32,
    pub(crate) plane: PlaneIndex,
}

pub(crate) trait Geometry: Send + Sync {
    fn num_channels(&self) -> Channel;

    /// Number of distinct plane indices over all TPCs.
    fn num_planes(&self) -> usize;

    fn planes(&self) -> Vec<PlaneId>;

    fn channel_plane(&self, channel: Channel) -> Result<PlaneIndex, BoundsError>;

    fn plane_wire_to_channel(&self, plane: &PlaneId, wire: u32) -> Result<Channel, BoundsError>;

    /// Channels read out by the planes of one TPC.
    fn tpc_channel_range(&self, cryostat: u32, tpc: u32) -> Result<Range<Channel>, BoundsError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Pedestal {
    pub(crate) mean: f32,
    pub(crate) rms: f32,
}

pub(crate) trait PedestalProvider: Send + Sync {
    fn pedestal(&self, channel: Channel) -> Result<Pedestal, BoundsError>;
}

pub(crate) trait ChannelStatusProvider: Send + Sync {
    fn is_bad(&self, channel: Channel) -> bool;
    fn is_present(&self, channel: Channel) -> bool;
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct TpcLayout {
    pub(crate) cryostat: u32,
    pub(crate) tpc: u32,
    pub(crate) wires_per_plane: Vec<u32>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct DetectorConfig {
    pub(crate) tpcs: Vec<TpcLayout>,
    pub(crate) calibration: CalibrationConfig,
}

#[derive(Clone, Debug)]
struct PlaneLayout {
    id: PlaneId,
    first_channel: Channel,
    num_wires: u32,
}

impl PlaneLayout {
    fn channels(&self) -> Range<Channel> {
        self.first_channel..self.first_channel + self.num_wires
    }
}

/// Channels numbered consecutively plane by plane, in the order the TPCs
/// are listed.
#[derive(Clone, Debug)]
pub(crate) struct DetectorLayout {
    planes: Vec<PlaneLayout>,
    num_channels: Channel,
}

impl DetectorLayout {
    pub(crate) fn new(tpcs: &[TpcLayout]) -> Self {
        let mut next_channel = 0;
        let mut planes = Vec::new();
        for tpc in tpcs {
            for (plane, &num_wires) in tpc.wires_per_plane.iter().enumerate() {
                planes.push(PlaneLayout {
                    id: PlaneId {
                        cryostat: tpc.cryostat,
                        tpc: tpc.tpc,
                        plane,
                    },
                    first_channel: next_channel,
                    num_wires,
                });
                next_channel += num_wires;
            }
        }
        Self {
            planes,
            num_channels: next_channel,
        }
    }
}

impl Geometry for DetectorLayout {
    fn num_channels(&self) -> Channel {
        self.num_channels
    }

    fn num_planes(&self) -> usize {
        self.planes
            .iter()
            .map(|layout| layout.id.plane + 1)
            .max()
            .unwrap_or_default()
    }

    fn planes(&self) -> Vec<PlaneId> {
        self.planes.iter().map(|layout| layout.id).collect()
    }

    fn channel_plane(&self, channel: Channel) -> Result<PlaneIndex, BoundsError> {
        let index = self
            .planes
            .partition_point(|layout| layout.first_channel + layout.num_wires <= channel);
        self.planes
            .get(index)
            .filter(|layout| layout.channels().contains(&channel))
            .map(|layout| layout.id.plane)
            .ok_or(BoundsError::Channel {
                channel,
                num_channels: self.num_channels,
            })
    }

    fn plane_wire_to_channel(&self, plane: &PlaneId, wire: u32) -> Result<Channel, BoundsError> {
        self.planes
            .iter()
            .find(|layout| layout.id == *plane)
            .filter(|layout| wire < layout.num_wires)
            .map(|layout| layout.first_channel + wire)
            .ok_or(BoundsError::Wire {
                cryostat: plane.cryostat,
                tpc: plane.tpc,
                plane: plane.plane,
                wire,
            })
    }

    fn tpc_channel_range(&self, cryostat: u32, tpc: u32) -> Result<Range<Channel>, BoundsError> {
        let mut ranges = self
            .planes
            .iter()
            .filter(|layout| layout.id.cryostat == cryostat && layout.id.tpc == tpc)
            .map(PlaneLayout::channels);
        let first = ranges.next().ok_or(BoundsError::Tpc { cryostat, tpc })?;
        Ok(ranges.fold(first, |acc, range| {
            acc.start.min(range.start)..acc.end.max(range.end)
        }))
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct CalibrationConfig {
    /// Pedestal of every channel on the plane with this index.
    pub(crate) plane_pedestals: Vec<Pedestal>,
    #[serde(default)]
    pub(crate) channel_pedestals: BTreeMap<Channel, Pedestal>,
    #[serde(default)]
    pub(crate) bad_channels: BTreeSet<Channel>,
    #[serde(default)]
    pub(crate) missing_channels: BTreeSet<Channel>,
}

/// Pedestals and channel status resolved for every channel of the detector.
#[derive(Clone, Debug)]
pub(crate) struct CalibrationTable {
    pedestals: Vec<Pedestal>,
    bad_channels: BTreeSet<Channel>,
    missing_channels: BTreeSet<Channel>,
}

impl CalibrationTable {
    pub(crate) fn new(
        config: &CalibrationConfig,
        geometry: &dyn Geometry,
    ) -> SimulationResult<Self> {
        let num_channels = geometry.num_channels();
        let mut pedestals = (0..num_channels)
            .map(|channel| -> SimulationResult<Pedestal> {
                let plane = geometry.channel_plane(channel)?;
                let pedestal = config
                    .plane_pedestals
                    .get(plane)
                    .copied()
                    .ok_or(ConfigError::MissingPedestal(plane))?;
                Ok(pedestal)
            })
            .collect::<SimulationResult<Vec<_>>>()?;
        for (&channel, &pedestal) in &config.channel_pedestals {
            let slot = pedestals
                .get_mut(channel as usize)
                .ok_or(BoundsError::Channel {
                    channel,
                    num_channels,
                })?;
            *slot = pedestal;
        }
        Ok(Self {
            pedestals,
            bad_channels: config.bad_channels.clone(),
            missing_channels: config.missing_channels.clone(),
        })
    }
}

impl PedestalProvider for CalibrationTable {
    fn pedestal(&self, channel: Channel) -> Result<Pedestal, BoundsError> {
        self.pedestals
            .get(channel as usize)
            .copied()
            .ok_or(BoundsError::Channel {
                channel,
                num_channels: self.pedestals.len() as Channel,
            })
    }
}

impl ChannelStatusProvider for CalibrationTable {
    fn is_bad(&self, channel: Channel) -> bool {
        self.bad_channels.contains(&channel)
    }

    fn is_present(&self, channel: Channel) -> bool {
        !self.missing_channels.contains(&channel)
    }
}
