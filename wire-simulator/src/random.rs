use rand::{SeedableRng, rngs::StdRng};
use serde::Deserialize;
use wiresim_common::{BoardIndex, Channel, EventNumber, PlaneIndex};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Seeds {
    /// Slow pedestal fluctuations.
    pub(crate) pedestal: u64,
    /// Uncorrelated, channel-by-channel noise.
    pub(crate) noise: u64,
    /// Noise shared by the channels of a readout board.
    pub(crate) coherent_noise: u64,
}

/// The three random streams of a run.
///
/// Every draw is made from a generator keyed by the stream's seed, the event
/// number and the identity of the channel (or board) it is made for, so the
/// output does not depend on the order in which channels are processed.
#[derive(Clone, Debug)]
pub(crate) struct RandomStreams {
    seeds: Seeds,
}

impl RandomStreams {
    pub(crate) fn new(seeds: Seeds) -> Self {
        Self { seeds }
    }

    pub(crate) fn pedestal(&self, event: EventNumber, channel: Channel) -> StdRng {
        keyed_rng(self.seeds.pedestal, event, u64::from(channel))
    }

    pub(crate) fn noise(&self, event: EventNumber, channel: Channel) -> StdRng {
        keyed_rng(self.seeds.noise, event, u64::from(channel))
    }

    pub(crate) fn coherent_noise(
        &self,
        event: EventNumber,
        board: BoardIndex,
        plane: PlaneIndex,
    ) -> StdRng {
        keyed_rng(
            self.seeds.coherent_noise,
            event,
            (u64::from(board) << 16) ^ plane as u64,
        )
    }
}

fn keyed_rng(seed: u64, event: EventNumber, key: u64) -> StdRng {
    let mixed = split_mix(split_mix(split_mix(seed) ^ u64::from(event)) ^ key);
    StdRng::seed_from_u64(mixed)
}

/// One round of the SplitMix64 finaliser.
fn split_mix(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
