//! Per-event orchestration.
//!
//! For every event the selected readout boards are visited in ascending
//! order; the channels of a board are digitised in parallel, each from its
//! own keyed random streams, and collected back in channel order.

use crate::{
    charge::{ChannelSignals, ChargeSeries, IonizationRecord},
    compression::Compression,
    config::{Region, SimulationConfig},
    detector::{
        CalibrationTable, ChannelStatusProvider, DetectorLayout, Geometry, PedestalProvider,
    },
    digit::RawDigit,
    error::{ConfigError, SimulationResult},
    fft::FftEngine,
    grouping::{board_channels, select_boards},
    noise::{NoiseGenerator, NoiseSample, spectrum::NoiseSpectrumStore},
    random::RandomStreams,
    response::{KernelShaping, SignalShaping},
    synthesis::synthesize,
};
use metrics::{counter, histogram};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroU32,
    ops::Range,
    sync::Arc,
};
use tracing::{debug, info};
use wiresim_common::{
    AdcCount, BoardIndex, Channel, EventNumber, PlaneIndex, Tdc,
    metrics::names::{BOARDS_SELECTED, CHANNELS_DIGITISED, EVENTS_SIMULATED, SIMULATED_CHARGE},
};

/// Run-wide switches that do not depend on the detector.
#[derive(Clone, Debug)]
pub(crate) struct Settings {
    pub(crate) readout_len: usize,
    pub(crate) sampling_rate_ns: f64,
    pub(crate) tdc_offset: Tdc,
    pub(crate) channels_per_board: NonZeroU32,
    pub(crate) suppress_no_signal: bool,
    pub(crate) sim_dead_channels: bool,
    pub(crate) smear_pedestals: bool,
    pub(crate) compression: Compression,
    pub(crate) histogram_plane: Option<PlaneIndex>,
}

pub(crate) struct WireSimulation {
    geometry: Arc<dyn Geometry>,
    pedestals: Arc<dyn PedestalProvider>,
    status: Arc<dyn ChannelStatusProvider>,
    shaping: Arc<dyn SignalShaping>,
    generators: Vec<Box<dyn NoiseGenerator>>,
    /// Per plane, at the run's shaping time.
    noise_factors: Vec<f64>,
    fft: FftEngine,
    streams: RandomStreams,
    boundary: Range<Channel>,
    test_records: Option<Vec<IonizationRecord>>,
    settings: Settings,
}

impl WireSimulation {
    /// Builds every collaborator described by `config`, failing on the first
    /// inconsistency.
    #[tracing::instrument(skip_all)]
    pub(crate) fn from_config(
        config: &SimulationConfig,
        store: &mut NoiseSpectrumStore,
    ) -> SimulationResult<Self> {
        let fft = FftEngine::new(config.readout.fft_size()?)?;
        let layout = Arc::new(DetectorLayout::new(&config.detector.tpcs));
        let calibration = Arc::new(CalibrationTable::new(
            &config.detector.calibration,
            layout.as_ref(),
        )?);
        let shaping = Arc::new(KernelShaping::new(
            &config.response,
            &fft,
            config.readout.sampling_rate_ns,
        )?);
        let generators = config
            .noise_generators
            .iter()
            .map(|generator| generator.build(store, fft.size(), config.readout.sampling_rate_ns))
            .collect::<Result<Vec<_>, _>>()?;
        let boundary = match config.region {
            Region::AllTpcs => 0..layout.num_channels(),
            Region::Tpc { cryostat, tpc } => layout.tpc_channel_range(cryostat, tpc)?,
        };
        let test_records = config
            .test
            .as_ref()
            .map(|test| test.records(layout.as_ref()))
            .transpose()?;
        let settings = Settings {
            readout_len: config.readout.num_time_samples,
            sampling_rate_ns: config.readout.sampling_rate_ns,
            tdc_offset: config.readout.tdc_offset,
            channels_per_board: config.channels_per_board()?,
            suppress_no_signal: config.suppress_no_signal,
            sim_dead_channels: config.sim_dead_channels,
            smear_pedestals: config.smear_pedestals,
            compression: config.compression()?,
            histogram_plane: config.make_histograms.then_some(config.histogram_plane),
        };
        Self::new(
            layout,
            calibration.clone(),
            calibration,
            shaping,
            generators,
            fft,
            RandomStreams::new(config.seeds.clone()),
            boundary,
            test_records,
            settings,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        geometry: Arc<dyn Geometry>,
        pedestals: Arc<dyn PedestalProvider>,
        status: Arc<dyn ChannelStatusProvider>,
        shaping: Arc<dyn SignalShaping>,
        generators: Vec<Box<dyn NoiseGenerator>>,
        fft: FftEngine,
        streams: RandomStreams,
        boundary: Range<Channel>,
        test_records: Option<Vec<IonizationRecord>>,
        settings: Settings,
    ) -> SimulationResult<Self> {
        if settings.readout_len > fft.size() {
            return Err(ConfigError::ReadoutExceedsFft {
                readout: settings.readout_len,
                fft_size: fft.size(),
            }
            .into());
        }
        let num_planes = geometry.num_planes();
        if generators.len() < num_planes {
            return Err(ConfigError::MissingNoiseGenerator(generators.len()).into());
        }
        let noise_factors = (0..num_planes)
            .map(|plane| shaping.noise_factor(plane))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            "Simulating {} channels on {} planes, boundary {:?}, FFT size {}, shaping time {} us",
            geometry.num_channels(),
            num_planes,
            boundary,
            fft.size(),
            shaping.shaping_time()
        );
        Ok(Self {
            geometry,
            pedestals,
            status,
            shaping,
            generators,
            noise_factors,
            fft,
            streams,
            boundary,
            test_records,
            settings,
        })
    }

    /// Digitises one event. Records are replaced by the test injection when
    /// one is configured. Any channel failure aborts the event.
    #[tracing::instrument(skip_all, fields(event = event, records = records.len()))]
    pub(crate) fn process_event(
        &self,
        event: EventNumber,
        records: Vec<IonizationRecord>,
    ) -> SimulationResult<Vec<RawDigit>> {
        let records = match &self.test_records {
            Some(test_records) => test_records.clone(),
            None => records,
        };
        let signals = ChannelSignals::new(records, self.geometry.num_channels())?;
        let boards = select_boards(
            signals.channels(),
            &self.boundary,
            self.settings.channels_per_board,
            self.settings.suppress_no_signal,
        );
        debug!(
            "{} channels with signal, {} boards selected",
            signals.len(),
            boards.len()
        );
        counter!(BOARDS_SELECTED).increment(boards.len() as u64);

        let mut digits = Vec::new();
        for board in boards {
            digits.extend(self.process_board(event, board, &signals)?);
        }
        counter!(EVENTS_SIMULATED).increment(1);
        Ok(digits)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(board = board))]
    fn process_board(
        &self,
        event: EventNumber,
        board: BoardIndex,
        signals: &ChannelSignals,
    ) -> SimulationResult<Vec<RawDigit>> {
        let channels = board_channels(
            board,
            self.settings.channels_per_board,
            self.geometry.num_channels(),
        );
        let board_noise = self.board_noise(event, board, channels.clone())?;
        channels
            .into_par_iter()
            .map(|channel| self.process_channel(event, channel, signals.get(channel), &board_noise))
            .collect()
    }

    /// Noise shared by the channels of `board`, for each plane it reads out
    /// whose generator models it.
    fn board_noise(
        &self,
        event: EventNumber,
        board: BoardIndex,
        channels: Range<Channel>,
    ) -> SimulationResult<BTreeMap<PlaneIndex, NoiseSample>> {
        let planes = channels
            .map(|channel| self.geometry.channel_plane(channel))
            .collect::<Result<BTreeSet<_>, _>>()?;
        let mut board_noise = BTreeMap::new();
        for plane in planes {
            let generator = self.generator(plane)?;
            let mut rng = self.streams.coherent_noise(event, board, plane);
            let scale = self.noise_factor(plane)?;
            if let Some(noise) = generator.board_noise(&mut rng, &self.fft, scale)? {
                board_noise.insert(plane, noise);
            }
        }
        Ok(board_noise)
    }

    #[tracing::instrument(skip_all, level = "trace", fields(channel = channel))]
    fn process_channel(
        &self,
        event: EventNumber,
        channel: Channel,
        record: Option<&IonizationRecord>,
        board_noise: &BTreeMap<PlaneIndex, NoiseSample>,
    ) -> SimulationResult<RawDigit> {
        let plane = self.geometry.channel_plane(channel)?;
        let pedestal = self.pedestals.pedestal(channel)?;
        let mut pedestal_mean = pedestal.mean;
        if self.settings.smear_pedestals {
            let smear = Normal::new(0.0, f64::from(pedestal.rms))
                .map_err(|source| ConfigError::PedestalRms { channel, source })?;
            pedestal_mean += smear.sample(&mut self.streams.pedestal(event, channel)) as f32;
        }

        let mut noise = self.generator(plane)?.channel_noise(
            &mut self.streams.noise(event, channel),
            &self.fft,
            self.noise_factor(plane)?,
        )?;
        if let Some(shared) = board_noise.get(&plane) {
            noise.superpose(shared);
        }

        let mut charge = ChargeSeries::zeros(self.fft.size());
        if let Some(record) = record.filter(|_| !self.is_dead(channel)) {
            let electrons_per_tick =
                self.shaping.asic_gain(channel, plane)? * self.settings.sampling_rate_ns * 1e-3;
            charge = ChargeSeries::from_record(
                record,
                self.fft.size(),
                electrons_per_tick,
                self.settings.tdc_offset,
            );
            self.shaping.convolute(channel, plane, &mut charge, &self.fft)?;
        }

        let adcs = synthesize(
            noise.values(),
            charge.values(),
            f64::from(pedestal_mean),
            self.settings.readout_len,
        );
        if self.settings.histogram_plane == Some(plane) {
            record_area(&adcs, pedestal_mean);
        }
        counter!(CHANNELS_DIGITISED).increment(1);
        Ok(RawDigit::new(
            channel,
            &adcs,
            pedestal_mean,
            self.settings.compression,
        ))
    }

    fn is_dead(&self, channel: Channel) -> bool {
        self.settings.sim_dead_channels
            && (self.status.is_bad(channel) || !self.status.is_present(channel))
    }

    fn generator(&self, plane: PlaneIndex) -> Result<&dyn NoiseGenerator, ConfigError> {
        self.generators
            .get(plane)
            .map(|generator| &**generator)
            .ok_or(ConfigError::MissingNoiseGenerator(plane))
    }

    fn noise_factor(&self, plane: PlaneIndex) -> Result<f64, ConfigError> {
        self.noise_factors
            .get(plane)
            .copied()
            .ok_or(ConfigError::MissingPlaneResponse(plane))
    }
}

fn pedestal_subtracted_area(adcs: &[AdcCount], pedestal: f32) -> f64 {
    adcs.iter()
        .map(|&adc| f64::from(adc) - f64::from(pedestal))
        .sum()
}

fn record_area(adcs: &[AdcCount], pedestal: f32) {
    let area = pedestal_subtracted_area(adcs, pedestal);
    if area > 0.0 {
        histogram!(SIMULATED_CHARGE).record(area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        charge::ChargeDeposit,
        config::tests::minimal_config,
        error::{BoundsError, SimulationError},
    };
    use assert_approx_eq::assert_approx_eq;
    use std::{env, fs::File, io::Write, path::PathBuf};

    fn simulation(value: serde_json::Value) -> SimulationResult<WireSimulation> {
        let config: SimulationConfig = serde_json::from_value(value).unwrap();
        WireSimulation::from_config(&config, &mut NoiseSpectrumStore::default())
    }

    fn record(channel: Channel, tdc: Tdc, electrons: f64) -> IonizationRecord {
        IonizationRecord {
            channel,
            deposits: vec![ChargeDeposit { tdc, electrons }],
        }
    }

    fn channels(digits: &[RawDigit]) -> Vec<Channel> {
        digits.iter().map(RawDigit::channel).collect()
    }

    fn noise_file(bins: usize) -> PathBuf {
        let dir = env::temp_dir().join(format!("wiresim-simulation-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(format!("noise-{bins}.json"));
        let contents = serde_json::json!({ "flat": vec![1.0; bins], "board": vec![0.5; bins] });
        File::create(&path)
            .unwrap()
            .write_all(contents.to_string().as_bytes())
            .unwrap();
        path
    }

    #[test]
    fn pedestal_only_without_charge_or_noise() {
        let simulation = simulation(minimal_config()).unwrap();
        let digits = simulation.process_event(1, vec![]).unwrap();
        assert_eq!(digits.len(), 32);
        for digit in &digits {
            assert_eq!(digit.uncompressed().unwrap(), vec![400; 50]);
            assert_eq!(digit.pedestal(), 400.0);
        }
    }

    #[test]
    fn suppression_pulls_in_whole_board() {
        let mut value = minimal_config();
        value["suppress-no-signal"] = serde_json::json!(true);
        let simulation = simulation(value).unwrap();
        let digits = simulation
            .process_event(1, vec![record(11, 10, 1000.0)])
            .unwrap();
        assert_eq!(channels(&digits), (8..16).collect::<Vec<_>>());
    }

    #[test]
    fn suppression_without_signal_emits_nothing() {
        let mut value = minimal_config();
        value["suppress-no-signal"] = serde_json::json!(true);
        let simulation = simulation(value).unwrap();
        assert!(simulation.process_event(1, vec![]).unwrap().is_empty());
    }

    #[test]
    fn charge_appears_on_its_tick() {
        let simulation = simulation(minimal_config()).unwrap();
        // gain 1.0 at 400 ns gives 0.4 electrons per tick
        let digits = simulation
            .process_event(1, vec![record(3, 10, 40.0)])
            .unwrap();
        let adcs = digits[3].uncompressed().unwrap();
        assert_eq!(adcs[10], 500);
        assert_eq!(adcs.iter().filter(|&&adc| adc != 400).count(), 1);
        assert_eq!(digits[2].uncompressed().unwrap(), vec![400; 50]);
    }

    #[test]
    fn saturation_is_clamped() {
        let simulation = simulation(minimal_config()).unwrap();
        let digits = simulation
            .process_event(1, vec![record(0, 0, 1e7)])
            .unwrap();
        assert_eq!(digits[0].uncompressed().unwrap()[0], wiresim_common::ADC_MAX);
    }

    #[test]
    fn dead_channels_get_no_charge() {
        let mut value = minimal_config();
        value["sim-dead-channels"] = serde_json::json!(true);
        value["detector"]["calibration"]["bad-channels"] = serde_json::json!([3]);
        value["detector"]["calibration"]["missing-channels"] = serde_json::json!([4]);
        let simulation = simulation(value).unwrap();
        let digits = simulation
            .process_event(1, vec![record(3, 10, 40.0), record(4, 10, 40.0), record(5, 10, 40.0)])
            .unwrap();
        assert_eq!(digits[3].uncompressed().unwrap(), vec![400; 50]);
        assert_eq!(digits[4].uncompressed().unwrap(), vec![400; 50]);
        assert_eq!(digits[5].uncompressed().unwrap()[10], 500);
    }

    #[test]
    fn single_tpc_region() {
        let mut value = minimal_config();
        value["region"] = serde_json::json!({ "region-type": "tpc", "cryostat": 0, "tpc": 1 });
        let simulation = simulation(value).unwrap();
        let digits = simulation.process_event(1, vec![]).unwrap();
        assert_eq!(channels(&digits), (16..32).collect::<Vec<_>>());
    }

    #[test]
    fn unknown_tpc_region() {
        let mut value = minimal_config();
        value["region"] = serde_json::json!({ "region-type": "tpc", "cryostat": 1, "tpc": 0 });
        assert!(matches!(
            simulation(value),
            Err(SimulationError::Bounds(BoundsError::Tpc { cryostat: 1, tpc: 0 }))
        ));
    }

    #[test]
    fn channel_out_of_range_aborts_event() {
        let simulation = simulation(minimal_config()).unwrap();
        assert!(matches!(
            simulation.process_event(1, vec![record(32, 0, 1.0)]),
            Err(SimulationError::Bounds(BoundsError::Channel { channel: 32, .. }))
        ));
    }

    #[test]
    fn unregistered_shaping_time_is_fatal() {
        let mut value = minimal_config();
        value["response"]["shaping-time"] = serde_json::json!(2.0);
        assert!(matches!(
            simulation(value),
            Err(SimulationError::Config(ConfigError::UnregisteredShapingTime(_)))
        ));
    }

    #[test]
    fn missing_generator_is_fatal() {
        let mut value = minimal_config();
        value["noise-generators"] = serde_json::json!([{ "generator-type": "quiet" }]);
        assert!(matches!(
            simulation(value),
            Err(SimulationError::Config(ConfigError::MissingNoiseGenerator(1)))
        ));
    }

    #[test]
    fn test_injection_replaces_input() {
        let mut value = minimal_config();
        value["test"] = serde_json::json!({ "wire": 1, "index": [5, 20], "charge": [40.0, 80.0] });
        value["suppress-no-signal"] = serde_json::json!(true);
        let simulation = simulation(value).unwrap();
        let digits = simulation
            .process_event(1, vec![record(30, 10, 40.0)])
            .unwrap();
        // wire 1 of each plane: channels 1, 5, 9, 17, 21, 25 on boards 0, 1, 2, 3
        assert_eq!(digits.len(), 32);
        let channel_5 = digits[5].uncompressed().unwrap();
        assert_eq!(channel_5[5], 500);
        assert_eq!(channel_5[20], 600);
        assert_eq!(digits[30].uncompressed().unwrap(), vec![400; 50]);
    }

    #[test]
    fn mismatched_test_pulses() {
        let mut value = minimal_config();
        value["test"] = serde_json::json!({ "wire": 1, "index": [5, 20], "charge": [40.0] });
        assert!(matches!(
            simulation(value),
            Err(SimulationError::Config(ConfigError::TestPulseMismatch { .. }))
        ));
    }

    #[test]
    fn huffman_output_decodes() {
        let mut value = minimal_config();
        value["compression-type"] = serde_json::json!("Huffman");
        let simulation = simulation(value).unwrap();
        let digits = simulation
            .process_event(1, vec![record(3, 10, 40.0)])
            .unwrap();
        assert_eq!(digits[3].compression(), Compression::Huffman);
        assert!(digits[0].stored_len() < 50);
        assert_eq!(digits[3].uncompressed().unwrap()[10], 500);
    }

    fn noisy_config() -> serde_json::Value {
        let path = noise_file(33);
        let mut value = minimal_config();
        value["noise-generators"] = serde_json::json!([
            { "generator-type": "histogram", "noise-rand": 0.5,
              "source": { "file": path, "histogram": "flat" }, "norm-factor": 40.0 },
            { "generator-type": "coherent", "noise-rand": 0.5,
              "incoherent": { "file": path, "histogram": "flat" },
              "coherent": { "file": path, "histogram": "board" },
              "norm-factor": 40.0, "coherent-norm-factor": 40.0 },
            { "generator-type": "analytic", "noise-rand": 0.1, "amplitude": 40.0,
              "width-khz": 500.0, "low-cutoff-khz": 7.5 }
        ]);
        value["detector"]["calibration"]["plane-pedestals"] = serde_json::json!([
            { "mean": 2048.0, "rms": 2.0 },
            { "mean": 2048.0, "rms": 2.0 },
            { "mean": 400.0, "rms": 2.0 }
        ]);
        value
    }

    #[test]
    fn noise_is_reproducible() {
        let simulation = simulation(noisy_config()).unwrap();
        let first = simulation.process_event(7, vec![]).unwrap();
        let second = simulation.process_event(7, vec![]).unwrap();
        assert_eq!(first, second);
        let other_event = simulation.process_event(8, vec![]).unwrap();
        assert_ne!(first, other_event);
        assert!(
            first
                .iter()
                .any(|digit| digit.pedestal() != 2048.0 && digit.pedestal() != 400.0)
        );
        assert!(first.iter().any(|digit| {
            digit
                .uncompressed()
                .unwrap()
                .iter()
                .any(|&adc| adc != 2048 && adc != 400)
        }));
    }

    #[test]
    fn channel_output_independent_of_board_selection() {
        let full = simulation(noisy_config()).unwrap();
        let mut value = noisy_config();
        value["suppress-no-signal"] = serde_json::json!(true);
        let suppressed = simulation(value).unwrap();

        let records = vec![record(17, 5, 40.0)];
        let all = full.process_event(7, records.clone()).unwrap();
        let selected = suppressed.process_event(7, records).unwrap();
        assert_eq!(channels(&selected), (16..24).collect::<Vec<_>>());
        assert_eq!(channels(&all), (0..32).collect::<Vec<_>>());
        assert_eq!(selected.as_slice(), &all[16..24]);
    }

    #[test]
    fn histogram_area() {
        assert_approx_eq!(pedestal_subtracted_area(&[400, 410, 395], 400.0), 5.0);
        assert_approx_eq!(pedestal_subtracted_area(&[], 400.0), 0.0);
    }
}
