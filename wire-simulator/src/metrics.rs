use crate::error::SimulationError;
use metrics::{Unit, counter, describe_counter, describe_histogram};
use wiresim_common::metrics::{
    failures::{self, FailureKind},
    names::{BOARDS_SELECTED, CHANNELS_DIGITISED, EVENTS_SIMULATED, FAILURES, SIMULATED_CHARGE},
};

pub(crate) fn describe() {
    describe_counter!(
        EVENTS_SIMULATED,
        Unit::Count,
        "Number of events digitised"
    );
    describe_counter!(
        BOARDS_SELECTED,
        Unit::Count,
        "Number of readout boards selected for digitisation"
    );
    describe_counter!(
        CHANNELS_DIGITISED,
        Unit::Count,
        "Number of channel waveforms produced"
    );
    describe_histogram!(
        SIMULATED_CHARGE,
        Unit::Count,
        "Pedestal-subtracted ADC area of channels on the diagnostics plane"
    );
    describe_counter!(
        FAILURES,
        Unit::Count,
        "Number of failures encountered"
    );
}

pub(crate) fn failure_kind(error: &SimulationError) -> FailureKind {
    match error {
        SimulationError::Config(_) | SimulationError::Compression(_) => FailureKind::Configuration,
        SimulationError::Bounds(_) => FailureKind::ChannelOutOfBounds,
        SimulationError::Input(crate::error::InputError::Write { .. })
        | SimulationError::Input(crate::error::InputError::Serialise { .. }) => {
            FailureKind::OutputWriteFailed
        }
        SimulationError::Input(_) => FailureKind::InputUnreadable,
    }
}

pub(crate) fn record_failure(error: &SimulationError) {
    counter!(FAILURES, &[failures::get_label(failure_kind(error))]).increment(1);
}
