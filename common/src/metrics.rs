use const_format::concatcp;
use metrics::{describe_gauge, gauge};

pub fn component_info_metric(name: &'static str) {
    static NAME: &str = concatcp!(names::METRIC_NAME_PREFIX, "component_info");

    describe_gauge!(NAME, "Basic information about the component");

    let git_rev = option_env!("GIT_VERSION").unwrap_or("unknown");
    gauge!(NAME, "component" => name, "git_version" => git_rev).set(1);
}

pub mod names {
    use const_format::concatcp;

    pub const METRIC_NAME_PREFIX: &str = "wire_simulation_";

    pub const EVENTS_SIMULATED: &str = concatcp!(METRIC_NAME_PREFIX, "events_simulated");
    pub const BOARDS_SELECTED: &str = concatcp!(METRIC_NAME_PREFIX, "boards_selected");
    pub const CHANNELS_DIGITISED: &str = concatcp!(METRIC_NAME_PREFIX, "channels_digitised");
    pub const SIMULATED_CHARGE: &str = concatcp!(METRIC_NAME_PREFIX, "simulated_charge");
    pub const FAILURES: &str = concatcp!(METRIC_NAME_PREFIX, "failures");
}

pub mod failures {
    #[derive(Debug, Clone, Eq, Hash, PartialEq)]
    pub enum FailureKind {
        Configuration,
        ChannelOutOfBounds,
        InputUnreadable,
        OutputWriteFailed,
    }

    // Label building function
    pub fn get_label(failure_kind: FailureKind) -> (&'static str, &'static str) {
        (
            "failure_kind",
            match failure_kind {
                FailureKind::Configuration => "configuration",
                FailureKind::ChannelOutOfBounds => "channel_out_of_bounds",
                FailureKind::InputUnreadable => "input_unreadable",
                FailureKind::OutputWriteFailed => "output_write_failed",
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{failures::*, names::*};

    #[test]
    fn names_share_prefix() {
        assert_eq!(FAILURES, "wire_simulation_failures");
        assert_eq!(CHANNELS_DIGITISED, "wire_simulation_channels_digitised");
        for name in [
            EVENTS_SIMULATED,
            BOARDS_SELECTED,
            CHANNELS_DIGITISED,
            SIMULATED_CHARGE,
            FAILURES,
        ] {
            assert!(name.starts_with(METRIC_NAME_PREFIX));
        }
    }

    #[test]
    fn failure_labels() {
        assert_eq!(
            get_label(FailureKind::ChannelOutOfBounds),
            ("failure_kind", "channel_out_of_bounds")
        );
    }
}
