use crate::{charge::IonizationRecord, digit::RawDigit, error::InputError};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::debug;
use wiresim_common::EventNumber;

/// One event of drifted charge, as produced upstream.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct EventInput {
    pub(crate) event: EventNumber,
    #[serde(default)]
    pub(crate) records: Vec<IonizationRecord>,
}

impl EventInput {
    pub(crate) fn empty(event: EventNumber) -> Self {
        Self {
            event,
            records: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: EventNumber,
    digits: &'a [RawDigit],
}

#[tracing::instrument(skip_all, fields(path = ?path))]
pub(crate) fn read_events(path: &Path) -> Result<Vec<EventInput>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let events: Vec<EventInput> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| InputError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    debug!("Read {} events", events.len());
    Ok(events)
}

/// Writes one JSON line per event.
pub(crate) struct DigitWriter<W: Write> {
    writer: W,
    path: PathBuf,
}

impl DigitWriter<BufWriter<File>> {
    pub(crate) fn create(path: &Path) -> Result<Self, InputError> {
        let file = File::create(path).map_err(|source| InputError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufWriter::new(file), path.to_path_buf()))
    }
}

impl<W: Write> DigitWriter<W> {
    pub(crate) fn new(writer: W, path: PathBuf) -> Self {
        Self { writer, path }
    }

    pub(crate) fn write_event(
        &mut self,
        event: EventNumber,
        digits: &[RawDigit],
    ) -> Result<(), InputError> {
        serde_json::to_writer(&mut self.writer, &EventOutput { event, digits })
            .map_err(|source| InputError::Serialise { event, source })?;
        self.writer.write_all(b"\n").map_err(|source| self.write_error(source))
    }

    pub(crate) fn finish(mut self) -> Result<W, InputError> {
        self.writer.flush().map_err(|source| self.write_error(source))?;
        Ok(self.writer)
    }

    fn write_error(&self, source: std::io::Error) -> InputError {
        InputError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
