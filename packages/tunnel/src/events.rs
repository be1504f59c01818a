//! Append-only record streams for completed trains and tunnel events.
//!
//! Each stream has its own lock. Records are kept in memory for the run
//! report and, when a writer is attached, written out as they arrive.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Mutex,
};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

use crate::{
    Section,
    clock::format_hms,
    error::SimulationError,
    train::{Train, TrainId},
};

pub const TRAINS_LOG: &str = "trains.log";
pub const TUNNEL_LOG: &str = "tunnel.log";

const TRAINS_HEADER: &str =
    "Train ID\tStarting Point\tDestination Point\tLength(m)\tArrival Time\tDeparture Time";
const TUNNEL_HEADER: &str = "Event\t\tEvent Time\tTrain ID\tTrains Waiting Passage";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum LogFormat {
    /// Tab separated columns under a header row.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TunnelEventKind {
    PassageEntry,
    Breakdown,
    Overload,
    Cleared,
}

impl TunnelEventKind {
    const fn label(self) -> &'static str {
        match self {
            Self::PassageEntry => "Tunnel Passing",
            Self::Breakdown => "Breakdown",
            Self::Overload => "System Overload",
            Self::Cleared => "Tunnel Cleared",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelEvent {
    pub kind: TunnelEventKind,
    pub time: DateTime<Local>,
    pub train: Option<TrainId>,
    /// Ids registered in the system when the event was recorded.
    pub waiting: Vec<TrainId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared_after_secs: Option<u64>,
}

impl TunnelEvent {
    #[must_use]
    pub const fn passage_entry(train: TrainId, time: DateTime<Local>, waiting: Vec<TrainId>) -> Self {
        Self {
            kind: TunnelEventKind::PassageEntry,
            time,
            train: Some(train),
            waiting,
            cleared_after_secs: None,
        }
    }

    #[must_use]
    pub const fn breakdown(train: TrainId, time: DateTime<Local>, waiting: Vec<TrainId>) -> Self {
        Self {
            kind: TunnelEventKind::Breakdown,
            time,
            train: Some(train),
            waiting,
            cleared_after_secs: None,
        }
    }

    #[must_use]
    pub const fn overload(time: DateTime<Local>, waiting: Vec<TrainId>) -> Self {
        Self {
            kind: TunnelEventKind::Overload,
            time,
            train: None,
            waiting,
            cleared_after_secs: None,
        }
    }

    #[must_use]
    pub const fn cleared(time: DateTime<Local>, after_secs: u64) -> Self {
        Self {
            kind: TunnelEventKind::Cleared,
            time,
            train: None,
            waiting: Vec::new(),
            cleared_after_secs: Some(after_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainRecord {
    pub id: TrainId,
    pub origin: Section,
    pub destination: Option<Section>,
    pub length: u16,
    pub arrival_time: DateTime<Local>,
    pub departure_time: DateTime<Local>,
    pub breakdown: bool,
}

impl TrainRecord {
    /// Final record of a departed train. Falls back to the arrival time if
    /// the train was never stamped.
    #[must_use]
    pub fn from_train(train: &Train) -> Self {
        Self {
            id: train.id,
            origin: train.section,
            destination: train.destination,
            length: train.class.length(),
            arrival_time: train.arrival_time,
            departure_time: train.departure_time.unwrap_or(train.arrival_time),
            breakdown: train.breakdown_applied,
        }
    }
}

trait Record: Serialize {
    const HEADER: &'static str;

    fn text(&self) -> String;
}

fn join_ids(ids: &[TrainId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Record for TrainRecord {
    const HEADER: &'static str = TRAINS_HEADER;

    fn text(&self) -> String {
        format!(
            "{}\t\t{}\t\t{}\t\t\t{}\t\t{}\t\t{}",
            self.id,
            self.origin.entry_point(),
            self.destination.map_or('#', Section::entry_point),
            self.length,
            format_hms(&self.arrival_time),
            format_hms(&self.departure_time),
        )
    }
}

impl Record for TunnelEvent {
    const HEADER: &'static str = TUNNEL_HEADER;

    fn text(&self) -> String {
        let label = self.kind.label();
        let time = format_hms(&self.time);
        let train = self.train.map_or_else(|| "#".to_string(), |id| id.to_string());

        match self.cleared_after_secs {
            Some(secs) => format!("{label}\t\t{time}\t\t{train}\t\t# Time to Clear: {secs} sec"),
            None => format!("{label}\t\t{time}\t\t{train}\t\t{}", join_ids(&self.waiting)),
        }
    }
}

struct Stream<T> {
    records: Vec<T>,
    writer: Option<Box<dyn Write + Send + Sync>>,
}

impl<T: Record> Stream<T> {
    fn new(format: LogFormat, writer: Option<Box<dyn Write + Send + Sync>>) -> std::io::Result<Self> {
        let mut stream = Self {
            records: vec![],
            writer,
        };
        if format == LogFormat::Text
            && let Some(writer) = stream.writer.as_mut()
        {
            writeln!(writer, "{}", T::HEADER)?;
        }
        Ok(stream)
    }

    fn push(&mut self, format: LogFormat, record: T) -> Result<(), SimulationError> {
        if let Some(writer) = self.writer.as_mut() {
            match format {
                LogFormat::Text => writeln!(writer, "{}", record.text())?,
                LogFormat::Json => {
                    serde_json::to_writer(&mut *writer, &record)?;
                    writeln!(writer)?;
                }
            }
        }
        self.records.push(record);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.as_mut().map_or(Ok(()), |writer| writer.flush())
    }
}

pub struct EventSink {
    format: LogFormat,
    trains: Mutex<Stream<TrainRecord>>,
    events: Mutex<Stream<TunnelEvent>>,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl EventSink {
    /// Sink that only retains records in memory.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            format: LogFormat::Text,
            trains: Mutex::new(Stream {
                records: vec![],
                writer: None,
            }),
            events: Mutex::new(Stream {
                records: vec![],
                writer: None,
            }),
        }
    }

    /// Writes each stream to its own writer, starting with the header row in
    /// [`LogFormat::Text`].
    ///
    /// # Errors
    ///
    /// * If writing a header fails
    pub fn with_writers<T, E>(format: LogFormat, trains: T, events: E) -> std::io::Result<Self>
    where
        T: Write + Send + Sync + 'static,
        E: Write + Send + Sync + 'static,
    {
        Ok(Self {
            format,
            trains: Mutex::new(Stream::new(format, Some(Box::new(trains)))?),
            events: Mutex::new(Stream::new(format, Some(Box::new(events)))?),
        })
    }

    /// Creates `trains.log` and `tunnel.log` under `dir`, truncating existing
    /// files.
    ///
    /// # Errors
    ///
    /// * If the directory or either file cannot be created
    pub fn to_dir(dir: impl AsRef<Path>, format: LogFormat) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        log::debug!("to_dir: writing {format:?} logs to {}", dir.display());

        Self::with_writers(
            format,
            BufWriter::new(File::create(dir.join(TRAINS_LOG))?),
            BufWriter::new(File::create(dir.join(TUNNEL_LOG))?),
        )
    }

    /// # Errors
    ///
    /// * If the record cannot be written
    ///
    /// # Panics
    ///
    /// * If the `trains` `Mutex` is poisoned
    pub fn record_train(&self, record: TrainRecord) -> Result<(), SimulationError> {
        self.trains.lock().unwrap().push(self.format, record)
    }

    /// # Errors
    ///
    /// * If the event cannot be written
    ///
    /// # Panics
    ///
    /// * If the `events` `Mutex` is poisoned
    pub fn record_event(&self, event: TunnelEvent) -> Result<(), SimulationError> {
        self.events.lock().unwrap().push(self.format, event)
    }

    /// # Panics
    ///
    /// * If the `trains` `Mutex` is poisoned
    #[must_use]
    pub fn trains(&self) -> Vec<TrainRecord> {
        self.trains.lock().unwrap().records.clone()
    }

    /// # Panics
    ///
    /// * If the `events` `Mutex` is poisoned
    #[must_use]
    pub fn events(&self) -> Vec<TunnelEvent> {
        self.events.lock().unwrap().records.clone()
    }

    /// # Errors
    ///
    /// * If either writer fails to flush
    ///
    /// # Panics
    ///
    /// * If either stream's `Mutex` is poisoned
    pub fn flush(&self) -> std::io::Result<()> {
        self.trains.lock().unwrap().flush()?;
        self.events.lock().unwrap().flush()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone as _;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::train::TravelClass;

    fn at(hour: u32, min: u32, sec: u32) -> DateTime<Local> {
        Local
            .with_ymd_and_hms(2024, 3, 1, hour, min, sec)
            .single()
            .unwrap()
    }

    fn departed_train() -> Train {
        let mut train = Train::new(
            3,
            Section::BC,
            TravelClass::Long,
            Duration::from_secs(3),
            at(10, 0, 1),
        )
        .with_destination(Section::DF);
        train.depart(at(10, 0, 9));
        train
    }

    #[test_log::test]
    fn train_rows_use_entry_point_letters() {
        assert_eq!(
            TrainRecord::from_train(&departed_train()).text(),
            "3\t\tB\t\tF\t\t\t200\t\t10:00:01\t\t10:00:09"
        );
    }

    #[test_log::test]
    fn tunnel_rows() {
        assert_eq!(
            TunnelEvent::passage_entry(4, at(9, 5, 0), vec![4, 6, 9]).text(),
            "Tunnel Passing\t\t09:05:00\t\t4\t\t4, 6, 9"
        );
        assert_eq!(
            TunnelEvent::overload(at(9, 5, 2), vec![1, 2]).text(),
            "System Overload\t\t09:05:02\t\t#\t\t1, 2"
        );
        assert_eq!(
            TunnelEvent::cleared(at(9, 6, 0), 58).text(),
            "Tunnel Cleared\t\t09:06:00\t\t#\t\t# Time to Clear: 58 sec"
        );
    }

    #[test_log::test]
    fn in_memory_sink_keeps_records_in_order() {
        let sink = EventSink::in_memory();

        sink.record_event(TunnelEvent::passage_entry(0, at(1, 0, 0), vec![0]))
            .unwrap();
        sink.record_event(TunnelEvent::breakdown(0, at(1, 0, 0), vec![0]))
            .unwrap();
        sink.record_train(TrainRecord::from_train(&departed_train()))
            .unwrap();

        let kinds: Vec<_> = sink.events().iter().map(|event| event.kind).collect();
        assert_eq!(
            kinds,
            vec![TunnelEventKind::PassageEntry, TunnelEventKind::Breakdown]
        );
        assert_eq!(sink.trains().len(), 1);
        sink.flush().unwrap();
    }

    #[test_log::test]
    fn text_files_start_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventSink::to_dir(dir.path(), LogFormat::Text).unwrap();

        sink.record_train(TrainRecord::from_train(&departed_train()))
            .unwrap();
        sink.flush().unwrap();

        let trains = std::fs::read_to_string(dir.path().join(TRAINS_LOG)).unwrap();
        let tunnel = std::fs::read_to_string(dir.path().join(TUNNEL_LOG)).unwrap();

        assert_eq!(
            trains.lines().collect::<Vec<_>>(),
            vec![TRAINS_HEADER, "3\t\tB\t\tF\t\t\t200\t\t10:00:01\t\t10:00:09"]
        );
        assert_eq!(tunnel, format!("{TUNNEL_HEADER}\n"));
    }

    #[test_log::test]
    fn json_lines_parse_back() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventSink::to_dir(dir.path(), LogFormat::Json).unwrap();

        sink.record_event(TunnelEvent::cleared(at(12, 0, 0), 3))
            .unwrap();
        sink.flush().unwrap();

        let tunnel = std::fs::read_to_string(dir.path().join(TUNNEL_LOG)).unwrap();
        let value: serde_json::Value = serde_json::from_str(tunnel.trim_end()).unwrap();

        assert_eq!(value["kind"], "cleared");
        assert_eq!(value["cleared_after_secs"], 3);
        assert_eq!(value["train"], serde_json::Value::Null);
    }

    #[test_log::test]
    fn parses_log_format_names() {
        use std::str::FromStr as _;

        assert_eq!(LogFormat::from_str("JSON").unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::Text.as_ref(), "text");
    }
}
