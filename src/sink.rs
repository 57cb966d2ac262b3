//! Telemetry sinks
//!
//! A sink is a table of pre-declared paths holding the current scalar
//! value of each. Writers call [`TelemetrySink::set`] for every changed
//! path and then [`TelemetrySink::commit`] once per cycle, which is the
//! point where a sink makes the new values visible as one frame.

use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{TracerError, TracerResult};
use crate::value::{SinkValue, Unit};

/// Target of published telemetry.
pub trait TelemetrySink: Send {
    /// Declare a path with its initial value. Paths can only be declared once.
    fn add_path(&mut self, path: &str, initial: SinkValue, unit: Option<Unit>) -> TracerResult<()>;

    /// Update a declared path.
    fn set(&mut self, path: &str, value: SinkValue) -> TracerResult<()>;

    /// Make every update since the previous commit visible.
    fn commit(&mut self) -> TracerResult<()>;
}

/// Path table shared by the concrete sinks.
#[derive(Debug, Clone, Default)]
struct PathTable {
    values: BTreeMap<String, SinkValue>,
    units: BTreeMap<String, Unit>,
}

impl PathTable {
    fn declare(&mut self, path: &str, initial: SinkValue, unit: Option<Unit>) -> TracerResult<()> {
        if self.values.contains_key(path) {
            return Err(TracerError::sink(format!("Path {} already declared", path)));
        }
        self.values.insert(path.to_string(), initial);
        if let Some(unit) = unit {
            self.units.insert(path.to_string(), unit);
        }
        Ok(())
    }

    fn update(&mut self, path: &str, value: SinkValue) -> TracerResult<()> {
        match self.values.get_mut(path) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(TracerError::sink(format!("Path {} is not declared", path))),
        }
    }
}

// ============================================================================
// MemorySink
// ============================================================================

/// In-memory sink.
///
/// Keeps the pending values written since the last commit apart from the
/// committed view, so a reader of [`committed`](Self::committed) never
/// sees half a cycle.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pending: PathTable,
    committed: BTreeMap<String, SinkValue>,
    commits: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value written to `path`, committed or not.
    pub fn get(&self, path: &str) -> Option<&SinkValue> {
        self.pending.values.get(path)
    }

    /// Value of `path` as of the last commit.
    pub fn committed(&self, path: &str) -> Option<&SinkValue> {
        self.committed.get(path)
    }

    pub fn unit(&self, path: &str) -> Option<Unit> {
        self.pending.units.get(path).copied()
    }

    /// Display text of a path's latest value, with its unit.
    pub fn text(&self, path: &str) -> Option<String> {
        let value = self.get(path)?;
        Some(match self.unit(path) {
            Some(unit) => unit.format(value),
            None => value.to_string(),
        })
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.pending.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.pending.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.values.is_empty()
    }
}

impl TelemetrySink for MemorySink {
    fn add_path(&mut self, path: &str, initial: SinkValue, unit: Option<Unit>) -> TracerResult<()> {
        self.pending.declare(path, initial, unit)
    }

    fn set(&mut self, path: &str, value: SinkValue) -> TracerResult<()> {
        self.pending.update(path, value)
    }

    fn commit(&mut self) -> TracerResult<()> {
        self.committed = self.pending.values.clone();
        self.commits += 1;
        Ok(())
    }
}

// ============================================================================
// JsonLinesSink
// ============================================================================

#[derive(Serialize)]
struct Frame<'a> {
    timestamp: DateTime<Utc>,
    service: &'a str,
    sequence: u64,
    values: &'a BTreeMap<String, SinkValue>,
}

/// Sink writing one JSON object per commit to a byte stream.
///
/// Each line carries the full path table:
///
/// ```json
/// {"timestamp":"2024-05-01T12:00:00Z","service":"com.victronenergy.solarcharger.ttyUSB0","sequence":1,"values":{"/Dc/0/Voltage":13.25}}
/// ```
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
    service: String,
    table: PathTable,
    sequence: u64,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W, service: impl Into<String>) -> Self {
        Self {
            writer,
            service: service.into(),
            table: PathTable::default(),
            sequence: 0,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> TelemetrySink for JsonLinesSink<W> {
    fn add_path(&mut self, path: &str, initial: SinkValue, unit: Option<Unit>) -> TracerResult<()> {
        debug!("Declaring {} = {}", path, initial);
        self.table.declare(path, initial, unit)
    }

    fn set(&mut self, path: &str, value: SinkValue) -> TracerResult<()> {
        self.table.update(path, value)
    }

    fn commit(&mut self) -> TracerResult<()> {
        self.sequence += 1;
        let frame = Frame {
            timestamp: Utc::now(),
            service: &self.service,
            sequence: self.sequence,
            values: &self.table.values,
        };
        let line = serde_json::to_string(&frame)
            .map_err(|e| TracerError::sink(format!("Failed to encode frame: {}", e)))?;
        trace!("Frame {} is {} bytes", self.sequence, line.len());

        writeln!(self.writer, "{}", line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| TracerError::sink(format!("Failed to write frame: {}", e)))
    }
}
