//! Metric sinks
//!
//! A [`Sink`] receives every field-set produced by a poll cycle.
//! [`LineProtocolSink`] and [`JsonSink`] write to any `io::Write`;
//! [`MemorySink`] keeps emissions in memory for embedding and tests.

use serde::Serialize;
use std::io::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::collector::{FieldValue, Fields, Tags};

/// Receiver of flattened, tagged field-sets
pub trait Sink: Send {
    /// Called once per field-set; the collector does not look at the outcome
    fn emit(&mut self, measurement: &str, fields: Fields, tags: Tags);

    /// Called by the harness after every poll cycle
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A single emitted field-set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emission {
    pub measurement: String,
    pub fields: Fields,
    pub tags: Tags,
}

/// Collects emissions in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub emissions: Vec<Emission>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Sink for MemorySink {
    fn emit(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        self.emissions.push(Emission {
            measurement: measurement.to_string(),
            fields,
            tags,
        });
    }
}

fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

/// Writes InfluxDB line protocol
///
/// Write failures don't stop the poll; the first one is kept and
/// returned by the next [`Sink::flush`].
pub struct LineProtocolSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

impl<W: Write> LineProtocolSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Render one line, or `None` when no field is representable
pub fn format_line(
    measurement: &str,
    fields: &Fields,
    tags: &Tags,
    timestamp: u128,
) -> Option<String> {
    let field_set: Vec<String> = fields
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                FieldValue::Integer(i) => format!("{}i", i),
                FieldValue::Float(f) if f.is_finite() => f.to_string(),
                FieldValue::Float(_) | FieldValue::Null => return None,
                FieldValue::Boolean(b) => b.to_string(),
                FieldValue::String(s) => quote(s),
                FieldValue::Array(items) => {
                    quote(&serde_json::Value::from(items.clone()).to_string())
                }
            };
            Some(format!("{}={}", escape_key(key), rendered))
        })
        .collect();

    if field_set.is_empty() {
        return None;
    }

    let mut line = measurement
        .replace(',', "\\,")
        .replace(' ', "\\ ")
        .replace('\n', "\\n");
    for (key, value) in tags.iter().filter(|(_, v)| !v.is_empty()) {
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }
    line.push(' ');
    line.push_str(&field_set.join(","));
    line.push(' ');
    line.push_str(&timestamp.to_string());
    Some(line)
}

/// A raw newline would end the record, so it is written as `\n`
fn escape_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
        .replace('\n', "\\n")
}

fn quote(s: &str) -> String {
    format!(
        "\"{}\"",
        s.replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
    )
}

impl<W: Write + Send> Sink for LineProtocolSink<W> {
    fn emit(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        let Some(line) = format_line(measurement, &fields, &tags, now_nanos()) else {
            tracing::debug!(measurement, "Skipping field-set without writable fields");
            return;
        };
        if let Err(e) = writeln!(self.writer, "{}", line) {
            self.error.get_or_insert(e);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => self.writer.flush(),
        }
    }
}

/// Writes one JSON object per line
pub struct JsonSink<W: Write> {
    writer: W,
    error: Option<io::Error>,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    name: &'a str,
    fields: &'a Fields,
    tags: &'a Tags,
    timestamp: u64,
}

impl<W: Write> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            error: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> Sink for JsonSink<W> {
    fn emit(&mut self, measurement: &str, fields: Fields, tags: Tags) {
        let line = JsonLine {
            name: measurement,
            fields: &fields,
            tags: &tags,
            timestamp: (now_nanos() / 1_000_000_000) as u64,
        };
        let result = serde_json::to_writer(&mut self.writer, &line)
            .map_err(io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = result {
            self.error.get_or_insert(e);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(e) => Err(e),
            None => self.writer.flush(),
        }
    }
}
