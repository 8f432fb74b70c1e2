//! Change sinks
//!
//! Where detected changes end up. The detector hands every record to a
//! sink in order; sinks decide how to log or persist them.

use super::record::Change;
use serde_json::Value;
use std::io::Write;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write change: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode change: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Consumer of an ordered change list
pub trait ChangeSink {
    fn record(&mut self, change: &Change) -> Result<(), SinkError>;

    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Collects changes in memory
impl ChangeSink for Vec<Change> {
    fn record(&mut self, change: &Change) -> Result<(), SinkError> {
        self.push(change.clone());
        Ok(())
    }
}

/// Emits one structured log event per change
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ChangeSink for TracingSink {
    fn record(&mut self, change: &Change) -> Result<(), SinkError> {
        let data = change_data(change)?;
        info!(
            change_type = %change.change_type,
            inventory_time = %change.timestamp.to_rfc3339(),
            change_data = %data,
            "{}",
            change.object_path()
        );
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ChangeSink for JsonLinesSink<W> {
    fn record(&mut self, change: &Change) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, change)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// The record minus its type and timestamp, which are logged separately
fn change_data(change: &Change) -> Result<Value, SinkError> {
    let mut value = serde_json::to_value(change)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("type");
        object.remove("timestamp");
    }
    Ok(value)
}
