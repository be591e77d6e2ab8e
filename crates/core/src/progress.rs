//! Progress event streaming
//!
//! The lifecycle runner reports what it is doing as [`ProgressEvent`]s. An
//! attached [`ProgressEmitter`] turns them into JSON lines, a spinner, or
//! nothing at all. Emission failures never abort a run; the runner logs them.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Global event ID counter for deterministic ordering
pub static EVENT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Next event id
pub fn next_event_id() -> u64 {
    EVENT_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Events emitted while a lifecycle script runs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    #[serde(rename = "run.begin")]
    RunBegin {
        id: u64,
        timestamp: u64,
        stages: usize,
        steps: usize,
    },
    #[serde(rename = "stage.begin")]
    StageBegin {
        id: u64,
        timestamp: u64,
        index: usize,
        name: String,
    },
    #[serde(rename = "step.end")]
    StepEnd {
        id: u64,
        timestamp: u64,
        stage: String,
        step: String,
        duration_ms: u64,
        success: bool,
    },
    #[serde(rename = "stage.end")]
    StageEnd {
        id: u64,
        timestamp: u64,
        index: usize,
        name: String,
        duration_ms: u64,
        success: bool,
    },
    #[serde(rename = "run.end")]
    RunEnd {
        id: u64,
        timestamp: u64,
        duration_ms: u64,
        success: bool,
    },
}

impl ProgressEvent {
    pub fn id(&self) -> u64 {
        match self {
            ProgressEvent::RunBegin { id, .. } => *id,
            ProgressEvent::StageBegin { id, .. } => *id,
            ProgressEvent::StepEnd { id, .. } => *id,
            ProgressEvent::StageEnd { id, .. } => *id,
            ProgressEvent::RunEnd { id, .. } => *id,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            ProgressEvent::RunBegin { timestamp, .. } => *timestamp,
            ProgressEvent::StageBegin { timestamp, .. } => *timestamp,
            ProgressEvent::StepEnd { timestamp, .. } => *timestamp,
            ProgressEvent::StageEnd { timestamp, .. } => *timestamp,
            ProgressEvent::RunEnd { timestamp, .. } => *timestamp,
        }
    }
}

/// Sink for progress events
pub trait ProgressEmitter: Send + Sync + std::fmt::Debug {
    /// Emit a progress event
    fn emit(&mut self, event: &ProgressEvent) -> Result<()>;
}

/// Writes each event as one JSON line
#[derive(Debug)]
pub struct JsonLinesEmitter<W: Write + Send + Sync + std::fmt::Debug> {
    writer: W,
}

impl<W: Write + Send + Sync + std::fmt::Debug> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send + Sync + std::fmt::Debug> ProgressEmitter for JsonLinesEmitter<W> {
    fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Silent emitter that discards all events
#[derive(Debug, Default)]
pub struct SilentEmitter;

impl ProgressEmitter for SilentEmitter {
    fn emit(&mut self, _event: &ProgressEvent) -> Result<()> {
        Ok(())
    }
}

/// Keeps every event in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl ProgressEmitter for RecordingEmitter {
    fn emit(&mut self, event: &ProgressEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("progress recorder poisoned"))?
            .push(event.clone());
        Ok(())
    }
}
