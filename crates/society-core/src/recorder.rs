//! Event/Metrics Recorder
//!
//! Observes every component and keeps the immutable event log. Events are
//! held in memory for snapshot consumers and optionally mirrored to an
//! append-only JSONL file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use society_events::{generate_event_id, SimTime, SocietyEvent, SocietyEventKind};

/// Append-only recorder for simulation events.
pub struct EventRecorder {
    events: Vec<SocietyEvent>,
    writer: Option<BufWriter<File>>,
    next_event_id: u64,
}

impl EventRecorder {
    /// In-memory recorder with no file sink.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            writer: None,
            next_event_id: 1,
        }
    }

    /// Recorder that also mirrors every event to a JSONL file.
    pub fn with_jsonl(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            events: Vec::new(),
            writer: Some(BufWriter::new(file)),
            next_event_id: 1,
        })
    }

    /// Records one event, assigning it the next sequential id.
    pub fn record(&mut self, time: SimTime, kind: SocietyEventKind) -> &SocietyEvent {
        let event = SocietyEvent::new(generate_event_id(self.next_event_id), time, kind);
        self.next_event_id += 1;
        if let Some(ref mut writer) = self.writer {
            // Log-sink failures must not abort the run; the in-memory log
            // stays authoritative.
            if let Ok(json) = serde_json::to_string(&event) {
                if let Err(e) = writeln!(writer, "{}", json) {
                    tracing::warn!("event log write failed: {}", e);
                }
            }
        }
        self.events.push(event);
        self.events.last().expect("just pushed")
    }

    /// The full event log in emission order.
    pub fn events(&self) -> &[SocietyEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Event counts keyed by type tag, for metrics.
    pub fn counts_by_tag(&self) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        for event in &self.events {
            *counts.entry(event.kind.tag().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Flushes the JSONL sink, if any.
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventRecorder {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!("failed to flush event log: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use society_events::RunEndReason;

    #[test]
    fn test_sequential_event_ids() {
        let mut recorder = EventRecorder::new();
        let id1 = recorder
            .record(
                SimTime::start(),
                SocietyEventKind::RunEnded {
                    reason: RunEndReason::Completed,
                },
            )
            .event_id
            .clone();
        let id2 = recorder
            .record(
                SimTime::start(),
                SocietyEventKind::RunEnded {
                    reason: RunEndReason::Completed,
                },
            )
            .event_id
            .clone();
        assert_eq!(id1, "evt_00000001");
        assert_eq!(id2, "evt_00000002");
        assert_eq!(recorder.event_count(), 2);
    }

    #[test]
    fn test_jsonl_sink_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut recorder = EventRecorder::with_jsonl(&path).unwrap();
        recorder.record(
            SimTime::new(1, 0, 0),
            SocietyEventKind::AgentArchived {
                agent_id: "agent_0_g0".to_string(),
                lineage: 0,
                final_reputation: 0.1,
            },
        );
        recorder.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: SocietyEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.event_id, "evt_00000001");
        assert_eq!(parsed.kind.tag(), "agent_archived");
    }

    #[test]
    fn test_counts_by_tag() {
        let mut recorder = EventRecorder::new();
        for _ in 0..3 {
            recorder.record(
                SimTime::start(),
                SocietyEventKind::CoalitionDissolved {
                    coalition_id: "coal_x".to_string(),
                },
            );
        }
        let counts = recorder.counts_by_tag();
        assert_eq!(counts.get("coalition_dissolved"), Some(&3));
    }
}
