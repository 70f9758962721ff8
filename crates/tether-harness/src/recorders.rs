#![forbid(unsafe_code)]

//! Recording persistence and host collaborators.

use serde_json::Value;
use tether_core::collab::{HostChannel, HostCommand, Persistence};

/// Keeps every persisted payload.
#[derive(Debug, Clone, Default)]
pub struct RecordingPersistence {
    payloads: Vec<String>,
}

impl RecordingPersistence {
    #[must_use]
    pub fn payloads(&self) -> &[String] {
        &self.payloads
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.payloads.len()
    }

    /// The most recent payload, parsed.
    #[must_use]
    pub fn last_json(&self) -> Option<Value> {
        self.payloads
            .last()
            .and_then(|p| serde_json::from_str(p).ok())
    }
}

impl Persistence for RecordingPersistence {
    fn persist(&mut self, payload_json: &str) {
        self.payloads.push(payload_json.to_string());
    }
}

/// Keeps every host command and alert.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    commands: Vec<HostCommand>,
    alerts: Vec<String>,
}

impl RecordingHost {
    #[must_use]
    pub fn commands(&self) -> &[HostCommand] {
        &self.commands
    }

    #[must_use]
    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }
}

impl HostChannel for RecordingHost {
    fn send(&mut self, command: HostCommand) {
        self.commands.push(command);
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }
}
