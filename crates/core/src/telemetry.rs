// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error telemetry sink.

/// A failure worth reporting beyond the local log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryEvent {
    pub kind: &'static str,
    pub message: String,
    pub tags: Vec<(&'static str, String)>,
    /// Large attachment, e.g. a captured log excerpt
    pub extra: Option<String>,
}

impl TelemetryEvent {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), tags: Vec::new(), extra: None }
    }

    pub fn tag(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.tags.push((key, value.into()));
        self
    }

    pub fn extra(mut self, extra: impl Into<String>) -> Self {
        self.extra = Some(extra.into());
        self
    }
}

/// Receives reported failures
pub trait Telemetry: Send + Sync {
    fn capture(&self, event: TelemetryEvent);
}

/// Reports events to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn capture(&self, event: TelemetryEvent) {
        let tags: Vec<String> = event.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        tracing::error!(
            kind = event.kind,
            tags = %tags.join(" "),
            has_extra = event.extra.is_some(),
            "{}",
            event.message
        );
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Telemetry, TelemetryEvent};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Telemetry sink that records every event
    #[derive(Clone, Default)]
    pub struct RecordingTelemetry {
        events: Arc<Mutex<Vec<TelemetryEvent>>>,
    }

    impl RecordingTelemetry {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<TelemetryEvent> {
            self.events.lock().clone()
        }

        pub fn kinds(&self) -> Vec<&'static str> {
            self.events.lock().iter().map(|e| e.kind).collect()
        }
    }

    impl Telemetry for RecordingTelemetry {
        fn capture(&self, event: TelemetryEvent) {
            self.events.lock().push(event);
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::RecordingTelemetry;
