//! Output seam between the controller and its consumers.

use crate::scanner::datum::Datum;
use crate::scanner::header::Record;
use crate::scanner::RecoveryEvent;

/// Receives recovered records and diagnostic events from the controller.
///
/// Records and events both arrive strictly in file order, but they are
/// distinct streams: records feed the reinjection pipeline, events feed
/// offset indexing. Implementations that only care about one stream can
/// rely on the default no-op methods.
pub trait RecoverySink {
    /// Called once per fully-valid record, with its decoded datum tree
    fn record(&mut self, sequence: u64, record: &Record, datums: &[Datum<'_>]) {
        let _ = (sequence, record, datums);
    }

    /// Called for every diagnostic event
    fn event(&mut self, event: &RecoveryEvent) {
        let _ = event;
    }
}

/// A sink that discards everything
pub struct NullSink;

impl RecoverySink for NullSink {}

/// A sink that keeps counts and collected events
#[derive(Debug, Default)]
pub struct CountingSink {
    /// Number of records received
    pub records: usize,
    /// Every event received, in order
    pub events: Vec<RecoveryEvent>,
}

impl RecoverySink for CountingSink {
    fn record(&mut self, _sequence: u64, _record: &Record, _datums: &[Datum<'_>]) {
        self.records += 1;
    }

    fn event(&mut self, event: &RecoveryEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_sink_accepts_events() {
        let mut sink = NullSink;
        sink.event(&RecoveryEvent::Recovered { offset: 0 });
    }

    #[test]
    fn test_counting_sink_collects() {
        let mut sink = CountingSink::default();
        sink.event(&RecoveryEvent::HeaderCorruption { offset: 4 });
        sink.event(&RecoveryEvent::Recovered { offset: 9 });

        assert_eq!(sink.records, 0);
        assert_eq!(sink.events.len(), 2);
        assert_eq!(sink.events[1], RecoveryEvent::Recovered { offset: 9 });
    }
}
