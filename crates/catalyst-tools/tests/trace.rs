use std::cell::RefCell;
use std::rc::Rc;

use catalyst_tools::{NullTraceSink, SharedTraceLog, TraceEvent, TraceKind, TraceLog, TraceSink};

#[derive(Clone, Default)]
struct RcSink(Rc<RefCell<Vec<TraceEvent>>>);

impl TraceSink for RcSink {
    fn emit(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}

fn emit_lifecycle(sink: &mut dyn TraceSink) {
    sink.emit(TraceEvent::new(1, TraceKind::Start, 0, "root"));
    sink.emit(TraceEvent::new(1, TraceKind::ServiceTick, 0, "counter"));
    sink.emit(TraceEvent::new(2, TraceKind::Abort, 3, "patrol"));
    sink.emit(TraceEvent::new(2, TraceKind::Interrupt, 1, "lower_priority"));
    sink.emit(TraceEvent::new(2, TraceKind::Stop, 0, "root").with_status("failure"));
}

#[test]
fn custom_sinks_receive_events_in_order() {
    let handle = RcSink::default();
    let shared = handle.0.clone();
    let mut sink: Box<dyn TraceSink> = Box::new(handle);

    emit_lifecycle(&mut *sink);

    let events = shared.borrow();
    assert_eq!(events.len(), 5);
    assert_eq!(events[2].node, 3);
    assert_eq!(events[4].status.as_deref(), Some("failure"));
}

#[test]
fn summary_names_every_kind() {
    let mut log = TraceLog::default();
    emit_lifecycle(&mut log);

    assert_eq!(
        log.summary(),
        vec![
            "start:root",
            "service:counter",
            "abort:patrol",
            "interrupt:lower_priority",
            "stop:root",
        ]
    );

    log.clear();
    assert!(log.summary().is_empty());
}

#[test]
fn null_sink_discards_everything() {
    let mut sink = NullTraceSink;
    emit_lifecycle(&mut sink);
}

#[test]
fn shared_log_clear_is_seen_by_the_owner() {
    let log = SharedTraceLog::new();
    let mut owned = log.clone();
    emit_lifecycle(&mut owned);
    assert_eq!(log.events().len(), 5);

    log.clear();
    owned.emit(TraceEvent::new(3, TraceKind::Start, 0, "root"));
    assert_eq!(log.summary(), vec!["start:root"]);
}

#[cfg(feature = "serde")]
#[test]
fn trace_log_round_trips_through_json() {
    let mut log = TraceLog::default();
    emit_lifecycle(&mut log);

    let json = serde_json::to_string(&log).unwrap();
    let back: TraceLog = serde_json::from_str(&json).unwrap();
    assert_eq!(back, log);
}
