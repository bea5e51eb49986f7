//! Closed set of messages a tree can raise to the host.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::BbValue;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value", rename_all = "snake_case"))]
pub enum EventPayload {
    Signal,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<BbValue> for EventPayload {
    fn from(value: BbValue) -> Self {
        match value {
            BbValue::Bool(v) => EventPayload::Bool(v),
            BbValue::Int(v) => EventPayload::Int(v),
            BbValue::Float(v) => EventPayload::Float(v),
            BbValue::Text(v) => EventPayload::Text(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventMessage {
    pub channel: String,
    pub payload: EventPayload,
    /// Stable id of the raising entity.
    pub sender: u64,
}

pub trait EventSink {
    fn raise(&mut self, message: &EventMessage);
}

/// Sink that keeps everything it receives.
#[derive(Debug, Default)]
pub struct EventLog {
    pub messages: Vec<EventMessage>,
}

impl EventLog {
    pub fn on_channel<'a>(&'a self, channel: &'a str) -> impl Iterator<Item = &'a EventMessage> {
        self.messages.iter().filter(move |m| m.channel == channel)
    }
}

impl EventSink for EventLog {
    fn raise(&mut self, message: &EventMessage) {
        self.messages.push(message.clone());
    }
}
