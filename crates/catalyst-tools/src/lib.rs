//! Tooling primitives for the Catalyst behaviour-tree runtime.
//!
//! This crate is intentionally lightweight and engine-agnostic. Debug views and inspectors consume
//! the events recorded here; they should live in dedicated adapter crates.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{NullTraceSink, SharedTraceLog, TraceEvent, TraceKind, TraceLog, TraceSink};
