//! ClipSync bootstrap: configuration, logging, wiring and the run loop that
//! hosts the sync engine.

pub mod bootstrap;
