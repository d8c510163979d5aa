//! Inbound telemetry: listener, per-connection sessions, frame parsing,
//! and the per-frame processing pipeline

mod listener;
mod parser;
mod pipeline;
mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use listener::IngestServer;
pub use parser::ParseError;
pub use pipeline::ReadingPipeline;
pub use session::Session;
