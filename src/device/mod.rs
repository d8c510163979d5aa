//! Outbound actuator connection and command dispatch

mod dispatcher;

pub use dispatcher::{CommandDispatcher, CommandSink, DispatchError};
