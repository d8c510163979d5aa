//! Durable stream publishing over NATS JetStream

mod publisher;

pub use publisher::{PublishError, ReadingPublisher, StreamPublisher};
