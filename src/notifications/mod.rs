pub mod ack;
pub mod channel;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod registry;
pub mod service;
pub mod types;

pub use service::{AlertService, AlertSettings};
