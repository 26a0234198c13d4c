pub mod channels;
pub mod config;
pub mod escalation;
pub mod notifications;
pub mod platform;
pub mod server;
pub mod subscription;
