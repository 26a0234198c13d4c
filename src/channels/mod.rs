pub mod agent;
pub mod escalation;
pub mod foreground;
pub mod push;
pub mod sms;

pub use agent::AgentMessageChannel;
pub use escalation::EscalationChannel;
pub use foreground::ForegroundAlertChannel;
pub use push::BackgroundPushChannel;
pub use sms::SmsChannel;
