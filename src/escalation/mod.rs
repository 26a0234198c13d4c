mod presenter;

pub use presenter::{AudioAssets, EscalationConfig, EscalationPlan, EscalationPresenter};
