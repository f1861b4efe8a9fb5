// Domain layer - Pure data models and derivation rules
pub mod collar;
pub mod event_log;
pub mod history;
pub mod position;
