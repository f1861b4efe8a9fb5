// Application layer - Use cases and transport ports
pub mod deterrent;
pub mod session;
pub mod telemetry_source;
