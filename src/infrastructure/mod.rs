// Infrastructure layer - External transports and adapters
pub mod chunked_json;
pub mod config;
pub mod polling_source;
pub mod stomp_source;
