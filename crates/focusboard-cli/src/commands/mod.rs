pub mod config;
pub mod outbox;
pub mod settings;
pub mod stats;
pub mod task;
pub mod timer;
