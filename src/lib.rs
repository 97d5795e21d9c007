pub mod chart;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod display;
pub mod logging;
pub mod poller;
pub mod render;
pub mod replay;
pub mod snapshot;
pub mod terminal;
