pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod multipart_upload;
pub mod planner;
pub mod poller;
pub mod progress;
pub mod session;
pub mod transfer;
pub mod types;
pub mod ui;
