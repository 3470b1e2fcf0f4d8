//! Duration and metadata based filtering of video listing pages.

pub mod batcher;
pub mod cache;
pub mod config;
pub mod constants;
pub mod engine;
pub mod events;
pub mod filter;
pub mod harness;
pub mod logging;
pub mod metadata;
pub mod page;
pub mod report;
pub mod retry;
pub mod service;
pub mod settings;
pub mod sim;
