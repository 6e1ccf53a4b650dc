// ABOUTME: Core library for insta-media-grabber-rs
// ABOUTME: Logs into Instagram, walks a profile's timeline and downloads its media

use std::sync::Once;

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod media;
pub mod pages;
pub mod session;
pub mod timeline;

// This ensures env_logger is only initialized once
static INIT: Once = Once::new();

/// Initialize the library
///
/// Sets up logging with env_logger. This is safe to call multiple times
/// as it will only initialize the logger on the first call.
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::try_init();
        log::debug!("Logger initialized");
    });
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
