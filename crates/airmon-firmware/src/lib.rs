//! ESP32-S3 firmware-specific modules for airmon
//!
//! This crate contains the code that cannot compile on desktop targets: the
//! board's peripheral adapters, the Wi-Fi station link, the HTTPS transport
//! for the cloud API and the build-time credentials.

#![no_std]

extern crate alloc;

pub mod hardware;
pub mod http;
pub mod secrets;
pub mod wifi;
