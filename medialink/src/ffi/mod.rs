//! FFI bindings for external libraries
//!
//! Provides Rust bindings to the C libraries medialink can drive:
//! - **libvlc**: VLC media engine (media, media lists, event managers)

pub mod libvlc;
