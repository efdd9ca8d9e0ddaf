// iocsweep - platform/mod.rs
//
// Platform abstraction layer: config directories, config.toml, and
// filesystem reads classified into module errors.
// Must NOT depend on: app, modules.

pub mod config;
pub mod fs;
