// iocsweep - lib.rs
//
// Library entry point. The CLI in `main.rs` is a thin layer over these
// modules; integration tests and other front-ends use them directly.

pub mod app;
pub mod core;
pub mod modules;
pub mod platform;
pub mod util;
