// iocsweep - core/mod.rs
//
// Core layer: data model, lenient record conversion, module contract,
// indicator port, timeline de-duplication, and structured output.
// Must NOT depend on: app, modules, platform.

pub mod export;
pub mod indicators;
pub mod lenient;
pub mod model;
pub mod module;
pub mod timeline;
