// iocsweep - app/mod.rs
//
// Application layer: module run lifecycle, batch execution, merged
// timelines, and the built-in module registry.
// Dependencies: core, modules.

pub mod batch;
pub mod registry;
pub mod runner;
