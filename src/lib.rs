// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the interactive tool.
//
// Module responsibilities:
// - `api`: the submission client — payload assembly, the HTTP transport
//   abstraction, and the bounded retry loop.
// - `error`: the submission and transport error taxonomy.
// - `config`: runtime configuration from environment variables.
// - `template`: the closed template-id table and its resolution.
// - `schedule`: date-range type and calendar range generation.
// - `batch`: the sequential batch driver with resume checkpointing.
// - `ui`: the terminal menu flows, delegating to `api` and `batch`.
pub mod api;
pub mod batch;
pub mod config;
pub mod error;
pub mod schedule;
pub mod template;
pub mod ui;
