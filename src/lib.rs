// Library root
// -----------
// This crate exposes the library surface behind the `vmfleet` CLI. The
// binary (`main.rs`) parses the command line and hands off to `cli`.
//
// Module responsibilities:
// - `api`: blocking HTTP client for the users/VMs backend, with 429 retry
//   and the auth endpoints.
// - `token` / `credentials`: cached token reuse and where login details
//   come from.
// - `generator`: synthetic users and VMs.
// - `populate` / `cleanup`: batch create and bulk delete through `api`.
// - `report`: JSON, Markdown and HTML reports.
// - `archive`: file listing and zip/tar.gz bundling.
// - `config`, `error`, `logging`: shared plumbing.
// - `cli` / `ui`: command dispatch, terminal output and the interactive menu.
pub mod api;
pub mod archive;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod error;
pub mod generator;
pub mod logging;
pub mod models;
pub mod populate;
pub mod report;
pub mod token;
pub mod ui;
