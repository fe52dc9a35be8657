//! audrey library - requirements traceability auditing
//!
//! This library exposes the CLI's configuration and report rendering for
//! testing and embedding purposes; the audit pipeline itself lives in
//! `audrey-core`.

pub mod config;
pub mod output;
