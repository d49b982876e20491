//! PromptTrail — text anchors and scroll-rail bookmarks for conversation transcripts.
//!
//! This library crate exposes all modules for use by the binary and integration tests.

pub mod app;
pub mod database;
pub mod dom;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
