// PromptTrail shared type definitions
// Each submodule defines types used across the crate.

pub mod anchor;
pub mod bookmark;
pub mod errors;
pub mod geometry;
pub mod marker;
pub mod settings;
