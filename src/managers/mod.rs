pub mod bookmark_store;
pub mod tooltip_manager;
