pub mod fingerprint;
pub mod marker_engine;
pub mod scheduler;
pub mod scroll_locator;
pub mod selection_tracker;
pub mod settings_engine;
pub mod text_offset_mapper;
