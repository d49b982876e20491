// PromptTrail platform paths for Linux
// Config: ~/.config/prompttrail
// Data:   ~/.local/share/prompttrail

use std::env;
use std::path::PathBuf;

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// Returns the configuration directory for PromptTrail on Linux.
/// Uses `$XDG_CONFIG_HOME/prompttrail` if set, otherwise `~/.config/prompttrail`.
pub fn get_config_dir() -> PathBuf {
    match env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("prompttrail"),
        _ => home_dir().join(".config").join("prompttrail"),
    }
}

/// Returns the data directory for PromptTrail on Linux.
/// Uses `$XDG_DATA_HOME/prompttrail` if set, otherwise `~/.local/share/prompttrail`.
pub fn get_data_dir() -> PathBuf {
    match env::var("XDG_DATA_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("prompttrail"),
        _ => home_dir().join(".local").join("share").join("prompttrail"),
    }
}
