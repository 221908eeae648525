// Shell platform paths for Linux
// Config: ~/.config/seekshell
// Data:   ~/.local/share/seekshell

use std::env;
use std::path::PathBuf;

fn home_dir() -> PathBuf {
    PathBuf::from(env::var("HOME").unwrap_or_else(|_| String::from("/tmp")))
}

/// `$XDG_CONFIG_HOME/seekshell` if set, otherwise `~/.config/seekshell`.
pub fn get_config_dir() -> PathBuf {
    match env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("seekshell"),
        _ => home_dir().join(".config").join("seekshell"),
    }
}

/// `$XDG_DATA_HOME/seekshell` if set, otherwise `~/.local/share/seekshell`.
pub fn get_data_dir() -> PathBuf {
    match env::var("XDG_DATA_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join("seekshell"),
        _ => home_dir().join(".local").join("share").join("seekshell"),
    }
}
