// Shell platform abstraction
// Resolves where the config file and the database live on each OS.
//
// Uses `cfg(target_os)` to pick the platform implementation at compile time.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Returns the platform-specific configuration directory.
///
/// - **Linux**: `~/.config/seekshell` (or `$XDG_CONFIG_HOME/seekshell`)
/// - **macOS**: `~/Library/Application Support/SeekShell`
/// - **Windows**: `%APPDATA%/SeekShell`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from(".seekshell")
    }
}

/// Returns the platform-specific data directory (database location).
///
/// - **Linux**: `~/.local/share/seekshell` (or `$XDG_DATA_HOME/seekshell`)
/// - **macOS**: `~/Library/Application Support/SeekShell`
/// - **Windows**: `%APPDATA%/SeekShell`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from(".seekshell")
    }
}
