use std::{
    env,
    ffi::OsString,
    fs,
    io::{Error, ErrorKind},
    path::PathBuf,
};

const APP_NAME: &str = "madesk";
const SETTINGS_FILE: &str = "settings.json";
const LOG_DIR: &str = "logs";

/// Locations of the settings file and log directory.
///
/// Settings follow the XDG base directory layout so the desktop front-end
/// and the headless binary share one file; logs go under `~/.madesk`.
pub struct ConfigPaths;

impl ConfigPaths {
    /// `$XDG_CONFIG_HOME/madesk`, or `$HOME/.config/madesk` when unset.
    ///
    /// # Errors
    /// Returns `NotFound` if neither variable is set
    pub fn config_dir() -> Result<PathBuf, Error> {
        let base = match non_empty_var("XDG_CONFIG_HOME") {
            Some(config_home) => PathBuf::from(config_home),
            None => home_dir()?.join(".config"),
        };
        Ok(base.join(APP_NAME))
    }

    /// Path of the persisted settings document.
    ///
    /// # Errors
    /// Returns `NotFound` if the configuration directory cannot be determined
    pub fn settings_file() -> Result<PathBuf, Error> {
        Ok(Self::config_dir()?.join(SETTINGS_FILE))
    }

    /// `$HOME/.madesk/logs`, created on first use.
    ///
    /// # Errors
    /// Returns error if `HOME` is unset or the directory cannot be created
    pub fn log_dir() -> Result<PathBuf, Error> {
        let dir = home_dir()?.join(format!(".{APP_NAME}")).join(LOG_DIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

fn non_empty_var(name: &str) -> Option<OsString> {
    env::var_os(name).filter(|value| !value.is_empty())
}

fn home_dir() -> Result<PathBuf, Error> {
    non_empty_var("HOME")
        .map(PathBuf::from)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))
}
