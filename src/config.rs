use std::{path::PathBuf, str::FromStr};

use derive_from_env::FromEnv;
use log::LevelFilter;

use crate::error::Error;

/// Logger settings read from `TASK_RANKER_LOG_*` environment variables.
#[derive(FromEnv)]
#[from_env(prefix = "TASK_RANKER_LOG")]
#[allow(non_snake_case)]
pub struct LogEnvConfig {
    /// Directory receiving both log files.
    #[from_env(default = ".")]
    pub FOLDER: String,
    #[from_env(default = "info")]
    pub LEVEL: String,
    /// Echo records to stdout as well.
    #[from_env(default = "false")]
    pub STDOUT: bool,
}

impl LogEnvConfig {
    pub fn load() -> Result<Self, Error> {
        Self::from_env().map_err(|err| Error::Config(format!("{err:?}")))
    }

    pub fn folder(&self) -> PathBuf {
        PathBuf::from(&self.FOLDER)
    }

    pub fn level(&self) -> Result<LevelFilter, Error> {
        LevelFilter::from_str(&self.LEVEL)
            .map_err(|_| Error::Config(format!("unknown log level {:?}", self.LEVEL)))
    }
}
