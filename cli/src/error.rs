//! Error types for the command-line front end.

use std::path::PathBuf;

/// All errors that can occur while running a command.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("input error: {0}")]
    Input(String),

    #[error("failed to read input file {path}: {source}")]
    InputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse input JSON: {0}")]
    InputParse(#[from] serde_json::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error(transparent)]
    Engine(#[from] nanofolio::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Engine(nanofolio::Error::InsufficientData(_)) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_exits_with_two() {
        let e = Error::from(nanofolio::Error::InsufficientData("no aligned dates".into()));
        assert_eq!(e.exit_code(), 2);
        assert_eq!(e.to_string(), "insufficient data: no aligned dates");
    }

    #[test]
    fn other_errors_exit_with_one() {
        assert_eq!(Error::Input("x".into()).exit_code(), 1);
        let e = Error::from(nanofolio::Error::InvalidWeights("y".into()));
        assert_eq!(e.exit_code(), 1);
    }

    #[test]
    fn json_errors_default_to_input() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(Error::from(parse), Error::InputParse(_)));
    }
}
