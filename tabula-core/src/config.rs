//! Database handle configuration

use serde::{Deserialize, Serialize};

use crate::Result;

/// Runtime options of a [`Database`](crate::Database)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log every statement handed to a connection at `info`
    pub log_query: bool,
}

impl Config {
    /// Read the configuration from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_log_query(mut self, log_query: bool) -> Self {
        self.log_query = log_query;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert!(!Config::default().log_query);
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_from_json() {
        let config = Config::from_json(r#"{"log_query": true}"#).unwrap();
        assert!(config.log_query);
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = Config::from_json("{log_query").unwrap_err();
        assert!(matches!(err, crate::Error::Serialization(_)));
    }
}
