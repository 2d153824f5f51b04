use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Job property naming the left-hand operand.
pub const MATRIX_A: &str = "blockmul.multiplication.matrix.a";
/// Job property naming the right-hand operand.
pub const MATRIX_B: &str = "blockmul.multiplication.matrix.b";
/// Job property naming the product matrix.
pub const OUTPUT: &str = "blockmul.multiplication.output";
pub const MAX_ATTEMPTS: &str = "blockmul.task.max.attempts";
pub const REDUCE_PARTITIONS: &str = "blockmul.reduce.partitions";

const DEFAULT_OUTPUT: &str = "product";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Configuration of one multiplication run: `output = matrix_a @ matrix_b`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiplyConfig {
    /// Catalog name of the left-hand operand.
    #[serde(default)]
    pub matrix_a: String,
    /// Catalog name of the right-hand operand.
    #[serde(default)]
    pub matrix_b: String,
    /// Catalog name the product is created under. Must not exist yet.
    #[serde(default = "default_output")]
    pub output: String,
    /// Attempts per partial-product task before the run fails.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Number of reduce partitions, each folded by its own thread.
    #[serde(default = "default_reducers")]
    pub reducers: usize,
}

fn default_output() -> String {
    DEFAULT_OUTPUT.to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_reducers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl MultiplyConfig {
    pub fn new(matrix_a: impl Into<String>, matrix_b: impl Into<String>, output: impl Into<String>) -> Self {
        MultiplyConfig {
            matrix_a: matrix_a.into(),
            matrix_b: matrix_b.into(),
            output: output.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            reducers: default_reducers(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_reducers(mut self, reducers: usize) -> Self {
        self.reducers = reducers;
        self
    }

    /// Build a configuration from flat job properties.
    ///
    /// Unset operand names are left empty and rejected by `validate`, so a
    /// missing key surfaces as a configuration error rather than a lookup of
    /// an empty name.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut config = MultiplyConfig::new(
            props.get(MATRIX_A).cloned().unwrap_or_default(),
            props.get(MATRIX_B).cloned().unwrap_or_default(),
            props
                .get(OUTPUT)
                .cloned()
                .unwrap_or_else(default_output),
        );
        if let Some(v) = props.get(MAX_ATTEMPTS) {
            config.max_attempts = parse_property(MAX_ATTEMPTS, v)?;
        }
        if let Some(v) = props.get(REDUCE_PARTITIONS) {
            config.reducers = parse_property(REDUCE_PARTITIONS, v)?;
        }
        Ok(config)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.matrix_a.trim().is_empty() {
            return Err(EngineError::Configuration(format!(
                "matrix A is not set ({})",
                MATRIX_A
            )));
        }
        if self.matrix_b.trim().is_empty() {
            return Err(EngineError::Configuration(format!(
                "matrix B is not set ({})",
                MATRIX_B
            )));
        }
        if self.output.trim().is_empty() {
            return Err(EngineError::Configuration(format!(
                "output matrix is not set ({})",
                OUTPUT
            )));
        }
        if self.output == self.matrix_a || self.output == self.matrix_b {
            return Err(EngineError::Configuration(format!(
                "output matrix '{}' must differ from both operands",
                self.output
            )));
        }
        if self.max_attempts == 0 {
            return Err(EngineError::Configuration(
                "max_attempts must be > 0".to_string(),
            ));
        }
        if self.reducers == 0 {
            return Err(EngineError::Configuration(
                "reducers must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_property<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        EngineError::Configuration(format!("invalid value for {}: '{}'", key, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn props(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_properties() {
        let config = MultiplyConfig::from_properties(&props(&[
            (MATRIX_A, "a"),
            (MATRIX_B, "b"),
            (OUTPUT, "c"),
            (MAX_ATTEMPTS, "5"),
            (REDUCE_PARTITIONS, "2"),
        ]))
        .unwrap();
        assert_eq!(config.matrix_a, "a");
        assert_eq!(config.matrix_b, "b");
        assert_eq!(config.output, "c");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.reducers, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unset_matrix_fails_validation() {
        let config = MultiplyConfig::from_properties(&props(&[(MATRIX_A, "a")])).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains(MATRIX_B));
    }

    #[test]
    fn test_bad_number() {
        let err = MultiplyConfig::from_properties(&props(&[(MAX_ATTEMPTS, "many")])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_output_must_differ() {
        let config = MultiplyConfig::new("a", "b", "a");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts() {
        let config = MultiplyConfig::new("a", "b", "c").with_max_attempts(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: MultiplyConfig = toml::from_str(
            r#"
            matrix_a = "left"
            matrix_b = "right"
            "#,
        )
        .unwrap();
        assert_eq!(config.output, "product");
        assert_eq!(config.max_attempts, 3);
        assert!(config.reducers >= 1);
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let parsed: std::result::Result<MultiplyConfig, _> = toml::from_str("matrix_c = \"x\"");
        assert!(parsed.is_err());
    }
}
