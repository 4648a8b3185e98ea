//! Interpreter configuration

/// Default limit on nested user-function calls
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Environment variable that overrides the call depth limit
pub const MAX_CALL_DEPTH_ENV: &str = "HINTON_MAX_CALL_DEPTH";

/// Settings that shape how an [`Interpreter`](crate::parser::Interpreter) runs
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpreterConfig {
    /// Calls nested deeper than this raise a stack overflow error
    pub max_call_depth: usize,
    /// Whether hosts should print the value of a trailing expression
    pub echo_results: bool,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            echo_results: true,
        }
    }
}

impl InterpreterConfig {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_echo_results(mut self, echo: bool) -> Self {
        self.echo_results = echo;
        self
    }

    /// Defaults, overridden by the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults, overridden by whatever `lookup` returns for known keys
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = InterpreterConfig::default();

        if let Some(raw) = lookup(MAX_CALL_DEPTH_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(depth) if depth > 0 => config.max_call_depth = depth,
                _ => tracing::warn!(
                    value = %raw,
                    "Ignoring invalid {}, using {}",
                    MAX_CALL_DEPTH_ENV,
                    config.max_call_depth
                ),
            }
        }

        config
    }
}
