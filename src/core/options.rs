//! Options handed to hook construction: the two policy flags, environment
//! bindings, and free-form keys for individual producers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_ensure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_failure: Option<bool>,

    /// Accepts `[["NAME", "value"], ...]` or `{"NAME": "value"}`.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_env"
    )]
    pub cmd_env: Vec<(String, String)>,

    /// Producer-specific keys (`src`, `branch`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HookOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_ensure(mut self, value: bool) -> Self {
        self.run_ensure = Some(value);
        self
    }

    pub fn ignore_failure(mut self, value: bool) -> Self {
        self.ignore_failure = Some(value);
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cmd_env.push((name.into(), value.into()));
        self
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Layer `caller` over `defaults`; the caller wins every tie.
    ///
    /// Env pairs from `defaults` stay (in order) unless the caller binds the
    /// same name; the caller's pairs follow in their own order.
    pub fn merge(defaults: &HookOptions, caller: &HookOptions) -> HookOptions {
        let mut cmd_env: Vec<(String, String)> = defaults
            .cmd_env
            .iter()
            .filter(|(name, _)| !caller.cmd_env.iter().any(|(n, _)| n == name))
            .cloned()
            .collect();
        cmd_env.extend(caller.cmd_env.iter().cloned());

        let mut extra = defaults.extra.clone();
        for (key, value) in &caller.extra {
            extra.insert(key.clone(), value.clone());
        }

        HookOptions {
            run_ensure: caller.run_ensure.or(defaults.run_ensure),
            ignore_failure: caller.ignore_failure.or(defaults.ignore_failure),
            cmd_env,
            extra,
        }
    }

    pub fn run_ensure_or_default(&self) -> bool {
        self.run_ensure.unwrap_or(true)
    }

    pub fn ignore_failure_or_default(&self) -> bool {
        self.ignore_failure.unwrap_or(false)
    }

    /// String option, `None` when absent.
    pub fn str(&self, key: &str) -> Result<Option<String>> {
        match self.extra.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(Error::config_invalid_value(
                key,
                Some(other.to_string()),
                format!("Option '{}' must be a string", key),
            )),
        }
    }

    /// String option that must be present and non-empty.
    pub fn required_str(&self, key: &str, producer: &str) -> Result<String> {
        match self.str(key)? {
            Some(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(Error::config_missing_key(
                key,
                Some(format!("{} options", producer)),
            )),
        }
    }

    pub fn str_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self.str(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// List-of-strings option; a single string counts as a one-item list.
    pub fn str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        match self.extra.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(Error::config_invalid_value(
                        key,
                        Some(other.to_string()),
                        format!("Option '{}' must hold strings", key),
                    )),
                })
                .collect::<Result<Vec<_>>>()
                .map(Some),
            Some(other) => Err(Error::config_invalid_value(
                key,
                Some(other.to_string()),
                format!("Option '{}' must be a list of strings", key),
            )),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnvSpec {
    Pairs(Vec<(String, String)>),
    Map(Map<String, Value>),
}

fn deserialize_env<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error as _;

    match EnvSpec::deserialize(deserializer)? {
        EnvSpec::Pairs(pairs) => Ok(pairs),
        EnvSpec::Map(map) => map
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => Ok((name, s)),
                Value::Number(n) => Ok((name, n.to_string())),
                Value::Bool(b) => Ok((name, b.to_string())),
                other => Err(D::Error::custom(format!(
                    "cmd_env value for {} must be a scalar, got {}",
                    name, other
                ))),
            })
            .collect(),
    }
}
