//! Read-only access to environment variables.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;

/// Source of environment variables consulted during startup.
pub trait Environment: Send + Sync {
    /// Returns the value of `key`, if set.
    fn var_os(&self, key: &str) -> Option<OsString>;

    /// Returns every variable whose name starts with `prefix`.
    ///
    /// Variables that are not valid Unicode are skipped.
    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)>;

    /// Returns the value of `key` when it is set to a non-empty value.
    fn non_empty(&self, key: &str) -> Option<OsString> {
        self.var_os(key).filter(|value| !value.is_empty())
    }
}

/// Environment backed by the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var_os(&self, key: &str) -> Option<OsString> {
        env::var_os(key)
    }

    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .filter(|(key, _)| key.starts_with(prefix))
            .collect();
        vars.sort();
        vars
    }
}

/// Fixed set of variables, used by embedders and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticEnvironment {
    vars: BTreeMap<String, OsString>,
}

impl StaticEnvironment {
    /// Builds an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the environment with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var_os(&self, key: &str) -> Option<OsString> {
        self.vars.get(key).cloned()
    }

    fn vars_with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.vars
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter_map(|(key, value)| Some((key.clone(), value.clone().into_string().ok()?)))
            .collect()
    }
}
