use std::collections::BTreeMap;

/// Frozen view of the variables settings are resolved from.
///
/// Settings never read the process environment themselves; the caller
/// captures it once (or builds one by hand in tests) and passes it down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvContext {
    vars: BTreeMap<String, String>,
}

impl EnvContext {
    /// Every variable of the current process.
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Value of `key`. Blank values count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Layers `vars` on top; existing keys are replaced.
    pub fn overlay<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.vars.extend(vars);
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
