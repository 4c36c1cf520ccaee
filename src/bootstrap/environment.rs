use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::process::Command;

/// Variable fixing the importable module search root
pub const MODULE_PATH_VAR: &str = "PYTHONPATH";

/// Variable disabling output buffering in the entry command
pub const UNBUFFERED_VAR: &str = "PYTHONUNBUFFERED";

/// Environment handed to the entry command.
///
/// Built once from the configuration; the two runtime-contract variables
/// are applied last so configured extras cannot override them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnv {
    extra: BTreeMap<String, String>,
    contract: BTreeMap<String, String>,
}

impl RuntimeEnv {
    pub fn for_workdir(workdir: &Path) -> Self {
        let mut contract = BTreeMap::new();
        contract.insert(
            MODULE_PATH_VAR.to_string(),
            workdir.to_string_lossy().into_owned(),
        );
        contract.insert(UNBUFFERED_VAR.to_string(), "1".to_string());

        Self {
            extra: BTreeMap::new(),
            contract,
        }
    }

    /// Add configured variables
    pub fn with_extra(mut self, extra: &HashMap<String, String>) -> Self {
        self.extra
            .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Effective value of a variable
    pub fn get(&self, key: &str) -> Option<&str> {
        self.contract
            .get(key)
            .or_else(|| self.extra.get(key))
            .map(String::as_str)
    }

    /// All variables in application order
    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extra
            .iter()
            .filter(move |(k, _)| !self.contract.contains_key(*k))
            .chain(self.contract.iter())
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn apply(&self, command: &mut Command) {
        for (key, value) in self.vars() {
            command.env(key, value);
        }
    }
}
