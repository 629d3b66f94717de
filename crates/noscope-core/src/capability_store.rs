use std::collections::HashMap;

use noscope_types::capability::{Capability, CapabilityGrant};

/// Holds granted capabilities for a run and answers access checks.
///
/// Closed-world: any capability not explicitly granted is denied, whether
/// because it was never requested or because the operator declined it.
#[derive(Debug, Default, Clone)]
pub struct CapabilityStore {
    grants: HashMap<String, bool>,
}

impl CapabilityStore {
    pub fn new(grants: Vec<CapabilityGrant>) -> Self {
        let mut store = HashMap::new();
        for g in grants {
            store.insert(g.cap, g.approved);
        }
        Self { grants: store }
    }

    pub fn grant(&mut self, cap: impl Into<String>) {
        self.grants.insert(cap.into(), true);
    }

    pub fn deny(&mut self, cap: impl Into<String>) {
        self.grants.insert(cap.into(), false);
    }

    /// Check whether a named capability has been granted.
    pub fn check(&self, cap: &str) -> bool {
        self.grants.get(cap).copied().unwrap_or(false)
    }

    pub fn check_capability(&self, cap: Capability) -> bool {
        self.check(cap.as_str())
    }

    /// Check whether a named secret (`secrets:<NAME>`) has been granted.
    pub fn get_secret(&self, name: &str) -> bool {
        self.check(&format!("secrets:{name}"))
    }

    pub fn to_grants(&self) -> Vec<CapabilityGrant> {
        self.grants
            .iter()
            .map(|(cap, approved)| CapabilityGrant {
                cap: cap.clone(),
                approved: *approved,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_capability_is_denied() {
        let store = CapabilityStore::default();
        assert!(!store.check("shell_exec"));
        assert!(!store.check_capability(Capability::ShellExec));
    }

    #[test]
    fn explicit_grant_and_deny_are_respected() {
        let mut store = CapabilityStore::default();
        store.grant("shell_exec");
        assert!(store.check("shell_exec"));
        store.deny("shell_exec");
        assert!(!store.check("shell_exec"));
    }

    #[test]
    fn secrets_use_namespaced_key() {
        let mut store = CapabilityStore::default();
        store.grant("secrets:OPENAI_API_KEY");
        assert!(store.get_secret("OPENAI_API_KEY"));
        assert!(!store.get_secret("OTHER_KEY"));
    }
}
