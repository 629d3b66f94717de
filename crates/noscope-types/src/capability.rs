use serde::{Deserialize, Serialize};

/// Named permission classes that gate privileged tool actions.
///
/// `secrets:<NAME>` grants live as free-form strings rather than a
/// variant here — the set of secret names is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WorkspaceRw,
    ShellExec,
    NetHttp,
    Git,
    Docker,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::WorkspaceRw => "workspace_rw",
            Capability::ShellExec => "shell_exec",
            Capability::NetHttp => "net_http",
            Capability::Git => "git",
            Capability::Docker => "docker",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Risk {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "high")]
    High,
}

/// A capability the planner asks the operator to grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub cap: String,
    pub why: String,
    pub risk: Risk,
}

/// The operator's decision on a single `CapabilityRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityGrant {
    pub cap: String,
    pub approved: bool,
}
