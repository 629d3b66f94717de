use serde::{Deserialize, Serialize};

use crate::capability::CapabilityRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Edit,
    Shell,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Mvp,
    Stretch,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Mvp
    }
}

/// A single unit of work produced by the planner and tracked to completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    pub id: String,
    pub title: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptancePlan {
    pub name: String,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default = "default_true")]
    pub must_pass: bool,
}

fn default_true() -> bool {
    true
}

/// Full output of the PLAN phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanOutput {
    #[serde(default)]
    pub requested_capabilities: Vec<CapabilityRequest>,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
    #[serde(default)]
    pub mvp_definition: Vec<String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub acceptance_plan: Vec<AcceptancePlan>,
}
