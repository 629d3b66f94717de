use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::capability_store::CapabilityStore;
use crate::deadline::Deadline;
use crate::event_log::EventLog;

/// Shared context passed to every tool execution.
///
/// Cloning a `ToolContext` is cheap — it shares the underlying workspace
/// root, capability store, event log, and deadline across every concurrent
/// tool call in a run.
#[derive(Clone)]
pub struct ToolContext {
    pub workspace: PathBuf,
    pub capabilities: Arc<RwLock<CapabilityStore>>,
    pub event_log: Arc<EventLog>,
    pub deadline: Arc<RwLock<Deadline>>,
    pub secrets: Arc<HashMap<String, String>>,
    pub danger_mode: bool,
}

impl ToolContext {
    pub fn new(
        workspace: PathBuf,
        capabilities: CapabilityStore,
        event_log: Arc<EventLog>,
        deadline: Deadline,
        secrets: HashMap<String, String>,
        danger_mode: bool,
    ) -> Self {
        Self {
            workspace,
            capabilities: Arc::new(RwLock::new(capabilities)),
            event_log,
            deadline: Arc::new(RwLock::new(deadline)),
            secrets: Arc::new(secrets),
            danger_mode,
        }
    }
}
