use std::sync::Arc;

use crate::dispatcher::ToolDispatcher;
use crate::filesystem::{CreateDirectoryTool, ListDirectoryTool, ReadFileTool, WriteFileTool};
use crate::git::{GitAddTool, GitCommitTool, GitDiffTool, GitInitTool, GitStatusTool};
use crate::shell::ShellTool;
use crate::tool::Tool;

/// Build the default dispatcher used by a native (non-sandboxed) run: every
/// filesystem, shell, and git tool wired up and ready for capability
/// checks.
pub fn default_dispatcher() -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new();
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ReadFileTool),
        Arc::new(WriteFileTool),
        Arc::new(ListDirectoryTool),
        Arc::new(CreateDirectoryTool),
        Arc::new(ShellTool),
        Arc::new(GitInitTool),
        Arc::new(GitStatusTool),
        Arc::new(GitAddTool),
        Arc::new(GitCommitTool),
        Arc::new(GitDiffTool),
    ];
    dispatcher.register_all(tools);
    dispatcher
}
