pub mod agent_loop;
pub mod phase_runner;
pub mod planner;
pub mod supervisor;
pub mod token_tracker;

pub use agent_loop::{AuditAgent, BuildAgent};
pub use phase_runner::{
    AcceptanceResult, BuildPhase, HandoffPhase, HardenPhase, PlanPhase, RequestPhase, VerifyPhase,
};
pub use supervisor::Supervisor;
pub use token_tracker::TokenTracker;
