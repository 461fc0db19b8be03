//! Service layer: workflow orchestration over the data layer.

pub mod checklist;
pub mod workflow;

pub use workflow::{TransitionOptions, TransitionPlan, WorkflowService};
