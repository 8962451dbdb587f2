mod conflicts;
mod local;
mod order;
mod plan;

pub use local::LocalPlanner;
pub use plan::{ChangePlanner, PlanResult, PlanStep};
