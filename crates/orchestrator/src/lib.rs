pub mod composer;
pub mod orchestrator;
pub mod router;

pub use composer::compose;
pub use orchestrator::{Orchestrator, TurnResult};
pub use router::{IntentRouter, RouteDecision};
