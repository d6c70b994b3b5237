// Router module - route discovery and sponsored execution
// This file wires route enumeration and selection, plan encoding, pre-trade
// validation and the execution supervisor
//
// Numan Thabit 2025 Nov

pub mod enumerator;
pub mod execution;
pub mod plan;
pub mod routes;
pub mod selector;
pub mod validation;

#[allow(clippy::module_inception)]
pub mod router;

pub use enumerator::RouteEnumerator;
pub use execution::{ExecutionEngine, ExecutionOutcome, SupervisorState, SwapRequest};
pub use plan::{SwapPlan, SwapPlanBuilder, WithdrawMode};
pub use router::Router;
pub use routes::{Hop, Route, RouteKind, RouteSelection};
pub use selector::RouteSelector;
