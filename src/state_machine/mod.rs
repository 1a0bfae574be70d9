//! # Pipeline State Machine
//!
//! Explicit states, events, and a pure transition planner for the bulk
//! sync pipeline. Handlers load the persisted job, plan a transition,
//! persist the mutation, then run the side effect; nothing in here touches
//! the store or the network.

pub mod events;
pub mod states;
pub mod transitions;

pub use events::SyncEvent;
pub use states::SyncState;
pub use transitions::{plan_transition, SideEffect, StoreMutation, Transition};
