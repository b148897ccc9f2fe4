// src/decision/mod.rs
//
// Tracked entities + safety status → DecisionEngine → Decision (+ violation)

pub mod engine;
pub mod session;

pub use engine::DecisionEngine;
pub use session::{Decision, Session};
