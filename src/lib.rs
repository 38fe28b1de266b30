//! Music Store Agent
//!
//! A customer-support agent for a digital music store that:
//! - Signs customers in by email, with a human confirming the matched account
//! - Answers account and catalogue questions through SQL tools
//! - Keeps long conversations bounded with a rolling summary
//! - Checkpoints each session between turns and audits every turn
//!
//! CONVERSATION GRAPH:
//! ENTRY → EMAIL ⇄ LOOKUP (CONFIRM?) → END
//! ENTRY → QUERY ⇄ TOOLS → SUMMARIZE → END

pub mod agent;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod models;
pub mod prompts;
pub mod query;
pub mod state;
pub mod store;
pub mod tools;
pub mod verification;

#[cfg(test)]
mod test_support;

pub use error::{AgentError, Result};

// Re-export common types
pub use models::*;
pub use agent::{Agent, TurnOutcome};
