//! Fit Coach: a single-user fitness and nutrition coach driven by a
//! conversational workflow.

pub mod composer;
pub mod config;
pub mod error;
pub mod llm;
pub mod parser;
pub mod registry;
pub mod routes;
pub mod session;
pub mod store;
pub mod workflow;
