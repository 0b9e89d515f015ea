//! Flavia: a personal dinner planner that turns a free-text request plus a
//! directory of personal preference files into validated recipes, plans and
//! shopping lists, delegating the cooking knowledge to an LLM provider.

pub mod agent;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod feedback;
pub mod log;
pub mod model;
pub mod parse;
pub mod plan;
pub mod prompt;
pub mod provider;
pub mod shopping;
pub mod store;
pub mod ux;
pub mod wire;

pub use errors::{FlaviaError, ProviderError, ProviderErrorKind, Result};
