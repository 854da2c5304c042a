//! deskpilot: an LLM-driven desktop agent.
//!
//! Two binaries share this crate. `deskpilot` holds a conversation with a
//! chat-completion model and dispatches model-requested actions to a tool
//! server it spawns as a child process. `deskpilot-tools` is that server:
//! a registry of host-automation tools exposed over line-delimited JSON-RPC
//! on stdin/stdout.

mod application;
mod config;
mod domain;
mod infrastructure;

pub use application::{registry, repl, session, turn};
pub use config::{AgentConfig, AppConfig, ConfigError};
pub use domain::types;
pub use infrastructure::{host, model, rpc, transport};
