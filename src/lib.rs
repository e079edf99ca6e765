//! Engine Gateway - health-aware LLM engine routing and streaming
//!
//! This library provides the core of a chat-completion gateway that fronts
//! several local inference engines: engine selection, engine health
//! tracking, bounded admission, and re-encoding of backend token streams
//! into a stable event protocol.
//!
//! Components are explicitly owned and wired together at startup in this
//! order: [`config`] → [`registry`] → [`health`] → [`admission`] →
//! [`routing`] → [`gateway`] → [`api`].

pub mod admission;
pub mod api;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod routing;
