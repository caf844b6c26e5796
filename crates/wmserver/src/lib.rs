//! Window manager service core
//!
//! This library holds the server-side window graph: per-display node
//! containers, avoid-area bookkeeping, minimize batching, observer fan-out
//! and the root registry that ties window lifetime to client lifetime.

pub mod agent;
pub mod avoid_area;
pub mod config;
pub mod container;
pub mod display;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod minimize;
pub mod request;
pub mod root;
pub mod window_node;

pub use agent::{AgentCategory, AgentEvent, AgentRegistry, WindowManagerAgent};
pub use error::{WmError, WmResult};
pub use root::WindowRoot;
