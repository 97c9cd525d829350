//! Symbion RPC daemon - system introspection over MQTT
//!
//! Answers queries about the local host for management front ends:
//! - Processes, init scripts, SSH authorized keys
//! - System and kernel log tails
//! - DHCP leases, ARP, routing and connection tracking tables
//!
//! Every call re-reads the live system state; nothing is persisted besides
//! the authorized keys file.

pub mod config;
pub mod dispatch;
pub mod handlers;
pub mod logread;
pub mod parsers;
pub mod response;
pub mod settings;
pub mod status;

pub use config::AgentConfig;
pub use dispatch::{Dispatcher, Method, RpcCall, RpcReply};
pub use handlers::HandlerContext;
pub use response::Response;
pub use status::{RpcError, RpcResult, RpcStatus};
