//! Chat Relay Clients
//!
//! The interactive user client and the turn-taking bot client, plus the
//! configuration both are built from. The binaries are thin wrappers around
//! [`client::create_client`].

pub mod agent;
pub mod client;
pub mod config;

pub use client::{ChatClient, ClientError, ClientRole, create_client};
