//! # mmbridge
//!
//! Bridges a Mattermost server to an n8n workflow. The event stream side
//! watches for direct messages and thread replies and forwards each one to
//! an inbound webhook; the HTTP side lets the workflow answer in a thread or
//! a direct channel and read whole threads back.
//!
//! The binary in `main.rs` wires these modules together; everything here is
//! usable on its own.

pub mod config;
pub mod mattermost;
pub mod routes;
pub mod services;
pub mod state;
