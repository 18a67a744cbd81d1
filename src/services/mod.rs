//! Domain services behind the event stream and the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! `connection` owns the stream and feeds `classifier` output into the
//! `forwarder` queue. `user_cache` is shared by the forwarder and the
//! routes. `thread` shapes thread reads for `/get_thread`. Route handlers
//! only translate HTTP to these calls.

pub mod classifier;
pub mod connection;
pub mod forwarder;
pub mod thread;
pub mod user_cache;
