//! Network layer subsystem.
//!
//! Plain TCP listeners are bound directly by the binary; this module only
//! prepares the optional rustls configuration for HTTPS.

pub mod tls;

pub use tls::load_tls_config;
