//! Wagate - WhatsApp Gateway Session Subsystem
//!
//! Maintains one long-lived connection to the messaging network on behalf of
//! a business application:
//! - Single connection handle, driven through a
//!   connect → authenticate → ready → disconnect → reconnect state machine
//! - Durable credential/key material so sessions resume without re-pairing
//! - Send/status/logout surface with classified, humanized failures
//!
//! The protocol engine itself is an external capability plugged in through
//! the traits in [`gateway::engine`].

pub mod config;
pub mod gateway;
pub mod qr;
pub mod session;
pub mod store;
