//! atelier-auth: the authentication slice of the Atelier CMS backend plus
//! its client SDK.
//!
//! The server half issues short-lived JWT access credentials paired with
//! long-lived, single-use, rotating refresh credentials. The client half
//! ([`client::AuthClient`]) coordinates refresh exchanges so that at most
//! one is in flight at a time and every call that hit an expired credential
//! is replayed once the exchange completes.

pub mod client;
pub mod domain;
pub mod error;
pub mod infra;
pub mod issuer;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use routes::app;
