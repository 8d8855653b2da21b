//! Remote API access.
//!
//! The core only ever talks to the remote side through [`RequestGateway`]:
//! an endpoint, a method and an optional JSON body go in, a JSON payload or a
//! [`GatewayError`] comes out. [`HttpGateway`] is the production implementation
//! over reqwest.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::HttpGateway;
pub use error::GatewayError;
pub use gateway::{Method, RequestGateway};
