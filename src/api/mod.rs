//! Webex REST API access.
//!
//! - [`transport`]: the HTTP seam ([`Transport`], [`ReqwestTransport`],
//!   [`ScriptedTransport`])
//! - [`client`]: paginated retrieval with rate-limit backoff ([`Client`])

pub mod client;
pub mod transport;

pub use client::{Client, MIN_TOKEN_LEN, Paged, StopReason, validate_token};
pub use transport::{HttpResponse, ReqwestTransport, ScriptedTransport, Transport};
