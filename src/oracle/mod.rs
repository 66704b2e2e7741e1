//! Oracle boundary: retrying client, HTTP transport, and response parsing.
//!
//! The oracle is an opaque `(prompt, system_prompt) -> text` function. This
//! module owns everything on our side of that boundary: the [`Oracle`] trait
//! seam, the [`OracleClient`] retry wrapper, the stock
//! [`ChatCompletionsOracle`] HTTP transport, and the [`ResponseParser`] that
//! recovers JSON from whatever text comes back.

mod client;
mod http;
mod parser;
mod retry;

pub use client::{Oracle, OracleClient, OracleError, OracleResult};
pub use http::ChatCompletionsOracle;
pub use parser::{ParseError, ParseResult, ResponseParser};
pub use retry::RetryPolicy;
