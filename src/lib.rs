//! # chainreq - A fluent, chainable HTTP request builder
//!
//! chainreq assembles a request through successive method calls, then sends it
//! with `reqwest`. Body contributions of different shapes (JSON text, records,
//! `key=value` strings, files) merge into one body whose wire format is chosen
//! when the request is sent.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chainreq::Agent;
//! use serde::Serialize;
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct Pet {
//!     name: String,
//!     age: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = Agent::builder()
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // Query parameters keep the order they were added in
//!     let (response, body) = agent
//!         .get("https://api.example.com/pets?kind=fish")
//!         .param("b", "1")
//!         .param("a", "2")
//!         .end()
//!         .await?;
//!     println!("{}: {}", response.status, body);
//!
//!     // JSON text and records merge into one body
//!     let (response, _) = agent
//!         .post("https://api.example.com/pets")
//!         .send(r#"{"owner":"marlin"}"#)
//!         .send_record(&Pet { name: "nemo".to_string(), age: 1 })
//!         .end()
//!         .await?;
//!     println!("Created in {:?}", response.latency);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Body merging** - JSON objects union, `key=value` strings switch to form encoding, records overwrite fields
//! - **Wire formats** - JSON, form-urlencoded, multipart, XML, HTML and plain text
//! - **Ordered query strings** - URL parameters first, then additions in call order
//! - **Collected errors** - Builder calls never fail; the terminal call returns every recorded error
//! - **Reusable chains** - Cloning a chain copies all of its state; the HTTP client stays shared
//! - **Retry on status** - Linear, exponential or custom backoff for chosen response statuses
//! - **Automatic logging** - Structured logging with `tracing`, optionally with a curl rendering of each request
//!
//! ## Error Handling
//!
//! Nothing is sent while the chain holds errors:
//!
//! ```no_run
//! use chainreq::{Agent, ErrorKind};
//!
//! # async fn example() {
//! let agent = Agent::new();
//! match agent.post("https://api.example.com/pets").send("not%zzvalid").end().await {
//!     Ok((response, body)) => println!("{}: {}", response.status, body),
//!     Err(errors) if errors.contains_kind(ErrorKind::Transport) => {
//!         eprintln!("request failed on the wire: {}", errors);
//!     }
//!     Err(errors) => {
//!         for error in errors.iter() {
//!             eprintln!("not sent: {}", error);
//!         }
//!     }
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! ```no_run
//! use chainreq::{Agent, RetryStrategy};
//! use http::StatusCode;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), chainreq::Errors> {
//! let (response, _) = Agent::new()
//!     .get("https://api.example.com/flaky")
//!     .retry(
//!         RetryStrategy::ExponentialBackoff {
//!             initial_delay: Duration::from_millis(100),
//!             max_delay: Duration::from_secs(5),
//!             max_retries: 3,
//!             jitter: true,
//!         },
//!         [StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE],
//!     )
//!     .end()
//!     .await?;
//! println!("took {} attempts", response.attempts);
//! # Ok(())
//! # }
//! ```

mod agent;
pub mod body;
pub mod content_type;
mod curl;
mod error;
pub mod query;
mod request;
mod response;
pub mod retry;
pub mod transport;

pub use agent::{Agent, AgentBuilder};
pub use body::{BodyStore, FileAttachment};
pub use content_type::{ContentType, TypeRegistry};
pub use error::{Error, ErrorKind, Errors, Result};
pub use query::QueryStore;
pub use request::{Cookie, PreparedRequest, Request};
pub use response::Response;
pub use retry::{Retry, RetryStrategy};
pub use transport::{ProxySetting, RedirectPolicy};
