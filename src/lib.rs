//! # velociraptor-bridge
//!
//! Async client for the Velociraptor VQL API, plus the named operations a
//! tool-calling front end needs on top of it.
//!
//! ## Why?
//!
//! The Velociraptor API is a gRPC service that answers VQL with a stream of
//! JSON batches. Using it directly means handling mutual TLS, the batch and
//! log message split, quoting every value spliced into a statement, and
//! polling collections that finish long after they are scheduled.
//! `velociraptor-bridge` does that once:
//!
//! ```ignore
//! let mut stream = client.query_stream("SELECT * FROM clients()").await?;
//! while let Some(record) = stream.next().await {
//!     process(record?);
//! }
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use velociraptor_bridge::Client;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new("volumes/api/api.config.yaml");
//!
//!     let mut stream = client.query_stream("SELECT * FROM info()").await?;
//!     while let Some(record) = stream.next().await {
//!         let record = record?;
//!         println!("{}: {:?}", record.get_string("Hostname").unwrap_or_default(), record);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Lazy connection**: dialed on first use, shared by every clone of a
//!   [`Client`], retried on the next call if it fails
//! - **Streaming**: rows are decoded as response batches arrive
//! - **Safe statements**: [`statement`] quotes every caller-supplied value
//! - **Collections**: [`CollectionPoller`] submits an artifact collection and
//!   waits for its results
//! - **Operations**: [`ToolCall`] decodes and runs the named operations

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod parser;
pub mod poller;
pub mod proto;
pub mod statement;
pub mod tools;
pub mod types;
pub mod value;

// Re-export main types at crate root
pub use client::Client;
pub use config::{ApiConfig, ServerConfig};
pub use connection::{Connection, ConnectionManager, Connector, Transport};
pub use error::{Error, Result};
pub use poller::{CollectionJob, CollectionOutcome, CollectionPoller, PollPolicy};
pub use statement::{Select, Statement};
pub use tools::ToolCall;
pub use types::{Download, FieldLookup, Record};
pub use value::Value;
