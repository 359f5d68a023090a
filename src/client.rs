//! Velociraptor streaming client.
//!
//! This module provides the main `Client` type for executing VQL against the
//! Velociraptor API and reading files from a client's virtual filesystem.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use futures::{Stream, StreamExt};
use tracing::{debug, trace};

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionManager, Connector, GrpcConnector, StaticConnector};
use crate::error::Result;
use crate::parser::parse_response;
use crate::proto::{VfsFileBuffer, VqlCollectorArgs, VqlRequest};
use crate::statement::Statement;
use crate::types::{Download, Record};

/// Logical name attached to every VQL request sent by this crate.
pub const QUERY_NAME: &str = "MCP";

/// Velociraptor API client.
///
/// Cloning is cheap: clones share one lazily-established connection.
///
/// # Example
///
/// ```ignore
/// use velociraptor_bridge::Client;
/// use futures::StreamExt;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = Client::new("volumes/api/api.config.yaml");
///
///     let mut stream = client.query_stream("SELECT * FROM info()").await?;
///     while let Some(record) = stream.next().await {
///         println!("Got: {:?}", record?);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    connections: Arc<ConnectionManager>,
}

impl Client {
    /// Create a client that reads credentials from an `api.config.yaml`.
    ///
    /// The file is not read until the first call.
    pub fn new(api_config_path: impl Into<PathBuf>) -> Self {
        Self::with_connector(GrpcConnector::new(api_config_path))
    }

    /// Create a client from resolved server settings.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.api_config_path.clone())
    }

    /// Create a client with a custom connector.
    pub fn with_connector(connector: impl Connector + 'static) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new(connector)),
        }
    }

    /// Create a client over an already established connection.
    pub fn with_connection(connection: Connection) -> Self {
        Self::with_connector(StaticConnector::new(connection))
    }

    /// Returns true once the connection has been established.
    pub fn is_connected(&self) -> bool {
        self.connections.is_connected()
    }

    /// Execute a statement and return its rows as an async stream.
    ///
    /// The request is sent before this returns; rows are decoded as response
    /// messages arrive. Messages that carry only log output yield nothing.
    /// The stream ends when the server closes it. A transport or decode
    /// error is yielded once and ends the stream; rows already yielded stay
    /// valid.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    ///
    /// let mut stream = client.query_stream("SELECT * FROM clients()").await?;
    ///
    /// let mut count = 0;
    /// while let Some(result) = stream.next().await {
    ///     let record = result?;
    ///     count += 1;
    /// }
    /// println!("Processed {} records", count);
    /// ```
    pub async fn query_stream(
        &self,
        statement: impl Into<Statement>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<Record>> + Send>>> {
        let statement = statement.into();
        let connection = self.connections.ensure_connected().await?;

        let request = VqlCollectorArgs {
            query: vec![VqlRequest {
                name: QUERY_NAME.to_string(),
                vql: statement.text().to_string(),
            }],
            max_row: statement.max_rows(),
            max_wait: statement.max_wait(),
            org_id: connection.org_id().to_string(),
        };

        debug!(vql = statement.text(), "sending query");
        let mut responses = connection.transport().query(request).await?;

        let s = stream! {
            let mut rows = 0usize;
            while let Some(message) = responses.next().await {
                let message = match message {
                    Ok(m) => m,
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                };

                if !message.log.is_empty() {
                    trace!(log = %message.log, "query log");
                }

                match parse_response(&message) {
                    None => continue,
                    Some(Ok(records)) => {
                        rows += records.len();
                        for record in records {
                            yield Ok(record);
                        }
                    }
                    Some(Err(e)) => {
                        yield Err(e);
                        break;
                    }
                }
            }
            debug!(rows, "query stream finished");
        };

        Ok(Box::pin(s))
    }

    /// Execute a statement and collect all rows into a Vec.
    ///
    /// **Warning**: This loads all results into memory. For large result sets,
    /// use `query_stream()` instead.
    pub async fn query(&self, statement: impl Into<Statement>) -> Result<Vec<Record>> {
        let mut stream = self.query_stream(statement).await?;
        let mut results = Vec::new();

        while let Some(item) = stream.next().await {
            results.push(item?);
        }

        Ok(results)
    }

    /// Read a byte range of a file from a client's VFS.
    ///
    /// `length` 0 leaves the amount to the server. Chunks are concatenated
    /// in arrival order and returned whole. An error part way through
    /// discards everything read so far.
    pub async fn download(
        &self,
        client_id: &str,
        path: &str,
        offset: u64,
        length: u64,
    ) -> Result<Download> {
        let connection = self.connections.ensure_connected().await?;

        let request = VfsFileBuffer {
            client_id: client_id.to_string(),
            vfs_path: path.to_string(),
            offset,
            length,
            data: Vec::new(),
        };

        debug!(client_id, path, offset, length, "requesting VFS buffer");
        let mut chunks = connection.transport().get_buffer(request).await?;

        let mut download = Download::default();
        while let Some(chunk) = chunks.next().await {
            download.push(&chunk?.data);
        }

        Ok(download)
    }
}
