//! Connection management for the Velociraptor API.
//!
//! A process holds one [`ConnectionManager`], which dials the API the first
//! time a call needs it and hands the same [`Connection`] to every caller
//! afterwards. The underlying HTTP/2 channel multiplexes concurrent calls.

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use tokio::sync::OnceCell;
use tonic::transport::{Certificate, Channel, ClientTlsConfig, Identity};
use tracing::info;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::proto::api_client::ApiClient;
use crate::proto::{VfsFileBuffer, VqlCollectorArgs, VqlResponse};

/// Server name the Velociraptor CA issues API server certificates for.
pub const TLS_SERVER_NAME: &str = "VelociraptorServer";

/// A server-streaming response.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// The two streaming calls the bridge makes.
///
/// [`GrpcTransport`] talks to a real server; tests and embedders can supply
/// their own implementation through [`Connection::new`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// `API/Query`: run VQL, stream back result batches.
    async fn query(&self, request: VqlCollectorArgs) -> Result<ResponseStream<VqlResponse>>;

    /// `API/VFSGetBuffer`: stream back chunks of a VFS file.
    async fn get_buffer(&self, request: VfsFileBuffer) -> Result<ResponseStream<VfsFileBuffer>>;
}

/// gRPC implementation of [`Transport`].
#[derive(Clone)]
pub struct GrpcTransport {
    client: ApiClient<Channel>,
}

impl GrpcTransport {
    /// Wrap an established channel.
    pub fn new(channel: Channel) -> Self {
        Self {
            client: ApiClient::new(channel),
        }
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    async fn query(&self, request: VqlCollectorArgs) -> Result<ResponseStream<VqlResponse>> {
        // Channel clones share the connection.
        let mut client = self.client.clone();
        let response = client.query(request).await?;
        Ok(Box::pin(response.into_inner().map_err(Error::from)))
    }

    async fn get_buffer(&self, request: VfsFileBuffer) -> Result<ResponseStream<VfsFileBuffer>> {
        let mut client = self.client.clone();
        let response = client.vfs_get_buffer(request).await?;
        Ok(Box::pin(response.into_inner().map_err(Error::from)))
    }
}

/// An established API connection: the transport plus the org every request
/// is scoped to.
#[derive(Clone)]
pub struct Connection {
    transport: Arc<dyn Transport>,
    org_id: String,
}

impl Connection {
    /// Build a connection from any transport.
    pub fn new(transport: Arc<dyn Transport>, org_id: impl Into<String>) -> Self {
        Self {
            transport,
            org_id: org_id.into(),
        }
    }

    /// The transport.
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Organization scope sent with every query.
    pub fn org_id(&self) -> &str {
        &self.org_id
    }
}

/// Produces a [`Connection`]. Called at most once per successful
/// initialization.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a connection.
    async fn connect(&self) -> Result<Connection>;
}

/// Dials the API described by an `api.config.yaml`.
#[derive(Clone, Debug)]
pub struct GrpcConnector {
    api_config_path: PathBuf,
}

impl GrpcConnector {
    /// Create a connector for the given credentials file.
    pub fn new(api_config_path: impl Into<PathBuf>) -> Self {
        Self {
            api_config_path: api_config_path.into(),
        }
    }
}

#[async_trait]
impl Connector for GrpcConnector {
    async fn connect(&self) -> Result<Connection> {
        let config = ApiConfig::from_file(&self.api_config_path)?;

        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&config.ca_certificate))
            .identity(Identity::from_pem(
                &config.client_cert,
                &config.client_private_key,
            ))
            .domain_name(TLS_SERVER_NAME);

        let endpoint = format!("https://{}", config.api_connection_string);
        let channel = Channel::from_shared(endpoint.clone())
            .map_err(|e| Error::Config(format!("invalid api_connection_string: {}", e)))?
            .tls_config(tls)?
            .connect()
            .await?;

        info!(endpoint = %endpoint, org_id = %config.org_id, "connected to Velociraptor API");
        Ok(Connection::new(
            Arc::new(GrpcTransport::new(channel)),
            config.org_id,
        ))
    }
}

/// Connector that hands out a pre-built connection.
#[derive(Clone)]
pub struct StaticConnector {
    connection: Connection,
}

impl StaticConnector {
    /// Wrap a connection.
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self) -> Result<Connection> {
        Ok(self.connection.clone())
    }
}

/// Lazily initialised, process-wide connection.
///
/// The first successful [`ensure_connected`](Self::ensure_connected) stores
/// the connection; every later call returns it without locking. Concurrent
/// first calls wait on a single initializer. A failed initialization stores
/// nothing, so the next call starts over. A connection that breaks after it
/// was stored is never replaced; its failures surface from the calls that
/// use it.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    cell: OnceCell<Connection>,
}

impl ConnectionManager {
    /// Create a manager around a connector. Nothing is dialed yet.
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Box::new(connector),
            cell: OnceCell::new(),
        }
    }

    /// Return the connection, establishing it if this is the first call.
    ///
    /// Any failure is reported as [`Error::Unavailable`] wrapping the cause.
    pub async fn ensure_connected(&self) -> Result<&Connection> {
        self.cell
            .get_or_try_init(|| async {
                self.connector
                    .connect()
                    .await
                    .map_err(|e| Error::unavailable("Failed to connect to Velociraptor", e))
            })
            .await
    }

    /// Returns true once a connection has been stored.
    pub fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn query(&self, _: VqlCollectorArgs) -> Result<ResponseStream<VqlResponse>> {
            Ok(Box::pin(futures::stream::empty()))
        }

        async fn get_buffer(&self, _: VfsFileBuffer) -> Result<ResponseStream<VfsFileBuffer>> {
            Ok(Box::pin(futures::stream::empty()))
        }
    }

    /// Fails the first `failures` attempts, then succeeds.
    struct FlakyConnector {
        attempts: Arc<AtomicUsize>,
        failures: usize,
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self) -> Result<Connection> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if n < self.failures {
                return Err(Error::Config("missing api.config.yaml".to_string()));
            }
            Ok(Connection::new(Arc::new(NullTransport), "O1"))
        }
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried_by_next_call() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let manager = ConnectionManager::new(FlakyConnector {
            attempts: attempts.clone(),
            failures: 1,
        });

        let err = manager.ensure_connected().await.err().unwrap();
        assert!(matches!(err, Error::Unavailable { .. }));
        assert!(!manager.is_connected());

        let conn = manager.ensure_connected().await.unwrap();
        assert_eq!(conn.org_id(), "O1");
        assert!(manager.is_connected());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_connect_once() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(ConnectionManager::new(FlakyConnector {
            attempts: attempts.clone(),
            failures: 0,
        }));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.ensure_connected().await.map(|_| ()) })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_grpc_connector_missing_file_is_unavailable() {
        let manager = ConnectionManager::new(GrpcConnector::new("/nonexistent/api.config.yaml"));
        let err = manager.ensure_connected().await.err().unwrap();
        assert!(err.to_string().starts_with("Failed to connect to Velociraptor"));
    }
}
