//! Velociraptor API wire messages and gRPC client.
//!
//! Only the messages and fields this crate sends or reads are declared.
//! Field numbers follow Velociraptor's `api.proto` / `vql.proto`; unknown
//! fields in server responses are skipped by prost.

/// One named VQL program inside a collector request.
#[derive(Clone, PartialEq, prost::Message)]
pub struct VqlRequest {
    /// Logical name reported back in responses.
    #[prost(string, tag = "1")]
    pub name: String,

    /// VQL text.
    #[prost(string, tag = "2")]
    pub vql: String,
}

/// Arguments for `API/Query`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct VqlCollectorArgs {
    #[prost(message, repeated, tag = "2")]
    pub query: Vec<VqlRequest>,

    /// Maximum rows per response message.
    #[prost(uint64, tag = "4")]
    pub max_row: u64,

    /// Seconds to wait before flushing a partial batch.
    #[prost(uint64, tag = "6")]
    pub max_wait: u64,

    /// Organization the query runs in. Empty means the root org.
    #[prost(string, tag = "28")]
    pub org_id: String,
}

/// One message of the `API/Query` response stream.
#[derive(Clone, PartialEq, prost::Message)]
pub struct VqlResponse {
    /// JSON array of rows.
    #[prost(string, tag = "1")]
    pub response: String,

    #[prost(string, repeated, tag = "2")]
    pub columns: Vec<String>,

    #[prost(uint64, tag = "4")]
    pub timestamp: u64,

    #[prost(uint64, tag = "5")]
    pub query_id: u64,

    #[prost(uint64, tag = "6")]
    pub part: u64,

    #[prost(uint64, tag = "7")]
    pub total_rows: u64,

    /// Diagnostic log line. Set instead of a payload.
    #[prost(string, tag = "9")]
    pub log: String,

    /// Rows as JSON lines.
    #[prost(string, tag = "10")]
    pub jsonl_response: String,
}

/// Request and response message for `API/VFSGetBuffer`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct VfsFileBuffer {
    #[prost(string, tag = "1")]
    pub client_id: String,

    #[prost(uint64, tag = "2")]
    pub offset: u64,

    /// Bytes requested. 0 leaves the amount to the server.
    #[prost(uint64, tag = "3")]
    pub length: u64,

    /// Chunk payload (responses only).
    #[prost(bytes = "vec", tag = "4")]
    pub data: Vec<u8>,

    #[prost(string, tag = "5")]
    pub vfs_path: String,
}

/// Generated-style gRPC client for the `proto.API` service.
pub mod api_client {
    use super::*;
    use tonic::codegen::*;

    /// Velociraptor API client
    #[derive(Debug, Clone)]
    pub struct ApiClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl ApiClient<tonic::transport::Channel> {
        /// Create a new client from a channel
        pub fn new(channel: tonic::transport::Channel) -> Self {
            let inner = tonic::client::Grpc::new(channel);
            Self { inner }
        }
    }

    impl<T> ApiClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError> + std::fmt::Debug,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        /// Run VQL and stream back result batches
        pub async fn query(
            &mut self,
            request: impl tonic::IntoRequest<VqlCollectorArgs>,
        ) -> std::result::Result<tonic::Response<tonic::codec::Streaming<VqlResponse>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(tonic::Code::Unknown, format!("Service not ready: {:?}", e))
            })?;

            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.API/Query");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("proto.API", "Query"));
            self.inner.server_streaming(req, path, codec).await
        }

        /// Read a byte range from a client's VFS
        pub async fn vfs_get_buffer(
            &mut self,
            request: impl tonic::IntoRequest<VfsFileBuffer>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<VfsFileBuffer>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(tonic::Code::Unknown, format!("Service not ready: {:?}", e))
            })?;

            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/proto.API/VFSGetBuffer");
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new("proto.API", "VFSGetBuffer"));
            self.inner.server_streaming(req, path, codec).await
        }
    }
}
