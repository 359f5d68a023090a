//! Named operations exposed to callers.
//!
//! Each operation builds one statement (or, for `collect_artifact`, runs the
//! collection poller), executes it, and wraps the rows in a JSON object under
//! a single named field. [`ToolCall`] decodes `{"tool": ..., "arguments": ...}`
//! requests so argument validation happens before anything touches the
//! network.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use crate::client::Client;
use crate::error::{Error, Result};
use crate::statement::Statement;
use crate::types::Record;

pub mod artifacts;
pub mod clients;
pub mod files;
pub mod hunts;
pub mod monitoring;

/// Wrap rows in `{field: [...]}`.
pub(crate) fn rows_output(field: &str, rows: Vec<Record>) -> Result<Json> {
    let mut out = Map::new();
    out.insert(field.to_string(), serde_json::to_value(rows)?);
    Ok(Json::Object(out))
}

/// Execute arbitrary VQL.
pub async fn query_vql(client: &Client, vql: &str) -> Result<Json> {
    let rows = client.query(Statement::new(vql)).await?;
    rows_output("rows", rows)
}

fn default_limit() -> u64 {
    200
}

fn default_hunt_limit() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_artifact_type() -> String {
    "CLIENT".to_string()
}

fn default_severity() -> String {
    "INFO".to_string()
}

/// A decoded operation request.
///
/// Numeric arguments are unsigned integers: negative, fractional or string
/// values fail to decode. A limit of 0 means "no limit".
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    QueryVql {
        vql: String,
    },
    ListClients {
        #[serde(default = "default_limit")]
        limit: u64,
        #[serde(default)]
        offset: u64,
    },
    GetClientInfo {
        client_id: String,
    },
    SearchClients {
        hostname: Option<String>,
        label: Option<String>,
        #[serde(default = "default_limit")]
        limit: u64,
        #[serde(default)]
        offset: u64,
    },
    ListHunts {
        state: Option<String>,
        #[serde(default = "default_hunt_limit")]
        limit: u64,
    },
    GetHuntDetails {
        hunt_id: String,
    },
    CreateHunt {
        artifact: String,
        query: String,
        #[serde(default)]
        description: String,
        #[serde(default = "default_true")]
        start_immediately: bool,
    },
    StopHunt {
        hunt_id: String,
    },
    GetHuntResults {
        hunt_id: String,
        client_id: Option<String>,
        #[serde(default = "default_limit")]
        limit: u64,
    },
    ListArtifacts {
        search: Option<String>,
        #[serde(default = "default_limit")]
        limit: u64,
    },
    CollectArtifact {
        client_id: String,
        artifact: String,
        params: Option<BTreeMap<String, Json>>,
    },
    GetFlowResults {
        client_id: String,
        flow_id: String,
        artifact: String,
    },
    UploadArtifact {
        name: String,
        vql: String,
        #[serde(default)]
        description: String,
        #[serde(default = "default_artifact_type", rename = "type")]
        artifact_type: String,
    },
    GetArtifactDefinition {
        name: String,
    },
    ListDirectory {
        client_id: String,
        path: String,
    },
    GetFileInfo {
        client_id: String,
        path: String,
    },
    DownloadFile {
        client_id: String,
        path: String,
        #[serde(default)]
        offset: u64,
        #[serde(default)]
        length: u64,
    },
    GetServerStats {},
    GetClientActivity {
        #[serde(default = "default_limit")]
        limit: u64,
    },
    ListAlerts {
        #[serde(default = "default_limit")]
        limit: u64,
    },
    CreateAlert {
        title: String,
        message: String,
        client_id: Option<String>,
        #[serde(default = "default_severity")]
        severity: String,
    },
}

impl ToolCall {
    /// Every operation name, in declaration order.
    pub const NAMES: &'static [&'static str] = &[
        "query_vql",
        "list_clients",
        "get_client_info",
        "search_clients",
        "list_hunts",
        "get_hunt_details",
        "create_hunt",
        "stop_hunt",
        "get_hunt_results",
        "list_artifacts",
        "collect_artifact",
        "get_flow_results",
        "upload_artifact",
        "get_artifact_definition",
        "list_directory",
        "get_file_info",
        "download_file",
        "get_server_stats",
        "get_client_activity",
        "list_alerts",
        "create_alert",
    ];

    /// Decode an operation from its name and JSON arguments.
    ///
    /// `null` arguments are treated as `{}`. Unknown names, missing fields
    /// and mistyped values are [`Error::InvalidArgument`].
    pub fn parse(name: &str, arguments: Json) -> Result<Self> {
        let arguments = match arguments {
            Json::Null => Json::Object(Map::new()),
            other => other,
        };
        let mut request = Map::new();
        request.insert("tool".to_string(), Json::from(name));
        request.insert("arguments".to_string(), arguments);
        serde_json::from_value(Json::Object(request))
            .map_err(|e| Error::InvalidArgument(format!("{}: {}", name, e)))
    }

    /// The operation's name.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::QueryVql { .. } => "query_vql",
            ToolCall::ListClients { .. } => "list_clients",
            ToolCall::GetClientInfo { .. } => "get_client_info",
            ToolCall::SearchClients { .. } => "search_clients",
            ToolCall::ListHunts { .. } => "list_hunts",
            ToolCall::GetHuntDetails { .. } => "get_hunt_details",
            ToolCall::CreateHunt { .. } => "create_hunt",
            ToolCall::StopHunt { .. } => "stop_hunt",
            ToolCall::GetHuntResults { .. } => "get_hunt_results",
            ToolCall::ListArtifacts { .. } => "list_artifacts",
            ToolCall::CollectArtifact { .. } => "collect_artifact",
            ToolCall::GetFlowResults { .. } => "get_flow_results",
            ToolCall::UploadArtifact { .. } => "upload_artifact",
            ToolCall::GetArtifactDefinition { .. } => "get_artifact_definition",
            ToolCall::ListDirectory { .. } => "list_directory",
            ToolCall::GetFileInfo { .. } => "get_file_info",
            ToolCall::DownloadFile { .. } => "download_file",
            ToolCall::GetServerStats {} => "get_server_stats",
            ToolCall::GetClientActivity { .. } => "get_client_activity",
            ToolCall::ListAlerts { .. } => "list_alerts",
            ToolCall::CreateAlert { .. } => "create_alert",
        }
    }

    /// Run the operation.
    pub async fn call(&self, client: &Client) -> Result<Json> {
        match self {
            ToolCall::QueryVql { vql } => query_vql(client, vql).await,
            ToolCall::ListClients { limit, offset } => {
                clients::list_clients(client, *limit, *offset).await
            }
            ToolCall::GetClientInfo { client_id } => {
                clients::get_client_info(client, client_id).await
            }
            ToolCall::SearchClients {
                hostname,
                label,
                limit,
                offset,
            } => {
                clients::search_clients(
                    client,
                    hostname.as_deref(),
                    label.as_deref(),
                    *limit,
                    *offset,
                )
                .await
            }
            ToolCall::ListHunts { state, limit } => {
                hunts::list_hunts(client, state.as_deref(), *limit).await
            }
            ToolCall::GetHuntDetails { hunt_id } => hunts::get_hunt_details(client, hunt_id).await,
            ToolCall::CreateHunt {
                artifact,
                query,
                description,
                start_immediately,
            } => {
                hunts::create_hunt(client, artifact, query, description, *start_immediately).await
            }
            ToolCall::StopHunt { hunt_id } => hunts::stop_hunt(client, hunt_id).await,
            ToolCall::GetHuntResults {
                hunt_id,
                client_id,
                limit,
            } => hunts::get_hunt_results(client, hunt_id, client_id.as_deref(), *limit).await,
            ToolCall::ListArtifacts { search, limit } => {
                artifacts::list_artifacts(client, search.as_deref(), *limit).await
            }
            ToolCall::CollectArtifact {
                client_id,
                artifact,
                params,
            } => artifacts::collect_artifact(client, client_id, artifact, params.as_ref()).await,
            ToolCall::GetFlowResults {
                client_id,
                flow_id,
                artifact,
            } => artifacts::get_flow_results(client, client_id, flow_id, artifact).await,
            ToolCall::UploadArtifact {
                name,
                vql,
                description,
                artifact_type,
            } => artifacts::upload_artifact(client, name, vql, description, artifact_type).await,
            ToolCall::GetArtifactDefinition { name } => {
                artifacts::get_artifact_definition(client, name).await
            }
            ToolCall::ListDirectory { client_id, path } => {
                files::list_directory(client, client_id, path).await
            }
            ToolCall::GetFileInfo { client_id, path } => {
                files::get_file_info(client, client_id, path).await
            }
            ToolCall::DownloadFile {
                client_id,
                path,
                offset,
                length,
            } => files::download_file(client, client_id, path, *offset, *length).await,
            ToolCall::GetServerStats {} => monitoring::get_server_stats(client).await,
            ToolCall::GetClientActivity { limit } => {
                monitoring::get_client_activity(client, *limit).await
            }
            ToolCall::ListAlerts { limit } => monitoring::list_alerts(client, *limit).await,
            ToolCall::CreateAlert {
                title,
                message,
                client_id,
                severity,
            } => {
                monitoring::create_alert(client, title, message, client_id.as_deref(), severity)
                    .await
            }
        }
    }
}

/// Decode and run a named operation.
pub async fn dispatch(client: &Client, name: &str, arguments: Json) -> Result<Json> {
    let call = ToolCall::parse(name, arguments)?;
    call.call(client).await
}
