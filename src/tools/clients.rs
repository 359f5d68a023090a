//! Enrolled client lookups.

use serde_json::Value as Json;

use crate::client::Client;
use crate::error::Result;
use crate::statement::{Select, Statement, call, matches, quote};
use crate::tools::rows_output;

pub(crate) fn list_statement(limit: u64, offset: u64) -> Statement {
    Select::star("clients()").limit(limit).offset(offset).build()
}

pub(crate) fn info_statement(client_id: &str) -> Statement {
    Select::star(call("client_info", [("client_id", quote(client_id))])).build()
}

pub(crate) fn search_statement(
    hostname: Option<&str>,
    label: Option<&str>,
    limit: u64,
    offset: u64,
) -> Statement {
    let mut select = Select::star("clients()");
    if let Some(hostname) = hostname.filter(|h| !h.is_empty()) {
        select = select.filter(matches("Hostname", hostname));
    }
    if let Some(label) = label.filter(|l| !l.is_empty()) {
        select = select.filter(matches("Labels", label));
    }
    select.limit(limit).offset(offset).build()
}

/// List enrolled clients.
pub async fn list_clients(client: &Client, limit: u64, offset: u64) -> Result<Json> {
    let rows = client.query(list_statement(limit, offset)).await?;
    rows_output("clients", rows)
}

/// Detailed info for one client.
pub async fn get_client_info(client: &Client, client_id: &str) -> Result<Json> {
    let rows = client.query(info_statement(client_id)).await?;
    rows_output("client", rows)
}

/// Search clients by hostname and/or label regex.
pub async fn search_clients(
    client: &Client,
    hostname: Option<&str>,
    label: Option<&str>,
    limit: u64,
    offset: u64,
) -> Result<Json> {
    let rows = client
        .query(search_statement(hostname, label, limit, offset))
        .await?;
    rows_output("clients", rows)
}
