//! Hunts: collections scheduled across many clients.

use serde_json::Value as Json;

use crate::client::Client;
use crate::error::Result;
use crate::statement::{Select, Statement, call, equals, quote, string_list};
use crate::tools::artifacts::artifact_doc;
use crate::tools::rows_output;

pub(crate) fn list_statement(state: Option<&str>, limit: u64) -> Statement {
    let mut select = Select::star("hunts()");
    if let Some(state) = state.filter(|s| !s.is_empty()) {
        select = select.filter(equals("State", state));
    }
    select.order_by("Created DESC").limit(limit).build()
}

pub(crate) fn details_statement(hunt_id: &str) -> Statement {
    Select::star(call("hunt_details", [("hunt_id", quote(hunt_id))])).build()
}

pub(crate) fn create_statement(
    artifact: &str,
    query: &str,
    description: &str,
    start_immediately: bool,
) -> Statement {
    let hunt = call(
        "hunt",
        [
            ("description", quote(description)),
            ("artifacts", string_list([artifact])),
            ("start_immediately", start_immediately.to_string()),
            ("artifact_doc", artifact_doc(artifact, description, None, query)),
        ],
    );
    Statement::new(format!("SELECT {} AS Hunt FROM scope()", hunt))
}

pub(crate) fn stop_statement(hunt_id: &str) -> Statement {
    Statement::new(format!(
        "SELECT {} AS Deleted FROM scope()",
        call("hunt_delete", [("hunt_id", quote(hunt_id))])
    ))
}

pub(crate) fn results_statement(hunt_id: &str, client_id: Option<&str>, limit: u64) -> Statement {
    let mut select = Select::star(call("hunt_results", [("hunt_id", quote(hunt_id))]));
    if let Some(client_id) = client_id.filter(|c| !c.is_empty()) {
        select = select.filter(equals("ClientId", client_id));
    }
    select.limit(limit).build()
}

/// List hunts, newest first.
pub async fn list_hunts(client: &Client, state: Option<&str>, limit: u64) -> Result<Json> {
    let rows = client.query(list_statement(state, limit)).await?;
    rows_output("hunts", rows)
}

/// Details of one hunt.
pub async fn get_hunt_details(client: &Client, hunt_id: &str) -> Result<Json> {
    let rows = client.query(details_statement(hunt_id)).await?;
    rows_output("hunt", rows)
}

/// Create a hunt running `query` as an inline artifact named `artifact`.
pub async fn create_hunt(
    client: &Client,
    artifact: &str,
    query: &str,
    description: &str,
    start_immediately: bool,
) -> Result<Json> {
    let rows = client
        .query(create_statement(artifact, query, description, start_immediately))
        .await?;
    rows_output("result", rows)
}

/// Stop a hunt. The server has no stop primitive, so the hunt is deleted.
pub async fn stop_hunt(client: &Client, hunt_id: &str) -> Result<Json> {
    let rows = client.query(stop_statement(hunt_id)).await?;
    rows_output("result", rows)
}

/// Rows uploaded to a hunt, optionally for one client only.
pub async fn get_hunt_results(
    client: &Client,
    hunt_id: &str,
    client_id: Option<&str>,
    limit: u64,
) -> Result<Json> {
    let rows = client
        .query(results_statement(hunt_id, client_id, limit))
        .await?;
    rows_output("results", rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_statement() {
        assert_eq!(
            list_statement(Some("RUNNING"), 100).text(),
            "SELECT * FROM hunts() WHERE State = 'RUNNING' ORDER BY Created DESC LIMIT 100"
        );
        assert_eq!(
            list_statement(None, 0).text(),
            "SELECT * FROM hunts() ORDER BY Created DESC"
        );
    }

    #[test]
    fn test_create_statement_escapes_all_fields() {
        let text = create_statement("Custom.H'unt", "SELECT 'x' FROM info()", "Bob's hunt", false)
            .text()
            .to_string();
        assert!(text.starts_with("SELECT hunt(description='Bob''s hunt', artifacts=['Custom.H''unt'], start_immediately=false, "));
        assert!(text.contains("Name='Custom.H''unt'"));
        assert!(text.contains("VQL='''SELECT ''x'' FROM info()'''"));
        assert!(text.ends_with(") AS Hunt FROM scope()"));
    }

    #[test]
    fn test_stop_statement() {
        assert_eq!(
            stop_statement("H.1").text(),
            "SELECT hunt_delete(hunt_id='H.1') AS Deleted FROM scope()"
        );
    }

    #[test]
    fn test_results_statement() {
        assert_eq!(
            results_statement("H.1", Some("C.2"), 200).text(),
            "SELECT * FROM hunt_results(hunt_id='H.1') WHERE ClientId = 'C.2' LIMIT 200"
        );
        assert_eq!(details_statement("H.'").text(), "SELECT * FROM hunt_details(hunt_id='H.''')");
    }
}
