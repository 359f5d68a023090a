//! Server health, client activity and alerts.

use serde_json::Value as Json;

use crate::client::Client;
use crate::error::Result;
use crate::statement::{Select, Statement, call, quote};
use crate::tools::rows_output;

/// Artifact alerts are raised under.
const ALERT_ARTIFACT: &str = "Custom.Alert";

pub(crate) fn activity_statement(source: &str, limit: u64) -> Statement {
    Select::star(source)
        .order_by("Timestamp DESC")
        .limit(limit)
        .build()
}

pub(crate) fn create_alert_statement(
    title: &str,
    message: &str,
    client_id: Option<&str>,
    severity: &str,
) -> Statement {
    let mut args = vec![("artifact", quote(ALERT_ARTIFACT))];
    if let Some(client_id) = client_id.filter(|c| !c.is_empty()) {
        args.push(("client_id", quote(client_id)));
    }
    args.push(("title", quote(title)));
    args.push(("message", quote(message)));
    args.push(("severity", quote(severity)));
    Statement::new(format!(
        "SELECT {} AS AlertId FROM scope()",
        call("create_alert", args)
    ))
}

/// Server statistics.
pub async fn get_server_stats(client: &Client) -> Result<Json> {
    let rows = client.query(Select::star("server_stats()").build()).await?;
    rows_output("stats", rows)
}

/// Recent client activity, newest first.
pub async fn get_client_activity(client: &Client, limit: u64) -> Result<Json> {
    let rows = client
        .query(activity_statement("client_activity()", limit))
        .await?;
    rows_output("activity", rows)
}

/// Recent alerts, newest first.
pub async fn list_alerts(client: &Client, limit: u64) -> Result<Json> {
    let rows = client.query(activity_statement("alerts()", limit)).await?;
    rows_output("alerts", rows)
}

/// Raise an alert, optionally attributed to a client.
pub async fn create_alert(
    client: &Client,
    title: &str,
    message: &str,
    client_id: Option<&str>,
    severity: &str,
) -> Result<Json> {
    let rows = client
        .query(create_alert_statement(title, message, client_id, severity))
        .await?;
    rows_output("result", rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_statement() {
        assert_eq!(
            activity_statement("alerts()", 200).text(),
            "SELECT * FROM alerts() ORDER BY Timestamp DESC LIMIT 200"
        );
    }

    #[test]
    fn test_create_alert_statement() {
        assert_eq!(
            create_alert_statement("Disk \"full\"", "it's 99%", Some("C.1"), "HIGH").text(),
            "SELECT create_alert(artifact='Custom.Alert', client_id='C.1', title='Disk \"full\"', \
             message='it''s 99%', severity='HIGH') AS AlertId FROM scope()"
        );
        let text = create_alert_statement("t", "m", None, "INFO").text().to_string();
        assert!(!text.contains("client_id"));
    }
}
