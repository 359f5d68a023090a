//! Artifact definitions and collections.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use crate::client::Client;
use crate::error::Result;
use crate::poller::{CollectionJob, CollectionPoller, flow_results_statement};
use crate::statement::{Select, Statement, any_of, call, matches, quote, raw_block};
use crate::tools::rows_output;

/// Inline artifact definition as a VQL `dict(...)` expression.
pub(crate) fn artifact_doc(
    name: &str,
    description: &str,
    artifact_type: Option<&str>,
    vql: &str,
) -> String {
    let query = call("dict", [("VQL", raw_block(vql))]);
    let source = format!("dict(Queries=[{}])", query);
    let mut fields = vec![
        ("Name", quote(name)),
        ("Description", quote(description)),
    ];
    if let Some(t) = artifact_type {
        fields.push(("Type", quote(t)));
    }
    fields.push(("Sources", format!("[{}]", source)));
    call("dict", fields)
}

pub(crate) fn list_statement(search: Option<&str>, limit: u64) -> Statement {
    let mut select = Select::new("name, description, type", "artifact_definitions()");
    if let Some(search) = search.filter(|s| !s.is_empty()) {
        select = select.filter(any_of([
            matches("name", search),
            matches("description", search),
        ]));
    }
    select.limit(limit).build()
}

pub(crate) fn definition_statement(name: &str) -> Statement {
    Select::star(call("artifact_definitions", [("names", quote(name))])).build()
}

pub(crate) fn upload_statement(
    name: &str,
    vql: &str,
    description: &str,
    artifact_type: &str,
) -> Statement {
    let doc = artifact_doc(name, description, Some(artifact_type), vql);
    Statement::new(format!(
        "SELECT {} AS Uploaded FROM scope()",
        call("artifact_set", [("artifact", doc)])
    ))
}

/// Render a JSON parameter value as the string VQL artifacts expect.
pub(crate) fn parameter_text(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// List artifact definitions, optionally filtered by a name/description regex.
pub async fn list_artifacts(client: &Client, search: Option<&str>, limit: u64) -> Result<Json> {
    let rows = client.query(list_statement(search, limit)).await?;
    rows_output("artifacts", rows)
}

/// Schedule an artifact collection on a client and wait for its first rows.
///
/// Returns `flow_id` (null when the submission produced none), `status`
/// (`succeeded`, `timed_out` or `failed`) and `results`.
pub async fn collect_artifact(
    client: &Client,
    client_id: &str,
    artifact: &str,
    params: Option<&BTreeMap<String, Json>>,
) -> Result<Json> {
    let mut job = CollectionJob::new(client_id, artifact);
    for (name, value) in params.into_iter().flatten() {
        job = job.with_parameter(name.clone(), parameter_text(value));
    }

    let outcome = CollectionPoller::new(client).run(&job).await?;

    let mut out = Map::new();
    out.insert(
        "flow_id".to_string(),
        outcome.flow_id().map_or(Json::Null, |id| Json::String(id.to_string())),
    );
    out.insert("status".to_string(), Json::String(outcome.status().to_string()));
    out.insert("results".to_string(), serde_json::to_value(outcome.records())?);
    Ok(Json::Object(out))
}

/// Read whatever rows a flow has produced so far.
pub async fn get_flow_results(
    client: &Client,
    client_id: &str,
    flow_id: &str,
    artifact: &str,
) -> Result<Json> {
    let rows = client
        .query(flow_results_statement(client_id, flow_id, artifact))
        .await?;
    rows_output("results", rows)
}

/// Create or replace a custom artifact with a single query source.
pub async fn upload_artifact(
    client: &Client,
    name: &str,
    vql: &str,
    description: &str,
    artifact_type: &str,
) -> Result<Json> {
    let rows = client
        .query(upload_statement(name, vql, description, artifact_type))
        .await?;
    rows_output("result", rows)
}

/// Fetch one artifact definition.
pub async fn get_artifact_definition(client: &Client, name: &str) -> Result<Json> {
    let rows = client.query(definition_statement(name)).await?;
    rows_output("artifact", rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_statement_search_is_escaped() {
        assert_eq!(
            list_statement(Some("Windows'"), 50).text(),
            "SELECT name, description, type FROM artifact_definitions() \
             WHERE (name =~ 'Windows''' OR description =~ 'Windows''') LIMIT 50"
        );
        assert_eq!(
            list_statement(None, 0).text(),
            "SELECT name, description, type FROM artifact_definitions()"
        );
    }

    #[test]
    fn test_upload_statement() {
        let stmt = upload_statement("Custom.Test", "SELECT * FROM info()", "it's mine", "CLIENT");
        assert_eq!(
            stmt.text(),
            "SELECT artifact_set(artifact=dict(Name='Custom.Test', Description='it''s mine', \
             Type='CLIENT', Sources=[dict(Queries=[dict(VQL='''SELECT * FROM info()''')])])) \
             AS Uploaded FROM scope()"
        );
    }

    #[test]
    fn test_upload_statement_cannot_close_query_block() {
        let stmt = upload_statement("X", "SELECT ''') AS y FROM z", "", "CLIENT");
        let text = stmt.text();
        let start = text.find("VQL='''").unwrap() + "VQL='''".len();
        let body_end = text[start..].find("'''").unwrap() + start;
        assert_eq!(&text[body_end..], "''')])])) AS Uploaded FROM scope()");
    }

    #[test]
    fn test_definition_statement() {
        assert_eq!(
            definition_statement("Generic.Client.Info").text(),
            "SELECT * FROM artifact_definitions(names='Generic.Client.Info')"
        );
    }

    #[test]
    fn test_parameter_text() {
        assert_eq!(parameter_text(&Json::String("x".into())), "x");
        assert_eq!(parameter_text(&serde_json::json!(3)), "3");
        assert_eq!(parameter_text(&serde_json::json!(true)), "true");
        assert_eq!(parameter_text(&Json::Null), "");
    }
}
