//! Artifact collection: submit a flow, then poll for its results.
//!
//! `collect_client()` returns as soon as the flow is scheduled, long before
//! the endpoint has sent anything back. [`CollectionPoller`] submits the
//! collection, pulls the flow id out of the reply, and re-queries the flow's
//! results on a fixed interval until rows appear or the attempt budget runs
//! out.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::Result;
use crate::statement::{Statement, call, literal_map, quote, string_list};
use crate::types::{FieldLookup, Record};

/// Interval and attempt budget for result polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    /// Sleep between two result queries.
    pub interval: Duration,
    /// Result queries to run before giving up. Values below 1 act as 1.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 15,
        }
    }
}

/// A collection to schedule on one client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionJob {
    /// Target client, e.g. `C.1234abcd`.
    pub client_id: String,
    /// Artifact to collect.
    pub artifact: String,
    /// Artifact parameters.
    pub parameters: BTreeMap<String, String>,
}

impl CollectionJob {
    /// Create a job with no parameters.
    pub fn new(client_id: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            artifact: artifact.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add an artifact parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Statement scheduling the collection.
    ///
    /// Fails if a parameter name is not a plain identifier.
    pub fn submit_statement(&self) -> Result<Statement> {
        let mut args = vec![
            ("client_id", quote(&self.client_id)),
            ("artifacts", string_list([&self.artifact])),
        ];
        if !self.parameters.is_empty() {
            args.push(("env", literal_map(&self.parameters)?));
        }
        let collect = call("collect_client", args);
        Ok(Statement::new(format!(
            "SELECT {} AS Flow FROM scope()",
            collect
        )))
    }

    /// Statement reading the rows a flow has uploaded so far.
    pub fn results_statement(&self, flow_id: &str) -> Statement {
        flow_results_statement(&self.client_id, flow_id, &self.artifact)
    }
}

/// `SELECT * FROM source(...)` for one artifact of one flow.
pub fn flow_results_statement(client_id: &str, flow_id: &str, artifact: &str) -> Statement {
    let source = call(
        "source",
        [
            ("client_id", quote(client_id)),
            ("flow_id", quote(flow_id)),
            ("artifact", quote(artifact)),
        ],
    );
    Statement::new(format!("SELECT * FROM {}", source))
}

/// How a collection ended.
#[derive(Clone, Debug, PartialEq)]
pub enum CollectionOutcome {
    /// A poll returned rows.
    Succeeded {
        flow_id: String,
        records: Vec<Record>,
    },
    /// Every poll came back empty. Polling can be resumed with the flow id.
    TimedOut { flow_id: String },
    /// The submission reply had no recognisable flow id.
    Failed,
}

impl CollectionOutcome {
    /// Flow id, when one was obtained.
    pub fn flow_id(&self) -> Option<&str> {
        match self {
            CollectionOutcome::Succeeded { flow_id, .. }
            | CollectionOutcome::TimedOut { flow_id } => Some(flow_id),
            CollectionOutcome::Failed => None,
        }
    }

    /// Rows collected. Empty unless the collection succeeded.
    pub fn records(&self) -> &[Record] {
        match self {
            CollectionOutcome::Succeeded { records, .. } => records,
            _ => &[],
        }
    }

    /// Short status name.
    pub fn status(&self) -> &'static str {
        match self {
            CollectionOutcome::Succeeded { .. } => "succeeded",
            CollectionOutcome::TimedOut { .. } => "timed_out",
            CollectionOutcome::Failed => "failed",
        }
    }
}

enum PollState {
    Submitting,
    Waiting { flow_id: String, attempt: u32 },
    Finished(CollectionOutcome),
}

/// Runs the submit-then-poll state machine for one [`CollectionJob`].
///
/// Waiting is done with `tokio::time::sleep` and is not cancellable from
/// inside; drop the future (e.g. under `tokio::time::timeout`) to abort.
#[derive(Clone, Debug)]
pub struct CollectionPoller<'a> {
    client: &'a Client,
    policy: PollPolicy,
    lookup: FieldLookup,
}

impl<'a> CollectionPoller<'a> {
    /// Create a poller with the default policy and flow-id lookup.
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            policy: PollPolicy::default(),
            lookup: FieldLookup::flow_id(),
        }
    }

    /// Override the polling policy.
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Override the field names searched for the flow id.
    pub fn with_lookup(mut self, lookup: FieldLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Submit `job` and wait for its first rows.
    ///
    /// Transport and decode errors from either phase are returned as `Err`;
    /// an exhausted budget and a missing flow id are ordinary outcomes.
    pub async fn run(&self, job: &CollectionJob) -> Result<CollectionOutcome> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut state = PollState::Submitting;

        loop {
            state = match state {
                PollState::Submitting => {
                    let submitted = self.client.query(job.submit_statement()?).await?;
                    match submitted.first().and_then(|r| self.lookup.find_string(r)) {
                        Some(flow_id) => {
                            debug!(flow_id = %flow_id, client_id = %job.client_id, "collection scheduled");
                            PollState::Waiting {
                                flow_id,
                                attempt: 1,
                            }
                        }
                        None => {
                            warn!(
                                client_id = %job.client_id,
                                artifact = %job.artifact,
                                rows = submitted.len(),
                                "no flow id in collect_client() result"
                            );
                            PollState::Finished(CollectionOutcome::Failed)
                        }
                    }
                }
                PollState::Waiting { flow_id, attempt } => {
                    let records = self.client.query(job.results_statement(&flow_id)).await?;
                    if !records.is_empty() {
                        debug!(flow_id = %flow_id, attempt, rows = records.len(), "flow results ready");
                        PollState::Finished(CollectionOutcome::Succeeded { flow_id, records })
                    } else if attempt >= max_attempts {
                        warn!(flow_id = %flow_id, attempts = attempt, "no flow results before timeout");
                        PollState::Finished(CollectionOutcome::TimedOut { flow_id })
                    } else {
                        tokio::time::sleep(self.policy.interval).await;
                        PollState::Waiting {
                            flow_id,
                            attempt: attempt + 1,
                        }
                    }
                }
                PollState::Finished(outcome) => return Ok(outcome),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_statement_without_parameters() {
        let job = CollectionJob::new("C.1", "Generic.Client.Info");
        assert_eq!(
            job.submit_statement().unwrap().text(),
            "SELECT collect_client(client_id='C.1', artifacts=['Generic.Client.Info']) \
             AS Flow FROM scope()"
        );
    }

    #[test]
    fn test_submit_statement_escapes_everything() {
        let job = CollectionJob::new("C.1' OR '1", "Windows.Search'")
            .with_parameter("Glob", "C:/Users/o'brien/**");
        let text = job.submit_statement().unwrap().text().to_string();
        assert!(text.contains("client_id='C.1'' OR ''1'"));
        assert!(text.contains("artifacts=['Windows.Search''']"));
        assert!(text.contains("env=dict(Glob='C:/Users/o''brien/**')"));
    }

    #[test]
    fn test_submit_statement_rejects_bad_parameter_name() {
        let job = CollectionJob::new("C.1", "A").with_parameter("x') FROM y", "v");
        assert!(job.submit_statement().unwrap_err().is_caller_error());
    }

    #[test]
    fn test_results_statement() {
        let job = CollectionJob::new("C.1", "Generic.Client.Info");
        assert_eq!(
            job.results_statement("F.ABC").text(),
            "SELECT * FROM source(client_id='C.1', flow_id='F.ABC', artifact='Generic.Client.Info')"
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let timed_out = CollectionOutcome::TimedOut {
            flow_id: "F.1".to_string(),
        };
        assert_eq!(timed_out.flow_id(), Some("F.1"));
        assert!(timed_out.records().is_empty());
        assert_eq!(timed_out.status(), "timed_out");
        assert_eq!(CollectionOutcome::Failed.flow_id(), None);
    }

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 15);
    }
}
