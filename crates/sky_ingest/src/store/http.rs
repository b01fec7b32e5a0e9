use serde_json::json;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::error::{CommitError, StoreError};
use crate::event::{Event, EventId};

use super::{EventStore, Table, TableResolution};

/// Blocking client for the Sky REST API.
#[derive(Debug, Clone)]
pub struct HttpStore {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpStore {
    pub fn new(connection: &ConnectionConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = connection.request_timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: connection.base_url(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, name: &str) -> String {
        table_url(&self.base_url, name)
    }

    fn table_exists(&self, name: &str) -> Result<bool, StoreError> {
        match self.agent.get(&self.table_url(name)).call() {
            Ok(_) => Ok(true),
            Err(ureq::Error::Status(404, _)) => Ok(false),
            Err(err) => Err(store_error(err)),
        }
    }

    fn recreate_table(&self, name: &str) -> Result<(), StoreError> {
        if self.table_exists(name)? {
            info!(table = name, "dropping existing table");
            self.agent
                .delete(&self.table_url(name))
                .call()
                .map_err(store_error)?;
        }
        info!(table = name, "creating table");
        self.agent
            .post(&format!("{}/tables", self.base_url))
            .send_json(json!({ "name": name }))
            .map_err(store_error)?;
        Ok(())
    }
}

impl EventStore for HttpStore {
    type Table = HttpTable;

    fn ping(&self) -> bool {
        match self.agent.get(&format!("{}/ping", self.base_url)).call() {
            Ok(_) => true,
            Err(err) => {
                debug!(error = %err, "ping failed");
                false
            }
        }
    }

    fn resolve_table(
        &self,
        name: &str,
        resolution: TableResolution,
    ) -> Result<Self::Table, StoreError> {
        match resolution {
            TableResolution::RequireExisting => {
                if !self.table_exists(name)? {
                    return Err(StoreError::TableNotFound {
                        name: name.to_string(),
                    });
                }
            }
            TableResolution::Recreate => self.recreate_table(name)?,
        }
        Ok(HttpTable {
            agent: self.agent.clone(),
            name: name.to_string(),
            url: self.table_url(name),
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpTable {
    agent: ureq::Agent,
    name: String,
    url: String,
}

impl HttpTable {
    fn event_url(&self, object_id: &EventId, event: &Event) -> Result<String, CommitError> {
        let timestamp = event
            .timestamp
            .to_rfc3339()
            .map_err(|err| CommitError::Encode(err.to_string()))?;
        Ok(format!(
            "{}/objects/{}/events/{}",
            self.url,
            urlencoding::encode(object_id.as_str()),
            urlencoding::encode(&timestamp)
        ))
    }
}

impl Table for HttpTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn commit_merge(&self, object_id: &EventId, event: &Event) -> Result<(), CommitError> {
        let url = self.event_url(object_id, event)?;
        self.agent
            .request("PATCH", &url)
            .send_json(event)
            .map(|_| ())
            .map_err(commit_error)
    }
}

fn table_url(base_url: &str, name: &str) -> String {
    format!("{base_url}/tables/{}", urlencoding::encode(name))
}

fn response_body(response: ureq::Response) -> String {
    response.into_string().unwrap_or_default()
}

fn store_error(err: ureq::Error) -> StoreError {
    match err {
        ureq::Error::Status(status, response) => StoreError::Http {
            status,
            body: response_body(response),
        },
        ureq::Error::Transport(transport) => StoreError::Transport(transport.to_string()),
    }
}

fn commit_error(err: ureq::Error) -> CommitError {
    match err {
        ureq::Error::Status(status, response) => CommitError::Rejected {
            status,
            body: response_body(response),
        },
        ureq::Error::Transport(transport) => CommitError::Transport(transport.to_string()),
    }
}
