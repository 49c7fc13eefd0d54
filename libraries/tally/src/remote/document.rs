//! A JSON document store (JSONBin-style REST API). The first write creates a document and the server hands back
//! its id; later writes replace that document. There is no push channel.
use chrono::Utc;
use fetch_happen::Client;

use crate::config::BackendKind;
use crate::data_model::{
    DocumentCreated, DocumentEnvelope, DocumentRecord, HistoryLog, SessionIdentity,
};
use crate::remote::{RemoteError, RemoteStore, WriteOutcome};

#[derive(Clone, Debug)]
pub struct DocumentStore {
    api_url: String,
    api_key: Option<String>,
}

impl DocumentStore {
    /// Returns `None` if `api_url` is blank.
    pub fn new(api_url: &str, api_key: Option<String>) -> Option<Self> {
        let api_url = api_url.trim().trim_end_matches('/');
        if api_url.is_empty() {
            return None;
        }
        Some(Self {
            api_url: api_url.to_string(),
            api_key: api_key.filter(|key| !key.is_empty()),
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/b", self.api_url)
    }

    fn document_url(&self, server_id: &str) -> String {
        let server_id = url::form_urlencoded::byte_serialize(server_id.as_bytes()).collect::<String>();
        format!("{}/b/{server_id}", self.api_url)
    }

    async fn read_inner(&self, server_id: &str) -> Result<HistoryLog, RemoteError> {
        let mut request = Client.get(&format!("{}/latest", self.document_url(server_id)));
        if let Some(key) = &self.api_key {
            request = request.header("X-Master-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?;

        if !response.ok() {
            return Err(RemoteError::Status(response.status().to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?;

        let envelope: DocumentEnvelope = serde_json::from_str(&body)?;
        Ok(envelope
            .record
            .map(|record| record.history)
            .unwrap_or_default())
    }

    async fn create(&self, history: &HistoryLog) -> Result<SessionIdentity, RemoteError> {
        let record = DocumentRecord::new(history.clone(), Utc::now());
        let mut request = Client
            .post(&self.collection_url())
            .header("X-Bin-Private", "false");
        if let Some(key) = &self.api_key {
            request = request.header("X-Master-Key", key);
        }

        let response = request
            .json(&record)
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?
            .send()
            .await
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?;

        if !response.ok() {
            return Err(RemoteError::Status(response.status().to_string()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?;

        let created: DocumentCreated = serde_json::from_str(&body)?;
        Ok(SessionIdentity::issued(&created.metadata.id))
    }

    async fn update(&self, server_id: &str, history: &HistoryLog) -> Result<(), RemoteError> {
        let record = DocumentRecord::new(history.clone(), Utc::now());
        let mut request = Client.put(&self.document_url(server_id));
        if let Some(key) = &self.api_key {
            request = request.header("X-Master-Key", key);
        }

        let response = request
            .json(&record)
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?
            .send()
            .await
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?;

        if !response.ok() {
            return Err(RemoteError::Status(response.status().to_string()));
        }

        Ok(())
    }
}

impl RemoteStore for DocumentStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn read(&self, identity: &SessionIdentity) -> HistoryLog {
        // a client-generated identity can't address a document
        let Some(server_id) = identity.server_id() else {
            log::debug!("{identity} was not issued by the document store, nothing to read");
            return HistoryLog::new();
        };

        self.read_inner(server_id)
            .await
            .inspect_err(|e| log::error!("Error loading document {server_id}: {e:?}"))
            .unwrap_or_default()
    }

    async fn write(&self, identity: &SessionIdentity, history: &HistoryLog) -> WriteOutcome {
        match identity.server_id() {
            Some(server_id) => match self.update(server_id, history).await {
                Ok(()) => WriteOutcome::Stored,
                Err(e) => {
                    log::error!("Error updating document {server_id}: {e:?}");
                    WriteOutcome::Failed(e.to_string())
                }
            },
            None => match self.create(history).await {
                Ok(issued) => {
                    log::info!("Created document {issued} for {identity}");
                    WriteOutcome::Created(issued)
                }
                Err(e) => {
                    log::error!("Error creating document: {e:?}");
                    WriteOutcome::Failed(e.to_string())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn urls() {
        let store = DocumentStore::new("https://api.jsonbin.io/v3/", None).unwrap();
        assert_eq!(store.collection_url(), "https://api.jsonbin.io/v3/b");
        assert_eq!(
            store.document_url("65f1c0ffee"),
            "https://api.jsonbin.io/v3/b/65f1c0ffee"
        );
    }

    #[test]
    fn client_identity_reads_nothing_without_a_request() {
        let store = DocumentStore::new("http://invalid.invalid", None).unwrap();
        let identity = SessionIdentity::new("calc_abc_123").unwrap();
        assert!(block_on(store.read(&identity)).is_empty());
    }
}
