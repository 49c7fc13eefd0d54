//! A realtime database reached over its REST interface: one JSON record per identity at `history/<identity>`.
//! Writes replace the record. In the browser, changes are streamed back with server-sent events.
use chrono::Utc;
use fetch_happen::Client;

use crate::config::BackendKind;
use crate::data_model::{HistoryLog, RealtimeRecord, SessionIdentity};
use crate::remote::{ChangeCallback, RemoteError, RemoteStore, Subscription, WriteOutcome};

#[derive(Clone, Debug)]
pub struct RealtimeStore {
    database_url: String,
    auth_token: Option<String>,
}

impl RealtimeStore {
    /// Returns `None` if `database_url` is blank.
    pub fn new(database_url: &str, auth_token: Option<String>) -> Option<Self> {
        let database_url = database_url.trim().trim_end_matches('/');
        if database_url.is_empty() {
            return None;
        }
        Some(Self {
            database_url: database_url.to_string(),
            auth_token: auth_token.filter(|token| !token.is_empty()),
        })
    }

    pub(crate) fn record_url(&self, identity: &SessionIdentity) -> String {
        let path = url::form_urlencoded::byte_serialize(identity.as_str().as_bytes())
            .collect::<String>();
        let url = format!("{}/history/{path}.json", self.database_url);
        match &self.auth_token {
            Some(token) => format!(
                "{url}?{}",
                url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("auth", token)
                    .finish()
            ),
            None => url,
        }
    }

    async fn read_inner(&self, identity: &SessionIdentity) -> Result<HistoryLog, RemoteError> {
        let response = Client
            .get(&self.record_url(identity))
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

        // a missing record comes back as `null`
        let record: Option<RealtimeRecord> = serde_json::from_str(&body)?;
        Ok(record.map(|record| record.history).unwrap_or_default())
    }

    async fn write_inner(
        &self,
        identity: &SessionIdentity,
        history: &HistoryLog,
    ) -> Result<(), RemoteError> {
        let record = RealtimeRecord::new(history.clone(), Utc::now());
        let response = Client
            .put(&self.record_url(identity))
            .json(&record)
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?
            .send()
            .await
            .map_err(|e| RemoteError::Request(format!("{e:?}")))?;

        if !response.ok() {
            let status = response.status().to_string();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Realtime store rejected write: {status} - {body}");
            return Err(RemoteError::Status(status));
        }

        Ok(())
    }
}

impl RemoteStore for RealtimeStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Realtime
    }

    async fn read(&self, identity: &SessionIdentity) -> HistoryLog {
        self.read_inner(identity)
            .await
            .inspect_err(|e| log::error!("Error loading history for {identity}: {e:?}"))
            .unwrap_or_default()
    }

    async fn write(&self, identity: &SessionIdentity, history: &HistoryLog) -> WriteOutcome {
        match self.write_inner(identity, history).await {
            Ok(()) => {
                log::info!("Saved {} entries for {identity}", history.len());
                WriteOutcome::Stored
            }
            Err(e) => {
                log::error!("Error saving history for {identity}: {e:?}");
                WriteOutcome::Failed(e.to_string())
            }
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn watch(&self, identity: &SessionIdentity, on_change: ChangeCallback) -> Option<Subscription> {
        event_stream::subscribe(self.clone(), identity.clone(), on_change)
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn watch(&self, identity: &SessionIdentity, on_change: ChangeCallback) -> Option<Subscription> {
        let _ = on_change;
        log::warn!("Live updates for {identity} need a browser event stream, not watching");
        None
    }
}

#[cfg(target_arch = "wasm32")]
mod event_stream {
    use std::rc::Rc;

    use wasm_bindgen::{JsCast, closure::Closure};
    use web_sys::{EventSource, MessageEvent};

    use super::RealtimeStore;
    use crate::data_model::{SessionIdentity, StreamChange, parse_stream_event};
    use crate::remote::{ChangeCallback, RemoteStore, Subscription};

    const EVENTS: [&str; 2] = ["put", "patch"];

    pub(super) fn subscribe(
        store: RealtimeStore,
        identity: SessionIdentity,
        on_change: ChangeCallback,
    ) -> Option<Subscription> {
        let source = EventSource::new(&store.record_url(&identity))
            .inspect_err(|e| log::error!("Failed to open event stream for {identity}: {e:?}"))
            .ok()?;

        let mut handlers = Vec::new();
        for event in EVENTS {
            let store = store.clone();
            let identity = identity.clone();
            let on_change = Rc::clone(&on_change);
            let handler = Closure::<dyn FnMut(MessageEvent)>::new(move |message: MessageEvent| {
                let Some(data) = message.data().as_string() else {
                    return;
                };
                match parse_stream_event(event, &data) {
                    Ok(StreamChange::Replaced(history)) => on_change(history),
                    Ok(StreamChange::Refetch) => {
                        let store = store.clone();
                        let identity = identity.clone();
                        let on_change = Rc::clone(&on_change);
                        wasm_bindgen_futures::spawn_local(async move {
                            on_change(store.read(&identity).await);
                        });
                    }
                    Ok(StreamChange::Removed) | Ok(StreamChange::Ignore) => {}
                    Err(e) => log::warn!("Ignoring malformed `{event}` event: {e}"),
                }
            });

            if let Err(e) =
                source.add_event_listener_with_callback(event, handler.as_ref().unchecked_ref())
            {
                log::error!("Failed to listen for `{event}` events: {e:?}");
                source.close();
                return None;
            }
            handlers.push(handler);
        }

        log::info!("Watching remote history for {identity}");
        Some(Subscription::new(move || {
            source.close();
            drop(handlers);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_urls() {
        let store = RealtimeStore::new("https://calc-demo.firebaseio.com/", None).unwrap();
        let identity = SessionIdentity::new("calc_k3j2h1g0f_lx9a2b").unwrap();
        assert_eq!(
            store.record_url(&identity),
            "https://calc-demo.firebaseio.com/history/calc_k3j2h1g0f_lx9a2b.json"
        );

        let store =
            RealtimeStore::new("https://calc-demo.firebaseio.com", Some("t0k/en".to_string()))
                .unwrap();
        assert_eq!(
            store.record_url(&identity),
            "https://calc-demo.firebaseio.com/history/calc_k3j2h1g0f_lx9a2b.json?auth=t0k%2Fen"
        );
    }

    #[test]
    fn blank_url_is_rejected() {
        assert!(RealtimeStore::new("", None).is_none());
        assert!(RealtimeStore::new(" / ", None).is_none());
    }
}
