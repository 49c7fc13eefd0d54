//! Where the session identity comes from, and how it is shared.
//!
//! A shareable link may carry an identity; that always wins for the current page but is never persisted here.
//! Otherwise the device's stored identity is used, synthesizing and persisting one on first use.
//! No network calls happen in this module.

use chrono::{DateTime, Utc};
use url::form_urlencoded;

use crate::data_model::SessionIdentity;
use crate::local_cache::LocalCache;
use crate::storage::KeyValueStore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentitySource {
    /// Taken from the current page's shareable link.
    Link,
    /// Previously persisted on this device.
    Stored,
    /// Created just now and persisted.
    Synthesized,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub identity: SessionIdentity,
    pub source: IdentitySource,
}

#[derive(Clone, Debug)]
pub struct IdentityProvider {
    link_parameter: String,
    link_identity: Option<SessionIdentity>,
}

impl IdentityProvider {
    /// `page_query` is the current page's query string, with or without the leading `?`.
    pub fn new(link_parameter: impl Into<String>, page_query: Option<&str>) -> Self {
        let link_parameter = link_parameter.into();
        let link_identity = page_query.and_then(|query| parse_link(query, &link_parameter));
        if let Some(identity) = &link_identity {
            log::info!("Page link carries identity {identity}");
        }
        Self {
            link_parameter,
            link_identity,
        }
    }

    pub fn link_parameter(&self) -> &str {
        &self.link_parameter
    }

    pub fn link_identity(&self) -> Option<&SessionIdentity> {
        self.link_identity.as_ref()
    }

    /// The link's identity if there is one, otherwise this device's.
    pub fn resolve<S: KeyValueStore>(
        &self,
        cache: &LocalCache<S>,
        now: DateTime<Utc>,
    ) -> ResolvedIdentity {
        match &self.link_identity {
            Some(identity) => ResolvedIdentity {
                identity: identity.clone(),
                source: IdentitySource::Link,
            },
            None => self.device_identity(cache, now),
        }
    }

    /// This device's own identity, ignoring any link.
    pub fn device_identity<S: KeyValueStore>(
        &self,
        cache: &LocalCache<S>,
        now: DateTime<Utc>,
    ) -> ResolvedIdentity {
        if let Some(identity) = cache.stored_identity() {
            return ResolvedIdentity {
                identity,
                source: IdentitySource::Stored,
            };
        }

        let identity = SessionIdentity::synthesize(now);
        log::info!("Created device identity {identity}");
        cache.store_identity(&identity);
        ResolvedIdentity {
            identity,
            source: IdentitySource::Synthesized,
        }
    }

    /// `origin?<parameter>=<identity>`.
    ///
    /// A client-synthesized identity is encoded too, even though no remote record exists for it yet; opening such
    /// a link just loads an empty history.
    pub fn shareable_url(&self, origin: &str, identity: &SessionIdentity) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair(&self.link_parameter, identity.as_str())
            .finish();
        format!("{}?{query}", origin.trim_end_matches('/'))
    }
}

fn parse_link(query: &str, parameter: &str) -> Option<SessionIdentity> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == parameter)
        .and_then(|(_, value)| SessionIdentity::new(value.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::storage::MemoryStorage;

    fn cache() -> LocalCache<MemoryStorage> {
        LocalCache::new(MemoryStorage::new(), SyncConfig::default().keys)
    }

    #[test]
    fn link_identity_wins_and_is_not_persisted() {
        let cache = cache();
        let provider = IdentityProvider::new("session", Some("?foo=1&session=calc_shared_1"));

        let resolved = provider.resolve(&cache, Utc::now());
        assert_eq!(resolved.source, IdentitySource::Link);
        assert_eq!(resolved.identity.as_str(), "calc_shared_1");
        assert_eq!(cache.stored_identity(), None);
    }

    #[test]
    fn blank_link_parameter_is_ignored() {
        let provider = IdentityProvider::new("session", Some("session="));
        assert_eq!(provider.link_identity(), None);

        let provider = IdentityProvider::new("bin", Some("session=calc_a_b"));
        assert_eq!(provider.link_identity(), None);
    }

    #[test]
    fn device_identity_is_stable() {
        let cache = cache();
        let provider = IdentityProvider::new("session", None);

        let first = provider.resolve(&cache, Utc::now());
        assert_eq!(first.source, IdentitySource::Synthesized);
        assert!(first.identity.is_client_generated());

        let second = provider.resolve(&cache, Utc::now());
        assert_eq!(second.source, IdentitySource::Stored);
        assert_eq!(second.identity, first.identity);
    }

    #[test]
    fn shareable_url_round_trips() {
        let provider = IdentityProvider::new("bin", None);
        let identity = SessionIdentity::issued("65f1c0ffee");

        let url = provider.shareable_url("https://calc.example/", &identity);
        assert_eq!(url, "https://calc.example?bin=b-65f1c0ffee");

        let query = url.split_once('?').map(|(_, query)| query);
        let opened = IdentityProvider::new("bin", query);
        assert_eq!(opened.link_identity(), Some(&identity));
    }
}
