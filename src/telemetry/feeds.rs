//! Feed resolution at startup
//!
//! Every metric maps to one remote feed. Feeds are resolved once and the
//! mapping is kept for the life of the process.

use std::collections::HashMap;

use super::{Feed, TelemetryError, TelemetrySink, UploadMode};
use crate::sensors::Metric;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed '{key}' for {metric} does not exist (AIO_UPLOAD is 'force')")]
    Missing { metric: Metric, key: String },

    #[error("could not resolve feed '{key}' for {metric}: {source}")]
    Resolve {
        metric: Metric,
        key: String,
        #[source]
        source: TelemetryError,
    },
}

/// Resolved feed per metric
#[derive(Debug, Clone, Default)]
pub struct FeedMap {
    feeds: HashMap<Metric, Feed>,
}

impl FeedMap {
    pub fn insert(&mut self, metric: Metric, feed: Feed) {
        self.feeds.insert(metric, feed);
    }

    pub fn get(&self, metric: Metric) -> Option<&Feed> {
        self.feeds.get(&metric)
    }
}

/// Make sure a feed exists, creating it unless `mode` is `Force`.
///
/// Calling it again for the same key finds the feed created the first time.
pub async fn ensure_feed<T: TelemetrySink>(
    sink: &T,
    key: &str,
    mode: UploadMode,
) -> Result<Feed, TelemetryError> {
    match sink.lookup_feed(key).await {
        Ok(feed) => Ok(feed),
        Err(TelemetryError::NotFound(_)) if mode != UploadMode::Force => {
            tracing::info!("Feed '{}' not found, creating it", key);
            sink.create_feed(key).await
        }
        Err(e) => Err(e),
    }
}

/// Resolve the configured feed keys.
///
/// With `Force` any failure is fatal. Otherwise a feed that cannot be
/// confirmed is kept by key and the error is logged; uploads to it may
/// still succeed once the service is reachable.
pub async fn resolve_feeds<T: TelemetrySink>(
    sink: &T,
    keys: &[(Metric, String)],
    mode: UploadMode,
) -> Result<FeedMap, FeedError> {
    let mut map = FeedMap::default();

    for (metric, key) in keys {
        match ensure_feed(sink, key, mode).await {
            Ok(feed) => {
                tracing::debug!("Feed for {}: {} ({})", metric, feed.key, feed.name);
                map.insert(*metric, feed);
            }
            Err(TelemetryError::NotFound(_)) if mode == UploadMode::Force => {
                return Err(FeedError::Missing {
                    metric: *metric,
                    key: key.clone(),
                });
            }
            Err(source) if mode == UploadMode::Force => {
                return Err(FeedError::Resolve {
                    metric: *metric,
                    key: key.clone(),
                    source,
                });
            }
            Err(e) => {
                tracing::error!("Could not resolve feed '{}' for {}: {}", key, metric, e);
                map.insert(*metric, Feed::unresolved(key));
            }
        }
    }

    Ok(map)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashSet, VecDeque};

    /// In-memory feed service that records every call
    #[derive(Default)]
    pub struct FakeService {
        pub feeds: RefCell<HashSet<String>>,
        pub calls: RefCell<Vec<String>>,
        pub pushes: RefCell<Vec<(String, f64)>>,
        /// Scripted push results, consumed front to back; `None` succeeds
        pub push_errors: RefCell<VecDeque<Option<TelemetryError>>>,
        pub offline: bool,
    }

    impl FakeService {
        pub fn with_feeds(keys: &[&str]) -> Self {
            let service = Self::default();
            service
                .feeds
                .borrow_mut()
                .extend(keys.iter().map(|k| k.to_string()));
            service
        }

        pub fn script_pushes(&self, results: Vec<Option<TelemetryError>>) {
            self.push_errors.borrow_mut().extend(results);
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    fn offline_error() -> TelemetryError {
        TelemetryError::Status {
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    impl TelemetrySink for FakeService {
        async fn lookup_feed(&self, key: &str) -> Result<Feed, TelemetryError> {
            self.calls.borrow_mut().push(format!("lookup {}", key));
            if self.offline {
                return Err(offline_error());
            }
            if self.feeds.borrow().contains(key) {
                Ok(Feed::unresolved(key))
            } else {
                Err(TelemetryError::NotFound(key.to_string()))
            }
        }

        async fn create_feed(&self, key: &str) -> Result<Feed, TelemetryError> {
            self.calls.borrow_mut().push(format!("create {}", key));
            self.feeds.borrow_mut().insert(key.to_string());
            Ok(Feed::unresolved(key))
        }

        async fn push(&self, feed: &Feed, value: f64) -> Result<(), TelemetryError> {
            self.calls.borrow_mut().push(format!("push {}", feed.key));
            if let Some(Some(err)) = self.push_errors.borrow_mut().pop_front() {
                return Err(err);
            }
            self.pushes.borrow_mut().push((feed.key.clone(), value));
            Ok(())
        }
    }

    fn keys() -> Vec<(Metric, String)> {
        vec![
            (Metric::Temperature, "temps".to_string()),
            (Metric::Pressure, "press".to_string()),
            (Metric::Humidity, "humid".to_string()),
        ]
    }

    #[tokio::test]
    async fn test_existing_feeds_are_not_recreated() {
        let service = FakeService::with_feeds(&["temps", "press", "humid"]);
        let map = resolve_feeds(&service, &keys(), UploadMode::Force).await.unwrap();
        assert_eq!(map.get(Metric::Pressure).unwrap().key, "press");
        assert!(service.calls.borrow().iter().all(|c| c.starts_with("lookup")));
    }

    #[tokio::test]
    async fn test_missing_feed_created_in_yes_mode() {
        let service = FakeService::with_feeds(&["temps"]);
        let map = resolve_feeds(&service, &keys(), UploadMode::Yes).await.unwrap();
        assert_eq!(map.get(Metric::Humidity).unwrap().key, "humid");
        assert!(service.calls.borrow().contains(&"create press".to_string()));
        assert!(service.calls.borrow().contains(&"create humid".to_string()));
    }

    #[tokio::test]
    async fn test_missing_feed_fatal_in_force_mode() {
        let service = FakeService::with_feeds(&["temps", "humid"]);
        let err = resolve_feeds(&service, &keys(), UploadMode::Force).await.unwrap_err();
        assert!(matches!(err, FeedError::Missing { metric: Metric::Pressure, .. }));
        assert!(!service.calls.borrow().iter().any(|c| c.starts_with("create")));
    }

    #[tokio::test]
    async fn test_ensure_feed_is_idempotent() {
        let service = FakeService::default();
        let first = ensure_feed(&service, "temps", UploadMode::Yes).await.unwrap();
        let second = ensure_feed(&service, "temps", UploadMode::Yes).await.unwrap();
        assert_eq!(first, second);
        let creates = service.calls.borrow().iter().filter(|c| c.starts_with("create")).count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_offline_service_degrades_in_yes_mode() {
        let service = FakeService {
            offline: true,
            ..FakeService::default()
        };
        let map = resolve_feeds(&service, &keys(), UploadMode::Yes).await.unwrap();
        assert_eq!(map.get(Metric::Temperature), Some(&Feed::unresolved("temps")));

        let err = resolve_feeds(&service, &keys(), UploadMode::Force).await.unwrap_err();
        assert!(matches!(err, FeedError::Resolve { .. }));
    }
}
