//! One upload of the current values, with a single throttle retry

use std::time::Duration;

use super::feeds::FeedMap;
use super::{TelemetryError, TelemetrySink};
use crate::sensors::Metric;
use crate::units::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Sent,
    /// Upload failed; the values are not retried in a later cycle
    Dropped,
}

pub struct Uploader<T> {
    sink: T,
    feeds: FeedMap,
    throttle: Duration,
    rounding: u32,
}

impl<T: TelemetrySink> Uploader<T> {
    pub fn new(sink: T, feeds: FeedMap, throttle: Duration, rounding: u32) -> Self {
        Self {
            sink,
            feeds,
            throttle,
            rounding,
        }
    }

    /// Push every value to its feed.
    ///
    /// A rate limit response waits `throttle` and retries the values not
    /// yet delivered, once. Any other failure drops the rest.
    pub async fn upload(&self, values: &[(Metric, f64)]) -> UploadOutcome {
        let mut pending: Vec<(Metric, f64)> = values
            .iter()
            .map(|(m, v)| (*m, round_to(*v, self.rounding)))
            .collect();

        match self.push_pending(&mut pending).await {
            Ok(()) => UploadOutcome::Sent,
            Err(TelemetryError::Throttled) => {
                tracing::warn!(
                    "Throttled by telemetry service, retrying in {}s",
                    self.throttle.as_secs()
                );
                tokio::time::sleep(self.throttle).await;

                match self.push_pending(&mut pending).await {
                    Ok(()) => UploadOutcome::Sent,
                    Err(e) => {
                        tracing::error!("Upload retry failed, dropping sample: {}", e);
                        UploadOutcome::Dropped
                    }
                }
            }
            Err(e) => {
                tracing::error!("Upload failed, dropping sample: {}", e);
                UploadOutcome::Dropped
            }
        }
    }

    /// Push in order, removing each value once it is delivered
    async fn push_pending(&self, pending: &mut Vec<(Metric, f64)>) -> Result<(), TelemetryError> {
        while let Some(&(metric, value)) = pending.first() {
            match self.feeds.get(metric) {
                Some(feed) => {
                    self.sink.push(feed, value).await?;
                    tracing::debug!("Pushed {} = {} to '{}'", metric, value, feed.key);
                }
                None => tracing::warn!("No feed configured for {}, skipping", metric),
            }
            pending.remove(0);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn sink(&self) -> &T {
        &self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::feeds::tests::FakeService;
    use crate::telemetry::Feed;

    fn uploader(service: FakeService) -> Uploader<FakeService> {
        let mut feeds = FeedMap::default();
        feeds.insert(Metric::Temperature, Feed::unresolved("temps"));
        feeds.insert(Metric::Pressure, Feed::unresolved("press"));
        feeds.insert(Metric::Humidity, Feed::unresolved("humid"));
        Uploader::new(service, feeds, Duration::from_secs(120), 2)
    }

    fn values() -> Vec<(Metric, f64)> {
        vec![
            (Metric::Temperature, 21.456),
            (Metric::Pressure, 1013.2512),
            (Metric::Humidity, 45.0),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_rounds_and_pushes_all() {
        let up = uploader(FakeService::default());
        assert_eq!(up.upload(&values()).await, UploadOutcome::Sent);
        assert_eq!(
            *up.sink().pushes.borrow(),
            vec![
                ("temps".to_string(), 21.46),
                ("press".to_string(), 1013.25),
                ("humid".to_string(), 45.0)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_retries_once_after_backoff() {
        let service = FakeService::default();
        service.script_pushes(vec![Some(TelemetryError::Throttled)]);
        let up = uploader(service);

        let start = tokio::time::Instant::now();
        assert_eq!(up.upload(&values()).await, UploadOutcome::Sent);
        assert!(start.elapsed() >= Duration::from_secs(120));

        // first push throttled, then all three delivered
        assert_eq!(up.sink().call_count(), 4);
        assert_eq!(up.sink().pushes.borrow().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_never_retries_twice() {
        let service = FakeService::default();
        service.script_pushes(vec![
            Some(TelemetryError::Throttled),
            Some(TelemetryError::Throttled),
            Some(TelemetryError::Throttled),
        ]);
        let up = uploader(service);

        let start = tokio::time::Instant::now();
        assert_eq!(up.upload(&values()).await, UploadOutcome::Dropped);
        assert_eq!(up.sink().call_count(), 2);
        assert!(start.elapsed() < Duration::from_secs(240));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_delivery_retries_remainder() {
        let service = FakeService::default();
        // temperature goes through, pressure is throttled
        service.script_pushes(vec![None, Some(TelemetryError::Throttled)]);
        let up = uploader(service);

        assert_eq!(up.upload(&values()).await, UploadOutcome::Sent);
        let keys: Vec<String> = up.sink().pushes.borrow().iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["temps", "press", "humid"]);
        assert_eq!(up.sink().call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_drop_without_retry() {
        let service = FakeService::default();
        service.script_pushes(vec![Some(TelemetryError::Status {
            status: 500,
            body: "boom".to_string(),
        })]);
        let up = uploader(service);

        let start = tokio::time::Instant::now();
        assert_eq!(up.upload(&values()).await, UploadOutcome::Dropped);
        assert_eq!(up.sink().call_count(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
