//! The sampling loop
//!
//! Each cycle waits `WAIT` seconds, reads the sensors, updates the display
//! and uploads the latest values once the upload interval has passed. The
//! first upload waits `DELAY`, later ones `FREQ`. The loop runs until Ctrl-C
//! or until the upload limit is reached.

use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::Settings;
use crate::display::console::{Console, Status};
use crate::display::render::Renderer;
use crate::display::{DisplayMode, DisplaySink, LCD_COLS, LCD_ROWS};
use crate::sensors::cpu::Compensation;
use crate::sensors::{Metric, Reading, SensorSource};
use crate::telemetry::feeds::{resolve_feeds, FeedError};
use crate::telemetry::upload::{UploadOutcome, Uploader};
use crate::telemetry::TelemetrySink;
use crate::window::History;

/// Proximity count that counts as a hand over the sensor
pub const PROX_LIMIT: u32 = 1500;

/// Minimum time between two proximity mode changes
pub const PROX_DEBOUNCE: Duration = Duration::from_millis(500);

/// What happened during a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub uploads: u32,
    pub cycles: u64,
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
}

/// Loop timestamps
struct Clock {
    last_upload: Instant,
    upload_interval: Duration,
    last_activity: Instant,
    last_mode_change: Option<Instant>,
}

pub struct Monitor<S, D, T> {
    settings: Settings,
    sensors: S,
    display: Option<D>,
    console: Option<Console>,
    uploader: Option<Uploader<T>>,
    max_uploads: Option<u32>,
    renderer: Renderer,
    history: History,
    compensation: Compensation,
    mode: DisplayMode,
    asleep: bool,
    shutdown: watch::Receiver<bool>,
}

impl<S, D, T> Monitor<S, D, T>
where
    S: SensorSource,
    D: DisplaySink,
    T: TelemetrySink,
{
    pub fn new(settings: Settings, sensors: S, shutdown: watch::Receiver<bool>) -> Self {
        let renderer = Renderer::new(
            LCD_COLS,
            LCD_ROWS,
            settings.rotation,
            settings.progress.0,
            settings.units_temps,
        );
        let compensation = Compensation::new(settings.temp_comp, settings.cpu_temps);

        Self {
            mode: settings.display,
            settings,
            sensors,
            display: None,
            console: None,
            uploader: None,
            max_uploads: None,
            renderer,
            history: History::new(LCD_COLS.max(LCD_ROWS)),
            compensation,
            asleep: false,
            shutdown,
        }
    }

    /// Build the loop around already opened sensors and resolve the upload
    /// feeds. `sink` is ignored when `AIO_UPLOAD` is `no`, so no request is
    /// ever made in that mode.
    pub async fn connect(
        settings: Settings,
        sensors: S,
        sink: Option<T>,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, FeedError> {
        let uploader = match sink {
            Some(sink) if settings.aio_upload.enabled() => {
                let feeds = resolve_feeds(&sink, &settings.feed_keys(), settings.aio_upload).await?;
                Some(Uploader::new(sink, feeds, settings.throttle(), settings.rounding))
            }
            _ => {
                tracing::info!("Uploads disabled (AIO_UPLOAD = {})", settings.aio_upload);
                None
            }
        };

        let monitor = Self::new(settings, sensors, shutdown);
        Ok(match uploader {
            Some(uploader) => monitor.with_uploader(uploader),
            None => monitor,
        })
    }

    pub fn with_display(mut self, display: D) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_console(mut self, console: Console) -> Self {
        self.console = Some(console);
        self
    }

    pub fn with_uploader(mut self, uploader: Uploader<T>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Stop after this many successful uploads
    pub fn with_upload_limit(mut self, limit: Option<u32>) -> Self {
        self.max_uploads = limit;
        self
    }

    pub async fn run(mut self) -> RunSummary {
        let started = Local::now();
        let start = Instant::now();
        let mut clock = Clock {
            last_upload: start,
            upload_interval: self.settings.delay(),
            last_activity: start,
            last_mode_change: None,
        };
        let mut uploads = 0u32;
        let mut cycles = 0u64;

        tracing::info!("Starting sampling loop in '{}' mode", self.mode);

        loop {
            if *self.shutdown.borrow() {
                tracing::info!("Shutdown requested");
                break;
            }
            if self.pause().await {
                tracing::info!("Shutdown requested");
                break;
            }

            cycles += 1;
            let now = Instant::now();

            let readings = self.sample();
            for reading in &readings {
                self.history.record(*reading);
            }

            self.check_proximity(now, &mut clock);
            self.refresh_display(now, &clock);

            if let Some(uploader) = &self.uploader {
                if now.duration_since(clock.last_upload) >= clock.upload_interval {
                    let payload: Vec<(Metric, f64)> =
                        readings.iter().map(|r| (r.metric, r.value)).collect();

                    if payload.is_empty() {
                        tracing::debug!("No readings this cycle, postponing upload");
                    } else {
                        if let Some(taken_at) = readings.iter().map(|r| r.taken_at).max() {
                            tracing::debug!("Uploading {} values sampled at {}", payload.len(), taken_at);
                        }
                        if uploader.upload(&payload).await == UploadOutcome::Sent {
                            uploads += 1;
                            clock.upload_interval = self.settings.freq();
                            tracing::info!("Upload {} sent", uploads);
                        }
                        clock.last_upload = Instant::now();
                    }
                }
            }

            self.print_status(readings, uploads, &clock);

            if let Some(max) = self.max_uploads {
                if uploads >= max {
                    tracing::info!("Reached upload limit ({})", max);
                    break;
                }
            }
        }

        RunSummary {
            uploads,
            cycles,
            started,
            finished: Local::now(),
        }
    }

    /// Wait `WAIT` seconds. Returns `true` if shutdown was requested meanwhile.
    async fn pause(&mut self) -> bool {
        let wait = self.settings.wait();
        tokio::select! {
            _ = tokio::time::sleep(wait) => false,
            changed = self.shutdown.changed() => match changed {
                Ok(()) => *self.shutdown.borrow(),
                Err(_) => {
                    // sender gone, nobody can interrupt us any more
                    tokio::time::sleep(wait).await;
                    false
                }
            },
        }
    }

    /// Read every metric, compensate and convert. Failed metrics are left out.
    fn sample(&mut self) -> Vec<Reading> {
        let unit = self.settings.units_temps;
        let cpu = if self.compensation.enabled() {
            self.sensors.cpu_temperature()
        } else {
            None
        };

        let mut readings = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            match self.sensors.read(metric) {
                Ok(raw) => {
                    let value = match metric {
                        Metric::Temperature => unit.from_celsius(self.compensation.apply(raw, cpu)),
                        Metric::Pressure | Metric::Humidity => raw,
                    };
                    readings.push(Reading::new(metric, value, metric.unit(unit)));
                }
                Err(e) => tracing::warn!("Failed to read {}: {}", metric, e),
            }
        }
        readings
    }

    fn check_proximity(&mut self, now: Instant, clock: &mut Clock) {
        match self.sensors.proximity() {
            Ok(proximity) if proximity > PROX_LIMIT => {
                clock.last_activity = now;
                let settled = clock
                    .last_mode_change
                    .map_or(true, |at| now.duration_since(at) >= PROX_DEBOUNCE);
                if settled {
                    self.mode = self.mode.next();
                    clock.last_mode_change = Some(now);
                    tracing::info!("Display mode: {}", self.mode);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Proximity unavailable: {}", e),
        }
    }

    fn refresh_display(&mut self, now: Instant, clock: &Clock) {
        let Some(display) = self.display.as_mut() else {
            return;
        };

        let idle = now.duration_since(clock.last_activity);
        if self.settings.sleep().is_some_and(|limit| idle >= limit) {
            if !self.asleep {
                tracing::debug!("No activity for {}s, blanking display", idle.as_secs());
                if let Err(e) = display.blank() {
                    tracing::warn!("Failed to blank display: {}", e);
                }
                self.asleep = true;
            }
            return;
        }

        if self.asleep {
            tracing::debug!("Waking display");
            self.asleep = false;
        }

        let progress = match &self.uploader {
            Some(_) => upload_progress(now.duration_since(clock.last_upload), clock.upload_interval),
            None => 0.0,
        };
        let canvas = self.renderer.render(self.mode, &self.history, progress);
        if let Err(e) = display.show(&canvas) {
            tracing::warn!("Failed to update display: {}", e);
        }
    }

    fn print_status(&mut self, readings: Vec<Reading>, uploads: u32, clock: &Clock) {
        let Some(console) = self.console.as_mut() else {
            return;
        };

        let next_upload = self.uploader.as_ref().map(|_| {
            clock
                .upload_interval
                .saturating_sub(clock.last_upload.elapsed())
                .as_secs()
        });
        let status = Status {
            readings,
            mode: self.mode,
            asleep: self.asleep,
            uploads,
            max_uploads: self.max_uploads,
            next_upload,
        };
        if let Err(e) = console.status(&status) {
            tracing::debug!("Failed to write status line: {}", e);
        }
    }
}

/// Elapsed fraction of the upload interval, clamped to 0..=1
fn upload_progress(elapsed: Duration, delay: Duration) -> f64 {
    if delay.is_zero() {
        return 1.0;
    }
    (elapsed.as_secs_f64() / delay.as_secs_f64()).clamp(0.0, 1.0)
}
