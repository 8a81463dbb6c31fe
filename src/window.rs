//! Bounded sample history
//!
//! Every metric keeps the most recent N readings for the scrolling graph.
//! Once full, pushing evicts the oldest entry.

use std::collections::VecDeque;

use crate::sensors::{Metric, Reading};

/// Fixed-capacity FIFO buffer
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> SampleWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an item, dropping the oldest one if the window is full
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl SampleWindow<f64> {
    pub fn average(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.iter().sum::<f64>() / self.len() as f64)
        }
    }
}

/// One window per metric
#[derive(Debug, Clone)]
pub struct History {
    temperature: SampleWindow<Reading>,
    pressure: SampleWindow<Reading>,
    humidity: SampleWindow<Reading>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            temperature: SampleWindow::new(capacity),
            pressure: SampleWindow::new(capacity),
            humidity: SampleWindow::new(capacity),
        }
    }

    pub fn record(&mut self, reading: Reading) {
        self.window_mut(reading.metric).push(reading);
    }

    pub fn window(&self, metric: Metric) -> &SampleWindow<Reading> {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Pressure => &self.pressure,
            Metric::Humidity => &self.humidity,
        }
    }

    fn window_mut(&mut self, metric: Metric) -> &mut SampleWindow<Reading> {
        match metric {
            Metric::Temperature => &mut self.temperature,
            Metric::Pressure => &mut self.pressure,
            Metric::Humidity => &mut self.humidity,
        }
    }

    pub fn latest(&self, metric: Metric) -> Option<&Reading> {
        self.window(metric).latest()
    }

    /// Values of one metric, oldest first
    pub fn values(&self, metric: Metric) -> Vec<f64> {
        self.window(metric).iter().map(|r| r.value).collect()
    }
}
