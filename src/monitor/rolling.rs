use std::collections::VecDeque;

use crate::models::ChartPoint;

/// Number of points kept for the chart.
pub const SERIES_CAPACITY: usize = 10;

/// Fixed-capacity FIFO of chart points, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingSeries {
    points: VecDeque<ChartPoint>,
    capacity: usize,
}

impl Default for RollingSeries {
    fn default() -> Self {
        Self::with_capacity(SERIES_CAPACITY)
    }
}

impl RollingSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// `capacity` is clamped to at least one point.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append `point`, returning the evicted oldest point when full.
    pub fn push(&mut self, point: ChartPoint) -> Option<ChartPoint> {
        self.points.push_back(point);
        if self.points.len() > self.capacity {
            self.points.pop_front()
        } else {
            None
        }
    }

    /// Replace the contents with `points` (oldest first), keeping the newest `capacity`.
    pub fn replace<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = ChartPoint>,
    {
        self.points.clear();
        for point in points {
            self.push(point);
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    pub fn temperatures(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.temperature).collect()
    }

    pub fn humidities(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.humidity).collect()
    }
}
