use std::fmt;

use crate::models::IdealRange;

/// Where a reading sits relative to its ideal band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    TooHigh,
    TooLow,
    Normal,
}

/// Boundaries count as normal.
pub fn classify<T: PartialOrd>(value: T, min: T, max: T) -> Status {
    if value > max {
        Status::TooHigh
    } else if value < min {
        Status::TooLow
    } else {
        Status::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
}

/// Display colour family for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Red,
    Blue,
    Orange,
    Green,
}

impl Metric {
    pub fn label(self, status: Status) -> &'static str {
        match (self, status) {
            (Metric::Temperature, Status::TooHigh) => "Too hot",
            (Metric::Temperature, Status::TooLow) => "Too cold",
            (Metric::Humidity, Status::TooHigh) => "Too humid",
            (Metric::Humidity, Status::TooLow) => "Too dry",
            (_, Status::Normal) => "Normal",
        }
    }

    pub fn tone(self, status: Status) -> Tone {
        match (self, status) {
            (Metric::Temperature, Status::TooHigh) => Tone::Red,
            (Metric::Temperature, Status::TooLow) => Tone::Blue,
            (Metric::Humidity, Status::TooHigh) => Tone::Blue,
            (Metric::Humidity, Status::TooLow) => Tone::Orange,
            (_, Status::Normal) => Tone::Green,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Temperature => "°C",
            Metric::Humidity => "%",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Metric::Temperature => "Air temperature",
            Metric::Humidity => "Air humidity",
        })
    }
}

pub fn temperature_status(value: f64, range: &IdealRange) -> Status {
    classify(value, range.temp_min, range.temp_max)
}

pub fn humidity_status(value: i64, range: &IdealRange) -> Status {
    classify(value, range.humidity_min, range.humidity_max)
}
