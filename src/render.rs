//! Plain-text rendering of a room view for the terminal.
use std::fmt::Write;

use chrono::Local;

use crate::{
    api::models::{LooseValue, Room, RoomOverview},
    models::IdealRange,
    monitor::MonitorState,
    status::{humidity_status, temperature_status, Metric, Status, Tone},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
    /// No escape codes, for pipes and tests.
    Plain,
}

impl Theme {
    pub fn from_dark_mode(dark: bool) -> Self {
        if dark {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    fn paint(self, tone: Tone, text: &str) -> String {
        let code = match (self, tone) {
            (Theme::Plain, _) => return text.to_owned(),
            (Theme::Light, Tone::Red) => "31",
            (Theme::Light, Tone::Blue) => "34",
            (Theme::Light, Tone::Orange) => "33",
            (Theme::Light, Tone::Green) => "32",
            (Theme::Dark, Tone::Red) => "91",
            (Theme::Dark, Tone::Blue) => "94",
            (Theme::Dark, Tone::Orange) => "93",
            (Theme::Dark, Tone::Green) => "92",
        };
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn card(out: &mut String, theme: Theme, metric: Metric, value: &str, status: Status) {
    let label = theme.paint(metric.tone(status), metric.label(status));
    let _ = writeln!(out, "  {metric:<16} {value:>8}{unit:<3} {label}", unit = metric.unit());
}

fn switch(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

/// Full room view: error banner, cards, switches, and the chart table.
pub fn dashboard(state: &MonitorState, theme: Theme) -> String {
    let mut out = String::new();
    let data = &state.data;

    if let Some(error) = &state.error {
        let _ = writeln!(out, "{}", theme.paint(Tone::Red, &format!("! {error}")));
    }

    let _ = writeln!(out, "Room {}", state.room_id);
    card(
        &mut out,
        theme,
        Metric::Temperature,
        &format!("{:.1}", data.temperature),
        temperature_status(data.temperature, &state.settings),
    );
    card(
        &mut out,
        theme,
        Metric::Humidity,
        &data.humidity.to_string(),
        humidity_status(data.humidity, &state.settings),
    );
    let _ = writeln!(
        out,
        "  Fan: {:<4} Lamp: {}",
        switch(data.actuators.fan),
        switch(data.actuators.lamp)
    );
    let _ = writeln!(
        out,
        "  Ideal: {:.1}-{:.1} °C, {}-{} %",
        state.settings.temp_min,
        state.settings.temp_max,
        state.settings.humidity_min,
        state.settings.humidity_max
    );
    let _ = writeln!(
        out,
        "  Last update: {}",
        data.last_update.with_timezone(&Local).format("%H:%M:%S")
    );

    if !state.series.is_empty() {
        let _ = writeln!(out, "  {:<10} {:>8} {:>6}", "time", "°C", "%");
        for point in state.series.iter() {
            let _ = writeln!(
                out,
                "  {:<10} {:>8.1} {:>6}",
                point.recorded_at.with_timezone(&Local).format("%H:%M:%S"),
                point.temperature,
                point.humidity
            );
        }
    }

    out
}

pub fn rooms_table(rooms: &[Room]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<6} {:<24} {:<8} description", "id", "name", "active");
    for room in rooms {
        let _ = writeln!(
            out,
            "{:<6} {:<24} {:<8} {}",
            room.id,
            room.name,
            if room.active() { "yes" } else { "no" },
            room.description.as_deref().unwrap_or("")
        );
    }
    out
}

/// Overview of every room, classified against `range`.
pub fn overview_table(rooms: &[RoomOverview], range: &IdealRange, theme: Theme) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<6} {:<20} {:>7} {:<10} {:>5} {:<10} {:<4} {:<4}",
        "id", "name", "°C", "", "%", "", "fan", "lamp"
    );
    for room in rooms {
        let temperature = room.temp.as_ref().and_then(LooseValue::as_f64);
        let humidity = room.humy.as_ref().and_then(LooseValue::as_i64);
        let flag = |v: &Option<LooseValue>| switch(v.as_ref().is_some_and(LooseValue::as_flag));

        let temp_label = temperature.map_or(String::new(), |t| {
            let status = temperature_status(t, range);
            theme.paint(Metric::Temperature.tone(status), Metric::Temperature.label(status))
        });
        let humy_label = humidity.map_or(String::new(), |h| {
            let status = humidity_status(h, range);
            theme.paint(Metric::Humidity.tone(status), Metric::Humidity.label(status))
        });

        let _ = writeln!(
            out,
            "{:<6} {:<20} {:>7} {:<10} {:>5} {:<10} {:<4} {:<4}",
            room.room_id,
            room.name,
            temperature.map_or("-".to_owned(), |t| format!("{t:.1}")),
            temp_label,
            humidity.map_or("-".to_owned(), |h| h.to_string()),
            humy_label,
            flag(&room.fan1),
            flag(&room.lamp1),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::ChartPoint;

    fn state() -> MonitorState {
        let mut s = MonitorState::new(1);
        s.data.temperature = 30.0;
        s.data.humidity = 80;
        s.data.actuators.fan = true;
        s.series.push(ChartPoint {
            recorded_at: Utc::now(),
            temperature: 30.0,
            humidity: 80,
        });
        s
    }

    #[test]
    fn plain_dashboard_shows_status_and_switches() {
        let text = dashboard(&state(), Theme::Plain);
        assert!(text.contains("Room 1"));
        assert!(text.contains("Too hot"));
        assert!(text.contains("Too humid"));
        assert!(text.contains("Fan: ON"));
        assert!(text.contains("Lamp: OFF"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn error_banner_is_first() {
        let mut s = state();
        s.error = Some("Failed to fetch sensor data: timeout".into());
        let text = dashboard(&s, Theme::Plain);
        assert!(text.starts_with("! Failed to fetch sensor data"));
    }

    #[test]
    fn overview_marks_missing_readings() {
        let rooms: Vec<RoomOverview> = serde_json::from_value(serde_json::json!([
            { "room_id": 1, "name": "Main", "temp": "24.5", "humy": 65, "fan1": 1, "lamp1": 0 },
            { "room_id": 2, "name": "Nursery" }
        ]))
        .unwrap();
        let text = overview_table(&rooms, &IdealRange::default(), Theme::Plain);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("24.5"));
        assert!(lines[1].contains("Normal"));
        assert!(lines[1].contains("ON"));
        assert!(lines[2].contains('-'));
    }

    #[test]
    fn themes_use_different_palettes() {
        let light = dashboard(&state(), Theme::Light);
        let dark = dashboard(&state(), Theme::Dark);
        assert!(light.contains("\x1b[31mToo hot"));
        assert!(dark.contains("\x1b[91mToo hot"));
    }
}
