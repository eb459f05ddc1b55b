//! Output formatters for feed events and scan triggers.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use crate::models::{EarthquakeEvent, TriggerRecord};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

// Magnitude-based colors
const RED: &str = "\x1b[91m"; // Critical: mag >= 7.0
const YELLOW: &str = "\x1b[93m"; // Warning: mag >= 6.0
const CYAN: &str = "\x1b[96m"; // Significant: mag >= 4.5
const GREEN: &str = "\x1b[92m"; // Moderate: mag >= 3.0
const WHITE: &str = "\x1b[97m"; // Minor: mag < 3.0

const ICON_QUAKE: &str = "🌍";
const ICON_TRIGGER: &str = "⚡";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// Get the color code for a magnitude value.
fn magnitude_color(mag: f64) -> &'static str {
    match mag {
        m if m >= 7.0 => RED,
        m if m >= 6.0 => YELLOW,
        m if m >= 4.5 => CYAN,
        m if m >= 3.0 => GREEN,
        _ => WHITE,
    }
}

/// Get severity label for magnitude.
fn magnitude_label(mag: f64) -> &'static str {
    match mag {
        m if m >= 7.0 => "MAJOR",
        m if m >= 6.0 => "STRONG",
        m if m >= 4.5 => "MODERATE",
        m if m >= 3.0 => "LIGHT",
        m if m >= 2.0 => "MINOR",
        _ => "MICRO",
    }
}

/// Write events in human-readable format with magnitude colors.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_events_human<W: Write>(writer: &mut W, events: &[EarthquakeEvent]) -> io::Result<()> {
    for event in events {
        let time = event.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string();
        let color = magnitude_color(event.magnitude);
        let label = magnitude_label(event.magnitude);

        writeln!(
            writer,
            "{ICON_QUAKE} {color}{BOLD}M{mag:.1}{RESET} │ \
             {color}{label:8}{RESET} │ \
             {DIM}{depth:>5.0}km{RESET} │ \
             {time} UTC │ \
             {place} {DIM}({source}){RESET}",
            mag = event.magnitude,
            depth = event.depth,
            place = event.location,
            source = event.source,
        )?;
    }
    Ok(())
}

/// Write events in the specified format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_events<W: Write>(
    writer: &mut W,
    events: &[EarthquakeEvent],
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => write_events_human(writer, events),
        Format::Json => write_json(writer, events),
        Format::Ndjson => write_ndjson(writer, events),
    }
}

/// Write scan triggers in the specified format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_triggers<W: Write>(
    writer: &mut W,
    triggers: &[TriggerRecord],
    format: Format,
) -> io::Result<()> {
    match format {
        Format::Human => {
            for trigger in triggers {
                writeln!(
                    writer,
                    "{ICON_TRIGGER} {BOLD}+{offset:8.2}s{RESET} │ \
                     ratio {ratio:5.2} │ \
                     peak {peak:.3} m/s²",
                    offset = trigger.offset_secs,
                    ratio = trigger.sta_lta_ratio,
                    peak = trigger.peak_acceleration,
                )?;
            }
            Ok(())
        }
        Format::Json => write_json(writer, triggers),
        Format::Ndjson => write_ndjson(writer, triggers),
    }
}

fn write_json<W: Write, T: serde::Serialize>(writer: &mut W, items: &[T]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(items)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

fn write_ndjson<W: Write, T: serde::Serialize>(writer: &mut W, items: &[T]) -> io::Result<()> {
    for item in items {
        let json =
            serde_json::to_string(item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writeln!(writer, "{json}")?;
    }
    Ok(())
}
