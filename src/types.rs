//! Shared value types for workspace background records

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// How a background image is placed on the desktop.
///
/// Wire discriminants are stable and start at 1 to match the numbering the
/// desktop shell understands; the record blob stores the integer form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Placement {
    /// Place the image at an explicit pixel offset
    UseOrigin = 1,
    Centered = 2,
    #[default]
    Scaled = 3,
    Tiled = 4,
}

impl Placement {
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::UseOrigin),
            2 => Some(Self::Centered),
            3 => Some(Self::Scaled),
            4 => Some(Self::Tiled),
            _ => None,
        }
    }

    pub fn to_wire(self) -> i32 {
        self as i32
    }
}

impl Serialize for Placement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Placement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i32::deserialize(deserializer)?;
        Self::from_wire(value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown placement mode {value}")))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UseOrigin => "use origin",
            Self::Centered => "centered",
            Self::Scaled => "scaled",
            Self::Tiled => "tiled",
        };
        f.write_str(name)
    }
}

/// Pixel offset used by [`Placement::UseOrigin`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Origin {
    pub x: i32,
    pub y: i32,
}

impl Origin {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X={} Y={}", self.x, self.y)
    }
}

/// Desktop background color, forwarded to/from the shell untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Parse an `RRGGBB` hex string, with an optional `#` prefix
    pub fn parse(input: &str) -> Option<Self> {
        let hex = input.strip_prefix('#').unwrap_or(input);
        if hex.len() != 6 {
            return None;
        }
        let raw = u32::from_str_radix(hex, 16).ok()?;
        Some(Self {
            r: (raw >> 16) as u8,
            g: (raw >> 8) as u8,
            b: raw as u8,
            a: 0xFF,
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Logging threshold, as spelled in the settings file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    None,
    Error,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::None => LevelFilter::OFF,
            Self::Error => LevelFilter::ERROR,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "error" => Ok(Self::Error),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}
