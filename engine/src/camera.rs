//! Camera registration checks.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const ACCEPTED_SCHEMES: [&str; 3] = ["rtsp://", "http://", "https://"];

/// Accept only `rtsp://`, `http://` or `https://` stream URLs with a
/// non-empty remainder and no whitespace anywhere.
pub fn validate_camera_url(url: &str) -> bool {
    if url.is_empty() || url.chars().any(char::is_whitespace) {
        return false;
    }

    ACCEPTED_SCHEMES.iter().any(|scheme| {
        url.len() > scheme.len()
            && url.is_char_boundary(scheme.len())
            && url[..scheme.len()].eq_ignore_ascii_case(scheme)
    })
}

/// Where a camera is mounted relative to the pen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CameraPosition {
    N,
    S,
    E,
    W,
    NE,
    NW,
    SE,
    SW,
    Center,
}

impl CameraPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraPosition::N => "N",
            CameraPosition::S => "S",
            CameraPosition::E => "E",
            CameraPosition::W => "W",
            CameraPosition::NE => "NE",
            CameraPosition::NW => "NW",
            CameraPosition::SE => "SE",
            CameraPosition::SW => "SW",
            CameraPosition::Center => "CENTER",
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraPosition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "N" => Ok(CameraPosition::N),
            "S" => Ok(CameraPosition::S),
            "E" => Ok(CameraPosition::E),
            "W" => Ok(CameraPosition::W),
            "NE" => Ok(CameraPosition::NE),
            "NW" => Ok(CameraPosition::NW),
            "SE" => Ok(CameraPosition::SE),
            "SW" => Ok(CameraPosition::SW),
            "CENTER" => Ok(CameraPosition::Center),
            _ => Err(Error::UnknownVariant {
                kind: "camera position",
                value: s.to_string(),
            }),
        }
    }
}

/// Case-insensitive check of a mounting position label.
pub fn validate_camera_position(position: &str) -> bool {
    position.parse::<CameraPosition>().is_ok()
}
