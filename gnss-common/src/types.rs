use serde::{Deserialize, Serialize};

/// Constellation tag matching the platform's `GnssStatus` constellation constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum Constellation {
    Unknown,
    Gps,
    Sbas,
    Glonass,
    Qzss,
    Beidou,
    Galileo,
    Irnss,
    /// A tag newer than this crate; kept as-is so it survives a round trip
    Other(i32),
}

impl Constellation {
    pub const ALL: [Constellation; 8] = [
        Constellation::Unknown,
        Constellation::Gps,
        Constellation::Sbas,
        Constellation::Glonass,
        Constellation::Qzss,
        Constellation::Beidou,
        Constellation::Galileo,
        Constellation::Irnss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Constellation::Unknown => "unknown",
            Constellation::Gps => "gps",
            Constellation::Sbas => "sbas",
            Constellation::Glonass => "glonass",
            Constellation::Qzss => "qzss",
            Constellation::Beidou => "beidou",
            Constellation::Galileo => "galileo",
            Constellation::Irnss => "irnss",
            Constellation::Other(_) => "other",
        }
    }
}

impl From<i32> for Constellation {
    fn from(value: i32) -> Self {
        match value {
            0 => Constellation::Unknown,
            1 => Constellation::Gps,
            2 => Constellation::Sbas,
            3 => Constellation::Glonass,
            4 => Constellation::Qzss,
            5 => Constellation::Beidou,
            6 => Constellation::Galileo,
            7 => Constellation::Irnss,
            other => Constellation::Other(other),
        }
    }
}

impl From<Constellation> for i32 {
    fn from(value: Constellation) -> Self {
        match value {
            Constellation::Unknown => 0,
            Constellation::Gps => 1,
            Constellation::Sbas => 2,
            Constellation::Glonass => 3,
            Constellation::Qzss => 4,
            Constellation::Beidou => 5,
            Constellation::Galileo => 6,
            Constellation::Irnss => 7,
            Constellation::Other(other) => other,
        }
    }
}

impl std::fmt::Display for Constellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constellation::Other(tag) => write!(f, "other({})", tag),
            _ => write!(f, "{}", self.as_str()),
        }
    }
}

impl std::str::FromStr for Constellation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(Constellation::Unknown),
            "gps" => Ok(Constellation::Gps),
            "sbas" => Ok(Constellation::Sbas),
            "glonass" => Ok(Constellation::Glonass),
            "qzss" => Ok(Constellation::Qzss),
            "beidou" => Ok(Constellation::Beidou),
            "galileo" => Ok(Constellation::Galileo),
            "irnss" | "navic" => Ok(Constellation::Irnss),
            _ => Err(format!("Unknown constellation: {}", s)),
        }
    }
}

/// One satellite currently observed by the receiver.
///
/// `id` is only unique within its constellation, see [`SatelliteRecord::key`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteRecord {
    #[serde(rename = "svid")]
    pub id: i32,
    #[serde(rename = "constellationType")]
    pub constellation: Constellation,
    pub elevation_degrees: f32,
    pub azimuth_degrees: f32,
    pub used_in_fix: bool,
}

impl SatelliteRecord {
    /// Identity of the satellite across updates
    pub fn key(&self) -> (i32, Constellation) {
        (self.id, self.constellation)
    }
}
