//! Fix/Sats summary of a satellite snapshot
use std::fmt;

use gnss_common::{Constellation, SatelliteRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstellationCount {
    pub constellation: Constellation,
    pub in_view: usize,
    pub used_in_fix: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkySummary {
    pub in_view: usize,
    pub used_in_fix: usize,
    /// Sorted by constellation tag
    pub constellations: Vec<ConstellationCount>,
}

impl SkySummary {
    pub fn from_snapshot(satellites: &[SatelliteRecord]) -> Self {
        let mut constellations: Vec<ConstellationCount> = Vec::new();

        for satellite in satellites {
            let index = match constellations
                .iter()
                .position(|count| count.constellation == satellite.constellation)
            {
                Some(index) => index,
                None => {
                    constellations.push(ConstellationCount {
                        constellation: satellite.constellation,
                        in_view: 0,
                        used_in_fix: 0,
                    });
                    constellations.len() - 1
                }
            };
            let count = &mut constellations[index];
            count.in_view += 1;
            if satellite.used_in_fix {
                count.used_in_fix += 1;
            }
        }

        constellations.sort_by_key(|count| i32::from(count.constellation));

        Self {
            in_view: satellites.len(),
            used_in_fix: satellites.iter().filter(|s| s.used_in_fix).count(),
            constellations,
        }
    }

    pub fn has_fix(&self) -> bool {
        self.used_in_fix > 0
    }

    /// e.g. `gps 3/4, galileo 2/3`
    pub fn breakdown(&self) -> String {
        self.constellations
            .iter()
            .map(|count| format!("{} {}/{}", count.constellation, count.used_in_fix, count.in_view))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SkySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} Fix/Sats", self.used_in_fix, self.in_view)
    }
}
