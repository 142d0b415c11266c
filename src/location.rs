use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocationData {
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// One location-history sample. Coordinates are degrees × 10^7.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Location {
    #[serde(rename = "timestampMs")]
    pub timestamp: String,
    #[serde(rename = "latitudeE7")]
    pub latitude: i64,
    #[serde(rename = "longitudeE7")]
    pub longitude: i64,
}

impl Location {
    pub fn timestamp_ms(&self) -> Result<i64, StoreError> {
        self.timestamp
            .trim()
            .parse()
            .map_err(|_| StoreError::BadTimestamp(self.timestamp.clone()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "*****\nTimestamp: {}\nLat: {}\nLon: {}\n*****",
            self.timestamp, self.latitude, self.longitude
        )
    }
}

pub fn load_locations(path: &Path) -> Result<LocationData, StoreError> {
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}
