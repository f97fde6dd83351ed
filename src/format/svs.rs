//! Aperio SVS metadata.
//!
//! Aperio writes its metadata into the base level's ImageDescription:
//!
//! ```text
//! Aperio Image Library v11.2.1
//! 46000x32914 [0,100 46000x32893] (256x256) JPEG/RGB Q=30|AppMag = 20|MPP = 0.4990
//! ```
//!
//! The first line identifies the writer; the rest is `|`-separated
//! `key = value` pairs.

use std::collections::BTreeMap;

/// Marker identifying an Aperio description.
pub const APERIO_MARKER: &str = "Aperio";

/// Parsed ImageDescription of an Aperio slide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvsMetadata {
    /// Microns per pixel at level 0
    pub mpp: Option<f64>,
    /// Objective magnification
    pub magnification: Option<f64>,
    /// Every `key = value` pair, keys prefixed with `aperio.`
    pub properties: BTreeMap<String, String>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        for part in description.split('|') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                continue;
            }

            match key {
                "MPP" => metadata.mpp = value.parse().ok(),
                "AppMag" => metadata.magnification = value.parse().ok(),
                _ => {}
            }
            metadata
                .properties
                .insert(format!("aperio.{}", key), value.to_string());
        }

        metadata
    }
}
