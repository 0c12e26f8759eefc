use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Complex-valued interferogram sample (I + jQ)
pub type InsarComplex = Complex<f32>;

/// Radar frequency band of a NISAR acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Frequency {
    A,
    B,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::A => write!(f, "A"),
            Frequency::B => write!(f, "B"),
        }
    }
}

/// Transmit/receive polarization channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Polarization {
    HH,
    HV,
    VH,
    VV,
}

impl fmt::Display for Polarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarization::HH => write!(f, "HH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::VV => write!(f, "VV"),
        }
    }
}

/// InSAR product types emitted by the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProductType {
    /// L1 range-Doppler wrapped interferogram
    RIFG,
    /// L1 range-Doppler unwrapped interferogram
    RUNW,
    /// L1 range-Doppler pixel offsets
    ROFF,
    /// L2 geocoded unwrapped interferogram
    GUNW,
    /// L2 geocoded pixel offsets
    GOFF,
}

impl ProductType {
    pub const ALL: [ProductType; 5] = [
        ProductType::RIFG,
        ProductType::RUNW,
        ProductType::ROFF,
        ProductType::GUNW,
        ProductType::GOFF,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::RIFG => "RIFG",
            ProductType::RUNW => "RUNW",
            ProductType::ROFF => "ROFF",
            ProductType::GUNW => "GUNW",
            ProductType::GOFF => "GOFF",
        }
    }

    /// Processing level, "L1" for radar geometry and "L2" for geocoded products
    pub fn level(&self) -> &'static str {
        if self.is_geocoded() {
            "L2"
        } else {
            "L1"
        }
    }

    pub fn is_geocoded(&self) -> bool {
        matches!(self, ProductType::GUNW | ProductType::GOFF)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = InsarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RIFG" => Ok(ProductType::RIFG),
            "RUNW" => Ok(ProductType::RUNW),
            "ROFF" => Ok(ProductType::ROFF),
            "GUNW" => Ok(ProductType::GUNW),
            "GOFF" => Ok(ProductType::GOFF),
            _ => Err(InsarError::Configuration(format!(
                "Unknown product type: {}",
                s
            ))),
        }
    }
}

/// Geographic sampling grid of one frequency band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geogrid {
    /// Easting/longitude of the first column
    pub start_x: f64,
    /// Northing/latitude of the first row
    pub start_y: f64,
    pub spacing_x: f64,
    /// Usually negative (north-up grids)
    pub spacing_y: f64,
    pub width: usize,
    pub length: usize,
    pub epsg: u32,
}

impl Geogrid {
    pub fn shape(&self) -> (usize, usize) {
        (self.length, self.width)
    }

    pub fn x_coordinates(&self) -> Vec<f64> {
        (0..self.width)
            .map(|i| self.start_x + i as f64 * self.spacing_x)
            .collect()
    }

    pub fn y_coordinates(&self) -> Vec<f64> {
        (0..self.length)
            .map(|i| self.start_y + i as f64 * self.spacing_y)
            .collect()
    }

    /// CF grid mapping name for the grid's EPSG code
    pub fn grid_mapping_name(&self) -> &'static str {
        match self.epsg {
            4326 => "latitude_longitude",
            3031 | 3413 => "polar_stereographic",
            32601..=32660 | 32701..=32760 => "universal_transverse_mercator",
            _ => "projected",
        }
    }
}

/// Slant-range / zero-Doppler sampling of one frequency band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarGrid {
    pub length: usize,
    pub width: usize,
    /// Slant range to the first sample (meters)
    #[serde(default)]
    pub starting_range: f64,
    #[serde(default = "default_unit_spacing")]
    pub range_pixel_spacing: f64,
    /// Azimuth time of the first line (seconds since reference epoch)
    #[serde(default)]
    pub sensing_start: f64,
    #[serde(default = "default_unit_spacing")]
    pub azimuth_time_interval: f64,
}

fn default_unit_spacing() -> f64 {
    1.0
}

impl RadarGrid {
    /// Grid shape after decimating by the given skips
    pub fn decimated_shape(&self, skip_azimuth: usize, skip_range: usize) -> (usize, usize) {
        (
            self.length / skip_azimuth.max(1),
            self.width / skip_range.max(1),
        )
    }

    pub fn slant_range(&self, skip_range: usize) -> Vec<f64> {
        let skip = skip_range.max(1);
        (0..self.width / skip)
            .map(|i| self.starting_range + (i * skip) as f64 * self.range_pixel_spacing)
            .collect()
    }

    pub fn zero_doppler_time(&self, skip_azimuth: usize) -> Vec<f64> {
        let skip = skip_azimuth.max(1);
        (0..self.length / skip)
            .map(|i| self.sensing_start + (i * skip) as f64 * self.azimuth_time_interval)
            .collect()
    }
}

/// Error types for InSAR workflow and product operations
#[derive(Debug, thiserror::Error)]
pub enum InsarError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema consistency error: {0}")]
    SchemaConsistency(String),

    #[error("Step '{step}' failed: {error:#}")]
    StepExecution {
        step: &'static str,
        error: anyhow::Error,
    },

    #[error("Writer state error: cannot {operation} while {state}")]
    WriterState {
        operation: &'static str,
        state: String,
    },

    #[error("Ledger corrupt at line {line}: {reason}")]
    LedgerCorrupt { line: usize, reason: String },

    #[error("Invalid container format: {0}")]
    ContainerFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for InSAR operations
pub type InsarResult<T> = Result<T, InsarError>;
