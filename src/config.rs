//! Typed run configuration for the InSAR workflow
//!
//! The configuration is deserialized once and validated once, so that missing
//! or misnamed keys surface at load time rather than deep inside a step.

use crate::types::{Frequency, Geogrid, InsarError, InsarResult, Polarization, ProductType, RadarGrid};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete run configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    pub primary_executable: PrimaryExecutable,
    pub product_path_group: ProductPathGroup,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Ledger file used for restartable runs
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrimaryExecutable {
    pub product_type: ProductType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductPathGroup {
    pub sas_output_file: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    pub input_subset: InputSubset,
    #[serde(default)]
    pub dense_offsets: Toggle,
    #[serde(default)]
    pub offsets_product: OffsetsProductConfig,
    #[serde(default)]
    pub rubbersheet: Toggle,
    #[serde(default)]
    pub fine_resample: Toggle,
    #[serde(default)]
    pub filter_interferogram: FilterConfig,
    #[serde(default)]
    pub phase_unwrap: UnwrapConfig,
    #[serde(default)]
    pub ionosphere_phase_correction: IonosphereConfig,
    #[serde(default)]
    pub geocode: GeocodeConfig,
    /// Radar sampling per frequency, required for L1 products
    #[serde(default)]
    pub radar_grids: BTreeMap<Frequency, RadarGrid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputSubset {
    pub list_of_frequencies: BTreeMap<Frequency, Vec<Polarization>>,
}

/// Plain `enabled` flag shared by several processing sections
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Toggle {
    #[serde(default)]
    pub enabled: bool,
}

/// Pixel offsets product parameters
///
/// Every table whose key starts with `layer` is one offset-estimation pass.
#[derive(Debug, Clone, Deserialize)]
pub struct OffsetsProductConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_skip")]
    pub skip_range: usize,
    #[serde(default = "default_skip")]
    pub skip_azimuth: usize,
    #[serde(default = "default_correlation_domain")]
    pub cross_correlation_domain: String,
    #[serde(flatten)]
    pub tables: BTreeMap<String, OffsetLayer>,
}

impl Default for OffsetsProductConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            skip_range: default_skip(),
            skip_azimuth: default_skip(),
            cross_correlation_domain: default_correlation_domain(),
            tables: BTreeMap::new(),
        }
    }
}

fn default_skip() -> usize {
    1
}

fn default_correlation_domain() -> String {
    "frequency".to_string()
}

impl OffsetsProductConfig {
    /// Layer names with their parameters, in key order
    pub fn layers(&self) -> impl Iterator<Item = (&str, &OffsetLayer)> {
        self.tables
            .iter()
            .filter(|(name, _)| name.starts_with("layer"))
            .map(|(name, layer)| (name.as_str(), layer))
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers().map(|(name, _)| name).collect()
    }
}

/// Parameters of one offset-estimation layer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OffsetLayer {
    #[serde(default = "default_window")]
    pub window_range: usize,
    #[serde(default = "default_window")]
    pub window_azimuth: usize,
    #[serde(default = "default_half_search")]
    pub half_search_range: usize,
    #[serde(default = "default_half_search")]
    pub half_search_azimuth: usize,
}

impl Default for OffsetLayer {
    fn default() -> Self {
        Self {
            window_range: default_window(),
            window_azimuth: default_window(),
            half_search_range: default_half_search(),
            half_search_azimuth: default_half_search(),
        }
    }
}

fn default_window() -> usize {
    64
}

fn default_half_search() -> usize {
    20
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    #[default]
    NoFilter,
    Boxcar,
    Gaussian,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub filter_type: FilterType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnwrapConfig {
    #[serde(default = "default_unwrap_algorithm")]
    pub algorithm: String,
}

impl Default for UnwrapConfig {
    fn default() -> Self {
        Self {
            algorithm: default_unwrap_algorithm(),
        }
    }
}

fn default_unwrap_algorithm() -> String {
    "icu".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct IonosphereConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_spectral_diversity")]
    pub spectral_diversity: String,
}

impl Default for IonosphereConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spectral_diversity: default_spectral_diversity(),
        }
    }
}

fn default_spectral_diversity() -> String {
    "split_main_band".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeConfig {
    #[serde(default = "default_interp_method")]
    pub interp_method: String,
    /// Output grid per frequency, required for L2 products
    #[serde(default)]
    pub geogrids: BTreeMap<Frequency, Geogrid>,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            interp_method: default_interp_method(),
            geogrids: BTreeMap::new(),
        }
    }
}

fn default_interp_method() -> String {
    "bilinear".to_string()
}

impl RunConfig {
    /// Parse and validate a TOML run configuration
    pub fn from_toml_str(content: &str) -> InsarResult<Self> {
        let cfg: RunConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> InsarResult<Self> {
        let path = path.as_ref();
        log::info!("Loading run configuration: {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| {
            InsarError::Configuration(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Selected (frequency, polarizations) pairs in frequency order
    pub fn freq_pols(&self) -> impl Iterator<Item = (Frequency, &[Polarization])> {
        self.processing
            .input_subset
            .list_of_frequencies
            .iter()
            .map(|(freq, pols)| (*freq, pols.as_slice()))
    }

    /// Products generated for the configured primary product, in dependency order
    ///
    /// Offsets products ride along with the interferometric chain whenever the
    /// offsets product is enabled.
    pub fn product_chain(&self) -> Vec<ProductType> {
        use ProductType::*;
        let offsets = self.processing.offsets_product.enabled;
        let mut chain = match self.primary_executable.product_type {
            RIFG => vec![RIFG],
            RUNW => vec![RIFG, RUNW],
            GUNW => vec![RIFG, RUNW, GUNW],
            ROFF | GOFF => Vec::new(),
        };
        if offsets {
            chain.push(ROFF);
            if chain.contains(&GUNW) {
                chain.push(GOFF);
            }
        }
        chain
    }

    pub fn geogrid(&self, freq: Frequency) -> InsarResult<&Geogrid> {
        self.processing.geocode.geogrids.get(&freq).ok_or_else(|| {
            InsarError::Configuration(format!("No geogrid defined for frequency {}", freq))
        })
    }

    pub fn radar_grid(&self, freq: Frequency) -> InsarResult<&RadarGrid> {
        self.processing.radar_grids.get(&freq).ok_or_else(|| {
            InsarError::Configuration(format!("No radar grid defined for frequency {}", freq))
        })
    }

    /// Check cross-section constraints that serde cannot express
    pub fn validate(&self) -> InsarResult<()> {
        let primary = self.primary_executable.product_type;
        if matches!(primary, ProductType::ROFF | ProductType::GOFF) {
            return Err(InsarError::Configuration(format!(
                "{} is not a primary InSAR product; enable offsets_product to generate it",
                primary
            )));
        }

        let selection = &self.processing.input_subset.list_of_frequencies;
        if selection.is_empty() {
            return Err(InsarError::Configuration(
                "input_subset.list_of_frequencies is empty".to_string(),
            ));
        }
        for (freq, pols) in selection {
            if pols.is_empty() {
                return Err(InsarError::Configuration(format!(
                    "No polarizations selected for frequency {}",
                    freq
                )));
            }
        }

        let offsets = &self.processing.offsets_product;
        if let Some(name) = offsets.tables.keys().find(|k| !k.starts_with("layer")) {
            return Err(InsarError::Configuration(format!(
                "Unrecognized offsets_product table '{}'",
                name
            )));
        }
        if offsets.skip_range == 0 || offsets.skip_azimuth == 0 {
            return Err(InsarError::Configuration(
                "offsets_product skips must be positive".to_string(),
            ));
        }

        let chain = self.product_chain();
        let needs_offsets = chain
            .iter()
            .any(|p| matches!(p, ProductType::ROFF | ProductType::GOFF));
        if needs_offsets && offsets.layers().next().is_none() {
            return Err(InsarError::Configuration(
                "Offsets products require at least one offsets_product layer".to_string(),
            ));
        }

        let needs_geogrid = chain.iter().any(|p| p.is_geocoded());
        let needs_radar_grid = chain.iter().any(|p| !p.is_geocoded());
        for freq in selection.keys() {
            if needs_geogrid {
                let grid = self.geogrid(*freq)?;
                if grid.length == 0 || grid.width == 0 {
                    return Err(InsarError::Configuration(format!(
                        "Geogrid for frequency {} has empty shape {}x{}",
                        freq, grid.length, grid.width
                    )));
                }
                if grid.spacing_x == 0.0 || grid.spacing_y == 0.0 {
                    return Err(InsarError::Configuration(format!(
                        "Geogrid for frequency {} has zero spacing",
                        freq
                    )));
                }
            }
            if needs_radar_grid {
                let grid = self.radar_grid(*freq)?;
                let (length, width) =
                    grid.decimated_shape(offsets.skip_azimuth, offsets.skip_range);
                if grid.length == 0 || grid.width == 0 || length == 0 || width == 0 {
                    return Err(InsarError::Configuration(format!(
                        "Radar grid for frequency {} is empty after decimation",
                        freq
                    )));
                }
            }
        }

        log::debug!(
            "Validated run configuration for {} ({} frequencies)",
            primary,
            selection.len()
        );
        Ok(())
    }
}
