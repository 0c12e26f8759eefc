//! Fixed product schema: group layout, root attributes and dataset tables
//!
//! Everything here is a function of the product type only; sizes come from the
//! run configuration when the writer walks the schema.

use super::container::Dtype;
use crate::types::{Frequency, Polarization, ProductType};

/// Root group of every NISAR L-band product
pub const ROOT_PATH: &str = "/science/LSAR";

/// Name of the projection dataset geocoded datasets point at
pub const GRID_MAPPING: &str = "projection";

/// Root attributes stamped once per product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductInfo {
    pub title: &'static str,
    pub reference_document: &'static str,
}

impl ProductInfo {
    pub fn for_product(product: ProductType) -> Self {
        match product {
            ProductType::RIFG => Self {
                title: "NISAR L1 RIFG Product",
                reference_document: "D-102270 NISAR NASA SDS Product Specification L1 Range Doppler Wrapped Interferogram",
            },
            ProductType::RUNW => Self {
                title: "NISAR L1 RUNW Product",
                reference_document: "D-102271 NISAR NASA SDS Product Specification L1 Range Doppler Unwrapped Interferogram",
            },
            ProductType::ROFF => Self {
                title: "NISAR L1 ROFF Product",
                reference_document: "D-105009 NISAR NASA SDS Product Specification L1 Range Doppler Pixel Offsets",
            },
            ProductType::GUNW => Self {
                title: "NISAR L2 GUNW Product",
                reference_document: "D-102272 NISAR NASA SDS Product Specification L2 Geocoded Unwrapped Interferogram",
            },
            ProductType::GOFF => Self {
                title: "NISAR L2 GOFF Product",
                reference_document: "D-105010 NISAR NASA SDS Product Specification L2 Geocoded Pixel Offsets",
            },
        }
    }
}

/// Group paths of one product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPaths {
    product: ProductType,
}

impl GroupPaths {
    pub fn new(product: ProductType) -> Self {
        Self { product }
    }

    pub fn identification(&self) -> String {
        format!("{}/identification", ROOT_PATH)
    }

    pub fn product(&self) -> String {
        format!("{}/{}", ROOT_PATH, self.product)
    }

    pub fn metadata(&self) -> String {
        format!("{}/metadata", self.product())
    }

    pub fn processing_information(&self) -> String {
        format!("{}/processingInformation", self.metadata())
    }

    pub fn algorithms(&self) -> String {
        format!("{}/algorithms", self.processing_information())
    }

    pub fn parameters(&self) -> String {
        format!("{}/parameters", self.processing_information())
    }

    /// Geocoded grids (L2)
    pub fn grids(&self) -> String {
        format!("{}/Grids", self.product())
    }

    /// Radar-geometry swaths (L1)
    pub fn swaths(&self) -> String {
        format!("{}/Swaths", self.product())
    }
}

/// Description of one dataset of a layer group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub name: &'static str,
    pub dtype: Dtype,
    pub description: &'static str,
    pub units: &'static str,
}

pub const PIXEL_OFFSET_DATASETS: [DatasetSpec; 7] = [
    DatasetSpec {
        name: "alongTrackOffset",
        dtype: Dtype::Float32,
        description: "Raw (unculled, unfiltered) along-track pixel offsets",
        units: "meters",
    },
    DatasetSpec {
        name: "slantRangeOffset",
        dtype: Dtype::Float32,
        description: "Raw (unculled, unfiltered) slant range pixel offsets",
        units: "meters",
    },
    DatasetSpec {
        name: "alongTrackOffsetVariance",
        dtype: Dtype::Float32,
        description: "Along-track pixel offsets variance",
        units: "unitless",
    },
    DatasetSpec {
        name: "slantRangeOffsetVariance",
        dtype: Dtype::Float32,
        description: "Slant range pixel offsets variance",
        units: "unitless",
    },
    DatasetSpec {
        name: "crossOffsetVariance",
        dtype: Dtype::Float32,
        description: "Off-diagonal term of the pixel offsets covariance matrix",
        units: "unitless",
    },
    DatasetSpec {
        name: "correlationSurfacePeak",
        dtype: Dtype::Float32,
        description: "Normalized surface correlation peak",
        units: "unitless",
    },
    DatasetSpec {
        name: "snr",
        dtype: Dtype::Float32,
        description: "Pixel offsets signal-to-noise ratio",
        units: "unitless",
    },
];

pub const WRAPPED_INTERFEROGRAM_DATASETS: [DatasetSpec; 2] = [
    DatasetSpec {
        name: "wrappedInterferogram",
        dtype: Dtype::Complex64,
        description: "Interferogram between the reference and secondary SLCs",
        units: "unitless",
    },
    DatasetSpec {
        name: "coherenceMagnitude",
        dtype: Dtype::Float32,
        description: "Coherence magnitude between the reference and secondary SLCs",
        units: "unitless",
    },
];

pub const UNWRAPPED_INTERFEROGRAM_DATASETS: [DatasetSpec; 4] = [
    DatasetSpec {
        name: "unwrappedPhase",
        dtype: Dtype::Float32,
        description: "Unwrapped interferometric phase",
        units: "radians",
    },
    DatasetSpec {
        name: "coherenceMagnitude",
        dtype: Dtype::Float32,
        description: "Coherence magnitude between the reference and secondary SLCs",
        units: "unitless",
    },
    DatasetSpec {
        name: "connectedComponents",
        dtype: Dtype::UInt32,
        description: "Connected components of the unwrapped interferogram",
        units: "unitless",
    },
    DatasetSpec {
        name: "ionospherePhaseScreen",
        dtype: Dtype::Float32,
        description: "Ionosphere phase screen",
        units: "radians",
    },
];

/// Shared grid routine: where frequency groups live and how axes are described
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridBase {
    /// Slant range / zero-Doppler time axes
    Swaths,
    /// Projected x/y axes with a projection dataset
    Grids,
}

/// Per-polarization content of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerContent {
    WrappedInterferogram,
    UnwrappedInterferogram,
    /// One group per offsets layer below each polarization
    PixelOffsets,
}

impl LayerContent {
    pub fn group_name(&self) -> &'static str {
        match self {
            LayerContent::WrappedInterferogram => "interferogram",
            LayerContent::UnwrappedInterferogram => "unwrappedInterferogram",
            LayerContent::PixelOffsets => "pixelOffsets",
        }
    }

    pub fn datasets(&self) -> &'static [DatasetSpec] {
        match self {
            LayerContent::WrappedInterferogram => &WRAPPED_INTERFEROGRAM_DATASETS,
            LayerContent::UnwrappedInterferogram => &UNWRAPPED_INTERFEROGRAM_DATASETS,
            LayerContent::PixelOffsets => &PIXEL_OFFSET_DATASETS,
        }
    }

    pub fn has_layers(&self) -> bool {
        matches!(self, LayerContent::PixelOffsets)
    }
}

/// Which algorithm and parameter metadata a product records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmSet {
    Interferogram,
    Offsets,
}

/// Capability set a writer is composed of for one product type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductProfile {
    pub product: ProductType,
    pub base: GridBase,
    pub content: LayerContent,
    pub algorithms: AlgorithmSet,
    /// Record geocoding algorithm and parameters (L2 only)
    pub geocoding: bool,
}

impl ProductProfile {
    pub fn for_product(product: ProductType) -> Self {
        let (base, content, algorithms) = match product {
            ProductType::RIFG => (
                GridBase::Swaths,
                LayerContent::WrappedInterferogram,
                AlgorithmSet::Interferogram,
            ),
            ProductType::RUNW => (
                GridBase::Swaths,
                LayerContent::UnwrappedInterferogram,
                AlgorithmSet::Interferogram,
            ),
            ProductType::ROFF => (
                GridBase::Swaths,
                LayerContent::PixelOffsets,
                AlgorithmSet::Offsets,
            ),
            ProductType::GUNW => (
                GridBase::Grids,
                LayerContent::UnwrappedInterferogram,
                AlgorithmSet::Interferogram,
            ),
            ProductType::GOFF => (
                GridBase::Grids,
                LayerContent::PixelOffsets,
                AlgorithmSet::Offsets,
            ),
        };
        Self {
            product,
            base,
            content,
            algorithms,
            geocoding: product.is_geocoded(),
        }
    }

    pub fn paths(&self) -> GroupPaths {
        GroupPaths::new(self.product)
    }

    pub fn info(&self) -> ProductInfo {
        ProductInfo::for_product(self.product)
    }

    /// `{Grids|Swaths}/frequency{F}`
    pub fn frequency_group(&self, freq: Frequency) -> String {
        let base = match self.base {
            GridBase::Swaths => self.paths().swaths(),
            GridBase::Grids => self.paths().grids(),
        };
        format!("{}/frequency{}", base, freq)
    }

    /// `.../frequency{F}/{content}`
    pub fn content_group(&self, freq: Frequency) -> String {
        format!("{}/{}", self.frequency_group(freq), self.content.group_name())
    }

    /// Group holding the datasets of one polarization (and layer)
    pub fn layer_group(&self, freq: Frequency, pol: Polarization, layer: Option<&str>) -> String {
        match layer {
            Some(layer) => format!("{}/{}/{}", self.content_group(freq), pol, layer),
            None => format!("{}/{}", self.content_group(freq), pol),
        }
    }
}
