//! processingInformation metadata: algorithms used and their parameters

use super::container::{Dataset, ProductContainer};
use super::schema::{AlgorithmSet, ProductProfile};
use crate::config::{FilterType, RunConfig};
use crate::types::{InsarError, InsarResult};

fn text(value: impl Into<String>, description: &str) -> Dataset {
    Dataset::text(vec![value.into()]).attr("description", description)
}

fn count(value: usize, description: &str) -> InsarResult<Dataset> {
    let value = u32::try_from(value).map_err(|_| {
        InsarError::Configuration(format!("{} does not fit in 32 bits: {}", description, value))
    })?;
    Ok(Dataset::scalar_u32(value).attr("description", description))
}

fn filter_name(filter: FilterType) -> &'static str {
    match filter {
        FilterType::NoFilter => "None",
        FilterType::Boxcar => "boxcar",
        FilterType::Gaussian => "gaussian",
    }
}

/// Write the algorithms and parameters groups of a product
pub fn write_processing_information(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
) -> InsarResult<()> {
    write_algorithms(container, cfg, profile)?;
    write_parameters(container, cfg, profile)?;
    if profile.geocoding {
        write_geocoding_parameters(container, cfg, profile)?;
    }
    Ok(())
}

fn write_algorithms(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
) -> InsarResult<()> {
    let group = profile.paths().algorithms();
    let proc_cfg = &cfg.processing;

    container.create_dataset(
        &format!("{}/softwareVersion", group),
        text(env!("CARGO_PKG_VERSION"), "Software version used for processing"),
    )?;

    match profile.algorithms {
        AlgorithmSet::Interferogram => {
            container.create_dataset(
                &format!("{}/unwrapping", group),
                text(
                    proc_cfg.phase_unwrap.algorithm.as_str(),
                    "Algorithm used for phase unwrapping",
                ),
            )?;
            container.create_dataset(
                &format!("{}/interferogramFilter", group),
                text(
                    filter_name(proc_cfg.filter_interferogram.filter_type),
                    "Filter applied to the wrapped interferogram",
                ),
            )?;
            let ionosphere = &proc_cfg.ionosphere_phase_correction;
            let method = if ionosphere.enabled {
                ionosphere.spectral_diversity.as_str()
            } else {
                "None"
            };
            container.create_dataset(
                &format!("{}/ionosphereEstimation", group),
                text(method, "Spectral diversity method used for ionosphere estimation"),
            )?;
        }
        AlgorithmSet::Offsets => {
            container.create_dataset(
                &format!("{}/crossCorrelationDomain", group),
                text(
                    proc_cfg.offsets_product.cross_correlation_domain.as_str(),
                    "Domain of the cross-correlation used for pixel offsets estimation",
                ),
            )?;
        }
    }

    if profile.geocoding {
        container.create_dataset(
            &format!("{}/geocoding", group),
            text(
                proc_cfg.geocode.interp_method.as_str(),
                "Interpolation method used for geocoding",
            ),
        )?;
    }
    Ok(())
}

fn write_parameters(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
) -> InsarResult<()> {
    let params = profile.paths().parameters();
    let proc_cfg = &cfg.processing;

    match profile.algorithms {
        AlgorithmSet::Interferogram => {
            container.create_dataset(
                &format!("{}/interferogram/filterType", params),
                text(
                    filter_name(proc_cfg.filter_interferogram.filter_type),
                    "Type of filter applied to the interferogram",
                ),
            )?;
            container.create_dataset(
                &format!("{}/unwrap/algorithm", params),
                text(
                    proc_cfg.phase_unwrap.algorithm.as_str(),
                    "Phase unwrapping algorithm",
                ),
            )?;
            container.create_dataset(
                &format!("{}/ionosphere/enabled", params),
                text(
                    proc_cfg.ionosphere_phase_correction.enabled.to_string(),
                    "Flag indicating if the ionosphere phase screen was estimated",
                ),
            )?;
        }
        AlgorithmSet::Offsets => {
            let offsets = &proc_cfg.offsets_product;
            for (freq, _) in cfg.freq_pols() {
                let freq_group = format!("{}/frequency{}", params, freq);
                container.create_dataset(
                    &format!("{}/skipRange", freq_group),
                    count(offsets.skip_range, "Offsets skip window along slant range")?,
                )?;
                container.create_dataset(
                    &format!("{}/skipAzimuth", freq_group),
                    count(offsets.skip_azimuth, "Offsets skip window along azimuth")?,
                )?;
                for (name, layer) in offsets.layers() {
                    let layer_group = format!("{}/{}", freq_group, name);
                    container.create_dataset(
                        &format!("{}/windowRange", layer_group),
                        count(layer.window_range, "Chip window size in slant range")?,
                    )?;
                    container.create_dataset(
                        &format!("{}/windowAzimuth", layer_group),
                        count(layer.window_azimuth, "Chip window size in azimuth")?,
                    )?;
                    container.create_dataset(
                        &format!("{}/halfSearchRange", layer_group),
                        count(layer.half_search_range, "Half search window in slant range")?,
                    )?;
                    container.create_dataset(
                        &format!("{}/halfSearchAzimuth", layer_group),
                        count(layer.half_search_azimuth, "Half search window in azimuth")?,
                    )?;
                }
            }
        }
    }
    Ok(())
}

fn write_geocoding_parameters(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
) -> InsarResult<()> {
    let group = format!("{}/geocoding", profile.paths().parameters());
    container.create_dataset(
        &format!("{}/interpMethod", group),
        text(
            cfg.processing.geocode.interp_method.as_str(),
            "Interpolation method used for geocoding",
        ),
    )?;
    for (freq, _) in cfg.freq_pols() {
        let grid = cfg.geogrid(freq)?;
        let freq_group = format!("{}/frequency{}", group, freq);
        container.create_dataset(
            &format!("{}/epsg", freq_group),
            Dataset::scalar_u32(grid.epsg).attr("description", "EPSG code of the output grid"),
        )?;
        container.create_dataset(
            &format!("{}/xCoordinateSpacing", freq_group),
            Dataset::scalar_f64(grid.spacing_x).attr("description", "Output grid spacing along X"),
        )?;
        container.create_dataset(
            &format!("{}/yCoordinateSpacing", freq_group),
            Dataset::scalar_f64(grid.spacing_y).attr("description", "Output grid spacing along Y"),
        )?;
    }
    Ok(())
}
