//! Grid and layer datasets of a product
//!
//! The base routine lays down one frequency group per selected frequency with
//! its coordinate vectors; the layer routine then declares every content
//! dataset on that grid, bound to the coordinates as dimension scales.

use super::container::{Dataset, ProductContainer};
use super::schema::{DatasetSpec, GridBase, LayerContent, ProductProfile, GRID_MAPPING};
use crate::config::RunConfig;
use crate::types::{Frequency, InsarResult, Polarization};

/// Names of the two coordinate datasets of a frequency group, outermost first
pub fn coordinate_names(base: GridBase) -> [&'static str; 2] {
    match base {
        GridBase::Grids => ["yCoordinates", "xCoordinates"],
        GridBase::Swaths => ["zeroDopplerTime", "slantRange"],
    }
}

/// (rows, columns) of every content dataset of one frequency
pub fn grid_shape(cfg: &RunConfig, profile: &ProductProfile, freq: Frequency) -> InsarResult<(usize, usize)> {
    match profile.base {
        GridBase::Grids => Ok(cfg.geogrid(freq)?.shape()),
        GridBase::Swaths => {
            let (skip_az, skip_rg) = swath_skips(cfg, profile.content);
            Ok(cfg.radar_grid(freq)?.decimated_shape(skip_az, skip_rg))
        }
    }
}

/// Offsets are estimated on a decimated radar grid, interferograms are not
fn swath_skips(cfg: &RunConfig, content: LayerContent) -> (usize, usize) {
    let offsets = &cfg.processing.offsets_product;
    match content {
        LayerContent::PixelOffsets => (offsets.skip_azimuth, offsets.skip_range),
        _ => (1, 1),
    }
}

/// Write the frequency groups, polarization lists and coordinate vectors
pub fn write_base_grids(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
) -> InsarResult<()> {
    for (freq, pols) in cfg.freq_pols() {
        let freq_group = profile.frequency_group(freq);
        container.require_group(&freq_group)?;

        let pol_names = pols.iter().map(Polarization::to_string).collect();
        container.create_dataset(
            &format!("{}/listOfPolarizations", freq_group),
            Dataset::text(pol_names)
                .attr("description", format!("List of processed polarization layers for frequency {}", freq)),
        )?;

        match profile.base {
            GridBase::Grids => write_geo_coordinates(container, cfg, freq, &freq_group)?,
            GridBase::Swaths => write_radar_coordinates(container, cfg, profile, freq, &freq_group)?,
        }
    }
    Ok(())
}

fn write_geo_coordinates(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    freq: Frequency,
    freq_group: &str,
) -> InsarResult<()> {
    let grid = cfg.geogrid(freq)?;
    let units = if grid.epsg == 4326 { "degrees" } else { "meters" };

    container.create_dataset(
        &format!("{}/xCoordinates", freq_group),
        Dataset::vector_f64(grid.x_coordinates())
            .attr("description", "CF compliant dimension associated with the X coordinate")
            .attr("standard_name", "projection_x_coordinate")
            .attr("long_name", "x coordinate of projection")
            .attr("units", units),
    )?;
    container.create_dataset(
        &format!("{}/yCoordinates", freq_group),
        Dataset::vector_f64(grid.y_coordinates())
            .attr("description", "CF compliant dimension associated with the Y coordinate")
            .attr("standard_name", "projection_y_coordinate")
            .attr("long_name", "y coordinate of projection")
            .attr("units", units),
    )?;
    container.create_dataset(
        &format!("{}/xCoordinateSpacing", freq_group),
        Dataset::scalar_f64(grid.spacing_x)
            .attr("description", "Nominal spacing in meters between consecutive pixels")
            .attr("units", units),
    )?;
    container.create_dataset(
        &format!("{}/yCoordinateSpacing", freq_group),
        Dataset::scalar_f64(grid.spacing_y)
            .attr("description", "Nominal spacing in meters between consecutive lines")
            .attr("units", units),
    )?;
    container.create_dataset(
        &format!("{}/{}", freq_group, GRID_MAPPING),
        Dataset::scalar_u32(grid.epsg)
            .attr("epsg_code", i64::from(grid.epsg))
            .attr("grid_mapping_name", grid.grid_mapping_name())
            .attr("description", "Product map grid projection: EPSG code"),
    )?;
    Ok(())
}

fn write_radar_coordinates(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
    freq: Frequency,
    freq_group: &str,
) -> InsarResult<()> {
    let grid = cfg.radar_grid(freq)?;
    let (skip_az, skip_rg) = swath_skips(cfg, profile.content);

    container.create_dataset(
        &format!("{}/slantRange", freq_group),
        Dataset::vector_f64(grid.slant_range(skip_rg))
            .attr("description", "Slant range coordinates of the grid")
            .attr("units", "meters"),
    )?;
    container.create_dataset(
        &format!("{}/zeroDopplerTime", freq_group),
        Dataset::vector_f64(grid.zero_doppler_time(skip_az))
            .attr("description", "Zero Doppler azimuth time coordinates of the grid")
            .attr("units", "seconds"),
    )?;
    container.create_dataset(
        &format!("{}/slantRangeSpacing", freq_group),
        Dataset::scalar_f64(grid.range_pixel_spacing * skip_rg as f64)
            .attr("description", "Slant range spacing of the grid")
            .attr("units", "meters"),
    )?;
    container.create_dataset(
        &format!("{}/zeroDopplerTimeSpacing", freq_group),
        Dataset::scalar_f64(grid.azimuth_time_interval * skip_az as f64)
            .attr("description", "Time interval in the along-track direction of the grid")
            .attr("units", "seconds"),
    )?;
    Ok(())
}

/// Declare every content dataset for each frequency, polarization and layer
pub fn write_layers(
    container: &mut ProductContainer,
    cfg: &RunConfig,
    profile: &ProductProfile,
) -> InsarResult<()> {
    let layer_names: Vec<Option<&str>> = if profile.content.has_layers() {
        cfg.processing
            .offsets_product
            .layer_names()
            .into_iter()
            .map(Some)
            .collect()
    } else {
        vec![None]
    };

    for (freq, pols) in cfg.freq_pols() {
        let (rows, cols) = grid_shape(cfg, profile, freq)?;
        let freq_group = profile.frequency_group(freq);
        let scales: Vec<String> = coordinate_names(profile.base)
            .iter()
            .map(|name| format!("{}/{}", freq_group, name))
            .collect();

        for pol in pols {
            for layer in &layer_names {
                let group = profile.layer_group(freq, *pol, *layer);
                container.require_group(&group)?;
                for spec in content_datasets(cfg, profile.content) {
                    let mut dataset = declare(spec, rows, cols, &scales);
                    if profile.base == GridBase::Grids {
                        dataset = dataset.attr("grid_mapping", GRID_MAPPING);
                    }
                    let path = format!("{}/{}", group, spec.name);
                    // values already written on this grid survive a rewrite
                    dataset.values = container
                        .dataset_mut(&path)
                        .and_then(|old| old.values.take())
                        .filter(|values| values.dtype() == spec.dtype && values.shape() == [rows, cols]);
                    container.create_dataset(&path, dataset)?;
                }
                log::debug!("Declared {} datasets in {}", profile.content.group_name(), group);
            }
        }
    }
    Ok(())
}

/// Content datasets this run produces; the ionosphere screen only when estimated
fn content_datasets<'a>(
    cfg: &'a RunConfig,
    content: LayerContent,
) -> impl Iterator<Item = &'static DatasetSpec> + 'a {
    let ionosphere = cfg.processing.ionosphere_phase_correction.enabled;
    content
        .datasets()
        .iter()
        .filter(move |spec| ionosphere || spec.name != "ionospherePhaseScreen")
}

fn declare(spec: &DatasetSpec, rows: usize, cols: usize, scales: &[String]) -> Dataset {
    let mut dataset = Dataset::declared(&[rows, cols], spec.dtype)
        .attr("description", spec.description)
        .attr("units", spec.units)
        .attr("long_name", spec.name);
    dataset.dimension_scales = scales.to_vec();
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::GUNW_CONFIG;
    use crate::product::container::{AttrValue, DatasetValues, Dtype};
    use crate::types::ProductType;
    use approx::assert_relative_eq;
    use ndarray::Ix1;

    fn gunw_config() -> RunConfig {
        RunConfig::from_toml_str(GUNW_CONFIG).unwrap()
    }

    #[test]
    fn test_goff_grids_on_geogrid() {
        let cfg = gunw_config();
        let profile = ProductProfile::for_product(ProductType::GOFF);
        let mut container = ProductContainer::new();
        write_base_grids(&mut container, &cfg, &profile).unwrap();
        write_layers(&mut container, &cfg, &profile).unwrap();

        let freq_group = "/science/LSAR/GOFF/Grids/frequencyA";
        let x = container.dataset(&format!("{}/xCoordinates", freq_group)).unwrap();
        assert_eq!(x.shape, vec![50]);
        let projection = container.dataset(&format!("{}/projection", freq_group)).unwrap();
        assert_eq!(projection.attrs.get("epsg_code"), Some(&AttrValue::Int(32611)));

        let snr = container
            .dataset(&format!("{}/pixelOffsets/HH/layer1/snr", freq_group))
            .unwrap();
        assert_eq!(snr.shape, vec![100, 50]);
        assert_eq!(snr.dtype, Dtype::Float32);
        assert_eq!(snr.text_attr("grid_mapping"), Some("projection"));
        assert_eq!(
            snr.dimension_scales,
            vec![
                format!("{}/yCoordinates", freq_group),
                format!("{}/xCoordinates", freq_group)
            ]
        );
    }

    #[test]
    fn test_roff_grid_is_decimated() {
        let content = GUNW_CONFIG.replace(
            "[processing.offsets_product]\nenabled = true",
            "[processing.offsets_product]\nenabled = true\nskip_range = 4\nskip_azimuth = 8",
        );
        let cfg = RunConfig::from_toml_str(&content).unwrap();
        let profile = ProductProfile::for_product(ProductType::ROFF);
        assert_eq!(grid_shape(&cfg, &profile, Frequency::A).unwrap(), (50, 50));

        let mut container = ProductContainer::new();
        write_base_grids(&mut container, &cfg, &profile).unwrap();
        let rng = container
            .dataset("/science/LSAR/ROFF/Swaths/frequencyA/slantRange")
            .unwrap();
        assert_eq!(rng.shape, vec![50]);
        match &rng.values {
            Some(DatasetValues::Float64(values)) => {
                let values = values.clone().into_dimensionality::<Ix1>().unwrap();
                assert_relative_eq!(values[1], 4.0);
            }
            other => panic!("unexpected slant range values: {:?}", other),
        }
    }

    #[test]
    fn test_ionosphere_screen_only_when_enabled() {
        let cfg = gunw_config();
        let profile = ProductProfile::for_product(ProductType::GUNW);
        let mut container = ProductContainer::new();
        write_base_grids(&mut container, &cfg, &profile).unwrap();
        write_layers(&mut container, &cfg, &profile).unwrap();

        let group = profile.layer_group(Frequency::A, Polarization::HH, None);
        assert!(container.contains(&format!("{}/unwrappedPhase", group)));
        assert!(!container.contains(&format!("{}/ionospherePhaseScreen", group)));
        let components = container
            .dataset(&format!("{}/connectedComponents", group))
            .unwrap();
        assert_eq!(components.dtype, Dtype::UInt32);
    }
}
