//! Built-in `h5_prep` step: lay down the skeleton of every output product

use super::paths::get_products_and_paths;
use super::step::{StepAction, StepArgs};
use crate::config::RunConfig;
use crate::product::ProductWriter;
use anyhow::Context;

/// Writes root attributes, grids and processing information of each product
///
/// Only products whose path appears in the step arguments are prepared; with
/// no paths given, every product of the run is. Each product is built from an
/// empty container, replacing whatever an earlier run left at its path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareProducts;

impl StepAction for PrepareProducts {
    fn run(&self, cfg: &RunConfig, args: &StepArgs) -> anyhow::Result<()> {
        let (products, out_paths) = get_products_and_paths(cfg);
        for product in products {
            let Some(path) = out_paths.get(product) else {
                continue;
            };
            if !args.paths.is_empty() && !args.paths.iter().any(|p| p == path) {
                log::debug!("{} not requested, leaving {} untouched", product, path.display());
                continue;
            }

            ProductWriter::new(cfg, product, path)
                .write_all()
                .with_context(|| format!("Failed to prepare {} product {}", product, path.display()))?;
            log::info!("Prepared {} product at {}", product, path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::GUNW_CONFIG;
    use crate::product::store;
    use crate::types::ProductType;
    use tempfile::TempDir;

    #[test]
    fn test_prepares_every_requested_product() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("gunw.h5");
        let content = GUNW_CONFIG.replace("output/gunw.h5", &output.display().to_string());
        let cfg = RunConfig::from_toml_str(&content).unwrap();
        let (_, out_paths) = get_products_and_paths(&cfg);

        let goff = out_paths.get(ProductType::GOFF).unwrap().to_path_buf();
        PrepareProducts
            .run(&cfg, &StepArgs::with_paths(vec![goff.clone()]))
            .unwrap();

        assert!(goff.exists());
        assert!(!output.exists());
        let container = store::read(&goff).unwrap();
        assert!(container.contains("/science/LSAR/GOFF/Grids/frequencyA/pixelOffsets/HH/layer1/snr"));

        PrepareProducts.run(&cfg, &StepArgs::none()).unwrap();
        for (_, path) in out_paths.iter() {
            assert!(path.exists(), "{} was not written", path.display());
        }
    }
}
