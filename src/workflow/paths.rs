use crate::config::RunConfig;
use crate::types::{InsarError, InsarResult, ProductType};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Output product paths keyed by product type, fixed for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputPaths {
    paths: BTreeMap<ProductType, PathBuf>,
}

impl OutputPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, product: ProductType, path: impl Into<PathBuf>) {
        self.paths.insert(product, path.into());
    }

    pub fn with(mut self, product: ProductType, path: impl Into<PathBuf>) -> Self {
        self.insert(product, path);
        self
    }

    pub fn remove(&mut self, product: ProductType) -> Option<PathBuf> {
        self.paths.remove(&product)
    }

    pub fn get(&self, product: ProductType) -> Option<&Path> {
        self.paths.get(&product).map(PathBuf::as_path)
    }

    /// Path a step cannot run without
    pub fn require(&self, product: ProductType, needed_by: &str) -> InsarResult<PathBuf> {
        self.paths.get(&product).cloned().ok_or_else(|| {
            InsarError::Configuration(format!(
                "Step '{}' requires a {} output path",
                needed_by, product
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProductType, &Path)> {
        self.paths.iter().map(|(product, path)| (*product, path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Products to generate for this run and where to write them
///
/// The requested product lands at `sas_output_file`; every product it depends
/// on is written next to it as `{stem}_{TAG}` with the same extension.
pub fn get_products_and_paths(cfg: &RunConfig) -> (Vec<ProductType>, OutputPaths) {
    let primary = cfg.primary_executable.product_type;
    let sas_output = &cfg.product_path_group.sas_output_file;
    let stem = sas_output.with_extension("");
    let stem = stem.to_string_lossy();
    let extension = sas_output
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    let products = cfg.product_chain();
    let mut out_paths = OutputPaths::new();
    for product in &products {
        if *product == primary {
            out_paths.insert(*product, sas_output.clone());
        } else {
            out_paths.insert(*product, format!("{}_{}{}", stem, product, extension));
        }
    }

    log::debug!("Output products for {}: {:?}", primary, out_paths);
    (products, out_paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::GUNW_CONFIG;

    #[test]
    fn test_gunw_products_and_paths() {
        let cfg = RunConfig::from_toml_str(GUNW_CONFIG).unwrap();
        let (products, out_paths) = get_products_and_paths(&cfg);

        assert_eq!(products.len(), 5);
        assert_eq!(out_paths.get(ProductType::GUNW), Some(Path::new("output/gunw.h5")));
        assert_eq!(
            out_paths.get(ProductType::RIFG),
            Some(Path::new("output/gunw_RIFG.h5"))
        );
        assert_eq!(
            out_paths.get(ProductType::GOFF),
            Some(Path::new("output/gunw_GOFF.h5"))
        );
    }

    #[test]
    fn test_dependent_products_share_output_extension() {
        let content = GUNW_CONFIG.replace("output/gunw.h5", "output/gunw.insar");
        let cfg = RunConfig::from_toml_str(&content).unwrap();
        let (_, out_paths) = get_products_and_paths(&cfg);
        assert_eq!(
            out_paths.get(ProductType::RUNW),
            Some(Path::new("output/gunw_RUNW.insar"))
        );

        let content = GUNW_CONFIG.replace("output/gunw.h5", "output/gunw");
        let cfg = RunConfig::from_toml_str(&content).unwrap();
        let (_, out_paths) = get_products_and_paths(&cfg);
        assert_eq!(out_paths.get(ProductType::ROFF), Some(Path::new("output/gunw_ROFF")));
    }

    #[test]
    fn test_require_missing_path() {
        let out_paths = OutputPaths::new().with(ProductType::RIFG, "rifg.h5");
        assert!(out_paths.require(ProductType::RIFG, "crossmul").is_ok());
        assert!(matches!(
            out_paths.require(ProductType::RUNW, "geocode"),
            Err(InsarError::Configuration(msg)) if msg.contains("geocode")
        ));
    }
}
