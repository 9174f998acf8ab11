pub mod pipes;
pub mod run;

use std::path::{Path, PathBuf};

use folio::SiteConfig;

/// Load the site file, returning it with the directory relative stage paths
/// resolve against.
pub fn load_site(config_file: &Path) -> Result<(SiteConfig, PathBuf), anyhow::Error> {
    let config_path = if config_file.is_relative() {
        std::env::current_dir()?.join(config_file)
    } else {
        config_file.to_path_buf()
    };

    let site = SiteConfig::load_from_arg(Some(config_path.as_path()))?;
    let base_path = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((site, base_path))
}
