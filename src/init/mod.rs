//! `bidforge init`: create the `.bidforge/` directory in a project.
//!
//! ```text
//! .bidforge/
//! ├── bidforge.toml    # Configuration (defaults written on first init)
//! ├── catalog.json     # Past proposals, references and personnel for lookups
//! ├── checkpoints/     # One JSON checkpoint per workflow
//! └── logs/            # bidforge.log
//! ```

use crate::config::{BidforgeToml, CONFIG_FILE};
use crate::lookup::catalog::Catalog;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The name of the bidforge configuration directory.
pub const BIDFORGE_DIR: &str = ".bidforge";

/// Result of initializing a project.
#[derive(Debug)]
pub struct InitResult {
    pub bidforge_dir: PathBuf,
    /// Whether the directory was newly created (false if it already existed)
    pub created: bool,
}

/// Create or complete the `.bidforge/` structure. Existing files are kept.
pub fn init_project(project_dir: &Path) -> Result<InitResult> {
    let bidforge_dir = project_dir.join(BIDFORGE_DIR);
    let created = !bidforge_dir.exists();

    std::fs::create_dir_all(&bidforge_dir)
        .with_context(|| format!("Failed to create directory: {}", bidforge_dir.display()))?;
    ensure_directory_structure(&bidforge_dir)?;

    Ok(InitResult {
        bidforge_dir,
        created,
    })
}

fn ensure_directory_structure(bidforge_dir: &Path) -> Result<()> {
    for sub in ["checkpoints", "logs"] {
        let dir = bidforge_dir.join(sub);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    let config_file = bidforge_dir.join(CONFIG_FILE);
    if !config_file.exists() {
        BidforgeToml::default().save(&config_file)?;
    }

    let catalog_file = bidforge_dir.join("catalog.json");
    if !catalog_file.exists() {
        let content = serde_json::to_string_pretty(&Catalog::default())
            .context("Failed to serialize empty catalog")?;
        std::fs::write(&catalog_file, content)
            .with_context(|| format!("Failed to create catalog: {}", catalog_file.display()))?;
    }

    Ok(())
}

pub fn is_initialized(project_dir: &Path) -> bool {
    project_dir.join(BIDFORGE_DIR).exists()
}

pub fn get_bidforge_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(BIDFORGE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_structure() {
        let dir = tempdir().unwrap();
        assert!(!is_initialized(dir.path()));

        let result = init_project(dir.path()).unwrap();
        assert!(result.created);
        assert_eq!(result.bidforge_dir, get_bidforge_dir(dir.path()));
        assert!(result.bidforge_dir.join("checkpoints").is_dir());
        assert!(result.bidforge_dir.join("logs").is_dir());
        assert!(result.bidforge_dir.join(CONFIG_FILE).is_file());
        assert!(is_initialized(dir.path()));

        let catalog: Catalog = serde_json::from_str(
            &std::fs::read_to_string(result.bidforge_dir.join("catalog.json")).unwrap(),
        )
        .unwrap();
        assert!(catalog.proposals.is_empty());
    }

    #[test]
    fn test_init_is_idempotent_and_keeps_config() {
        let dir = tempdir().unwrap();
        init_project(dir.path()).unwrap();
        let config = get_bidforge_dir(dir.path()).join(CONFIG_FILE);
        std::fs::write(&config, "[defaults]\nexpress_mode = true\n").unwrap();

        let again = init_project(dir.path()).unwrap();
        assert!(!again.created);
        assert_eq!(
            std::fs::read_to_string(&config).unwrap(),
            "[defaults]\nexpress_mode = true\n"
        );
    }
}
