//! Hosts export command implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::priority::ListKind;
use crate::store;

/// Run the hosts command
pub fn run(output: Option<PathBuf>, config_path: &Path) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    let (path, written) = export(&config, output.as_deref())?;

    println!();
    println!("[OK] Wrote {} domains to {}", written, path.display());
    println!();
    Ok(())
}

/// Write the blacklist domains to `output`, or the configured hosts file.
///
/// Fails when there is nothing to export.
pub fn export(config: &Config, output: Option<&Path>) -> Result<(PathBuf, usize)> {
    let source = config.list_path(ListKind::BlacklistDomain);
    let blacklist = store::load_list(&source, ListKind::BlacklistDomain)
        .with_context(|| format!("Failed to load {}", source.display()))?;

    if blacklist.entries().iter().all(|e| e.pattern.starts_with('*')) {
        anyhow::bail!("No exportable domains in {}", source.display());
    }

    let path = output.map(Path::to_path_buf).unwrap_or_else(|| config.hosts_path());
    let written = store::write_hosts(&path, &blacklist)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok((path, written))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> Config {
        Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_export_default_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("blacklist.txt"),
            "phish.example # URLhaus\n*.ads.example # EasyList\nbad.example\n",
        )
        .unwrap();

        let (path, written) = export(&config(dir.path()), None).unwrap();
        assert_eq!(path, dir.path().join("hosts.txt"));
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("0.0.0.0 bad.example\n0.0.0.0 phish.example\n"));
        assert!(!content.contains("ads.example"));
    }

    #[test]
    fn test_export_nothing_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blacklist.txt"), "*.ads.example # EasyList\n").unwrap();

        assert!(export(&config(dir.path()), None).is_err());
        assert!(!dir.path().join("hosts.txt").exists());

        let missing = tempfile::tempdir().unwrap();
        assert!(export(&config(missing.path()), None).is_err());
    }
}
