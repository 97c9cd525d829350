/*!
Hôte simulé pour les tests de handlers

Un répertoire temporaire organisé comme la racine d'un routeur
(`/proc/net`, `/etc/init.d`, `/etc/config`, ...). Les tests y écrivent les
fichiers sources puis pointent les chemins du démon vers cette racine.
*/

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Active les logs `env_logger` une seule fois par processus de test
pub fn init_test_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

/// Racine de système de fichiers jetable
#[derive(Debug)]
pub struct FakeHost {
    root: TempDir,
}

impl FakeHost {
    pub fn new() -> Result<Self> {
        init_test_logging();
        let root = tempfile::Builder::new()
            .prefix("symbion-host-")
            .tempdir()
            .context("Failed to create fake host root")?;

        log::debug!("Fake host at {}", root.path().display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Chemin absolu d'un chemin relatif à la racine
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative.trim_start_matches('/'))
    }

    /// Écrit un fichier (répertoires parents créés au besoin)
    pub fn write<C: AsRef<[u8]>>(&self, relative: &str, contents: C) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Écrit un fichier exécutable (mode 0755)
    pub fn write_executable<C: AsRef<[u8]>>(&self, relative: &str, contents: C) -> Result<PathBuf> {
        let path = self.write(relative, contents)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to chmod {}", path.display()))?;
        Ok(path)
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        let path = self.path(relative);
        fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))
    }
}
