//! Filesystem infrastructure — implements `StagingFs`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::StagingFs;

/// Production filesystem implementation of `StagingFs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl StagingFs for LocalFs {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("creating directory {}", path.display()))
    }

    fn copy(&self, from: &Path, to: &Path) -> Result<u64> {
        std::fs::copy(from, to)
            .with_context(|| format!("copying {} to {}", from.display(), to.display()))
    }

    fn set_executable(&self, path: &Path) -> Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)
                .with_context(|| format!("cannot stat {}", path.display()))?
                .permissions();
            perms.set_mode(perms.mode() | 0o111);
            std::fs::set_permissions(path, perms)
                .with_context(|| format!("cannot set permissions on {}", path.display()))?;
        }
        #[cfg(not(unix))]
        {
            std::fs::metadata(path).with_context(|| format!("cannot stat {}", path.display()))?;
        }
        Ok(())
    }
}
