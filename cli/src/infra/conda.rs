//! `PackageManager` adapter for conda.
//!
//! The installer is executed directly (it was made executable by the
//! previous step); every later command goes through `<prefix>/bin/conda`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, PackageManager};
use crate::domain::plan::{
    installer_args, manager_build_args, manager_install_args, manager_update_args,
};

pub struct CondaManager<R: CommandRunner> {
    runner: R,
    conda: PathBuf,
}

impl<R: CommandRunner> CondaManager<R> {
    /// `conda` is the manager executable, normally `<prefix>/bin/conda`.
    pub fn new(runner: R, conda: PathBuf) -> Self {
        Self { runner, conda }
    }

    async fn conda(&self, args: Vec<String>) -> Result<Output> {
        let program = self.conda.display().to_string();
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(&program, &args).await
    }
}

impl<R: CommandRunner> PackageManager for CondaManager<R> {
    async fn bootstrap(&self, installer: &Path, prefix: &Path) -> Result<Output> {
        let program = installer.display().to_string();
        let args = installer_args(prefix);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner
            .run(&program, &args)
            .await
            .context("running conda installer")
    }

    async fn self_update(&self) -> Result<Output> {
        self.conda(manager_update_args()).await.context("conda update")
    }

    async fn install_extensions(&self, extensions: &[String]) -> Result<Output> {
        self.conda(manager_install_args(extensions))
            .await
            .context("conda install")
    }

    async fn build(&self, version: &str, recipe_dir: &Path) -> Result<Output> {
        self.conda(manager_build_args(version, recipe_dir))
            .await
            .with_context(|| format!("conda build --python {version}"))
    }
}
