//! Installer download over HTTPS.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::application::ports::{FetchedInstaller, InstallerFetcher};
use crate::domain::report::hex_encode;

/// Refuse to write more than this many bytes for a single installer.
const MAX_INSTALLER_BYTES: u64 = 1024 * 1024 * 1024;

/// Production `InstallerFetcher` backed by a blocking `ureq` agent.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl InstallerFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchedInstaller> {
        let url = url.to_owned();
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || download(&url, &dest))
            .await
            .context("spawn_blocking for installer download")?
    }
}

fn download(url: &str, dest: &Path) -> Result<FetchedInstaller> {
    tracing::info!(url, dest = %dest.display(), "downloading installer");
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;
    let mut reader = response.into_reader().take(MAX_INSTALLER_BYTES);
    let file =
        File::create(dest).with_context(|| format!("cannot create {}", dest.display()))?;
    let mut writer = BufWriter::new(file);
    write_hashed(&mut reader, &mut writer)
        .with_context(|| format!("writing installer to {}", dest.display()))
}

/// Copy `reader` into `writer`, hashing the bytes on the way through.
///
/// # Errors
///
/// Returns an error if reading or writing fails.
pub fn write_hashed(reader: &mut impl Read, writer: &mut impl Write) -> Result<FetchedInstaller> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).context("read failed")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).context("write failed")?;
        total += n as u64;
    }
    writer.flush().context("flush failed")?;
    Ok(FetchedInstaller {
        bytes: total,
        sha256: hex_encode(&hasher.finalize()),
    })
}
