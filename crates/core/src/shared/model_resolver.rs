use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Resolve a cascade resource by file name.
///
/// Resolution order:
/// 1. Bundled directory, if given (explicit user choice wins)
/// 2. User cache directory (platform-specific)
/// 3. Download from `url` into the cache
pub fn resolve(name: &str, url: &str, bundled_dir: Option<&Path>) -> Result<PathBuf, ResolveError> {
    if let Some(dir) = bundled_dir {
        let bundled_path = dir.join(name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let cache_dir = cascade_cache_dir()?;
    resolve_in(&cache_dir, name, url)
}

fn resolve_in(cache_dir: &Path, name: &str, url: &str) -> Result<PathBuf, ResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }
    fs::create_dir_all(cache_dir).map_err(ResolveError::CacheDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &cached_path)?;
    Ok(cached_path)
}

/// Platform-specific cascade cache directory.
///
/// - macOS: `~/Library/Application Support/FaceCount/cascades/`
/// - Linux: `$XDG_CACHE_HOME/FaceCount/cascades/` or `~/.cache/FaceCount/cascades/`
/// - Windows: `%LOCALAPPDATA%/FaceCount/cascades/`
pub fn cascade_cache_dir() -> Result<PathBuf, ResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceCount").join("cascades"))
            .ok_or(ResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceCount").join("cascades"))
            .ok_or(ResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path) -> Result<(), ResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path);

    // Never leave a half-written .part behind.
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(url: &str, dest: &Path, temp_path: &Path) -> Result<(), ResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| ResolveError::Write { path, source }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))?;

    Ok(())
}
