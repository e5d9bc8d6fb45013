use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model {name} not found in {searched:?} and has no download URL")]
    NotFound { name: String, searched: Vec<PathBuf> },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a capability model comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSource {
    pub name: &'static str,
    pub url: Option<&'static str>,
}

impl ModelSource {
    pub const fn local(name: &'static str) -> Self {
        Self { name, url: None }
    }

    pub const fn remote(name: &'static str, url: &'static str) -> Self {
        Self {
            name,
            url: Some(url),
        }
    }
}

/// Resolve a model file, preferring local copies over a download.
///
/// Resolution order:
/// 1. The configured models directory
/// 2. User cache directory (platform-specific)
/// 3. Download from the source URL into the cache, when the source has one
pub fn resolve(
    source: &ModelSource,
    models_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir().ok();
    resolve_in(source, models_dir, cache_dir.as_deref(), progress)
}

fn resolve_in(
    source: &ModelSource,
    models_dir: Option<&Path>,
    cache_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let mut searched = Vec::new();
    for dir in [models_dir, cache_dir].into_iter().flatten() {
        let candidate = dir.join(source.name);
        if candidate.exists() {
            log::debug!("Model {} found at {}", source.name, candidate.display());
            return Ok(candidate);
        }
        searched.push(dir.to_path_buf());
    }

    let Some(url) = source.url else {
        return Err(ModelResolveError::NotFound {
            name: source.name.to_string(),
            searched,
        });
    };

    let cache_dir = cache_dir.ok_or(ModelResolveError::NoCacheDir)?;
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    let dest = cache_dir.join(source.name);
    log::info!("Downloading {} from {url}", source.name);
    download(url, &dest, progress)?;
    Ok(dest)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Facewatch/models/`
/// - Linux: `$XDG_CACHE_HOME/Facewatch/models/` or `~/.cache/Facewatch/models/`
/// - Windows: `%LOCALAPPDATA%/Facewatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("Facewatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("Facewatch").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(|e| ModelResolveError::Download {
        url: url.to_string(),
        source: e,
    })?;

    // Write to a temp file first, then rename so a partial file is never resolved
    let temp_path = dest.with_extension("part");
    let write_err = |source: std::io::Error| ModelResolveError::Write {
        path: temp_path.clone(),
        source,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_err)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        file.write_all(chunk).map_err(write_err)?;
        downloaded += chunk.len() as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
