//! Toxicity model and ONNX Runtime downloader.
//!
//! Fetches the model, its tokenizer and the ONNX Runtime shared library into
//! the platform data directory on first use or on demand from the CLI.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use directories::ProjectDirs;

/// Download progress callback type.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync>;

/// Download progress information.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    /// Current step description.
    pub step: String,
    /// Bytes downloaded so far.
    pub downloaded: u64,
    /// Total bytes to download (if known).
    pub total: Option<u64>,
    /// Whether the step is complete.
    pub complete: bool,
}

impl DownloadProgress {
    /// Creates a new progress update.
    pub fn new(step: &str, downloaded: u64, total: Option<u64>) -> Self {
        Self {
            step: step.to_string(),
            downloaded,
            total,
            complete: false,
        }
    }

    /// Creates a completion update.
    pub fn complete(step: &str) -> Self {
        Self {
            step: step.to_string(),
            downloaded: 0,
            total: None,
            complete: true,
        }
    }

    /// Returns progress as a percentage (0-100).
    pub fn percentage(&self) -> Option<u8> {
        self.total.map(|t| {
            if t == 0 {
                100
            } else {
                ((self.downloaded as f64 / t as f64) * 100.0).min(100.0) as u8
            }
        })
    }
}

/// Error types for model downloading.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Archive extraction error: {0}")]
    Archive(String),

    #[error("Not available: {0}")]
    NotFound(String),
}

/// ONNX Runtime version to download.
const ONNX_RUNTIME_VERSION: &str = "1.23.2";

#[cfg(all(target_os = "windows", target_arch = "x86_64"))]
const ONNX_RUNTIME_URL: &str = "https://github.com/microsoft/onnxruntime/releases/download/v1.23.2/onnxruntime-win-x64-1.23.2.zip";

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
const ONNX_RUNTIME_URL: &str = "https://github.com/microsoft/onnxruntime/releases/download/v1.23.2/onnxruntime-linux-x64-1.23.2.tgz";

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
const ONNX_RUNTIME_URL: &str = "https://github.com/microsoft/onnxruntime/releases/download/v1.23.2/onnxruntime-osx-arm64-1.23.2.tgz";

#[cfg(not(any(
    all(target_os = "windows", target_arch = "x86_64"),
    all(target_os = "linux", target_arch = "x86_64"),
    all(target_os = "macos", target_arch = "aarch64"),
)))]
const ONNX_RUNTIME_URL: &str = "";

/// Multi-label toxicity model (toxic-bert, ONNX export).
const MODEL_URL: &str = "https://huggingface.co/Xenova/toxic-bert/resolve/main/onnx/model.onnx";

/// Tokenizer matching [`MODEL_URL`].
const TOKENIZER_URL: &str = "https://huggingface.co/Xenova/toxic-bert/resolve/main/tokenizer.json";

#[cfg(target_os = "windows")]
const RUNTIME_LIB: &str = "onnxruntime.dll";
#[cfg(target_os = "macos")]
const RUNTIME_LIB: &str = "libonnxruntime.dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const RUNTIME_LIB: &str = "libonnxruntime.so";

/// Downloader for the toxicity model and ONNX Runtime.
#[derive(Debug, Clone)]
pub struct ModelDownloader {
    models_dir: PathBuf,
    lib_dir: PathBuf,
}

impl ModelDownloader {
    /// Creates a downloader rooted at the platform data directory.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "hush", "Hush")?;
        Some(Self::with_data_dir(project_dirs.data_dir()))
    }

    /// Creates a downloader rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            models_dir: data_dir.join("models"),
            lib_dir: data_dir.join("lib"),
        }
    }

    /// Returns the models directory path.
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Returns the lib directory path.
    pub fn lib_dir(&self) -> &Path {
        &self.lib_dir
    }

    /// Path of the toxicity model.
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join("toxicity.onnx")
    }

    /// Path of the tokenizer.
    pub fn tokenizer_path(&self) -> PathBuf {
        self.models_dir.join("toxicity_tokenizer.json")
    }

    /// Path of the ONNX Runtime library.
    pub fn onnx_runtime_path(&self) -> PathBuf {
        self.lib_dir.join(RUNTIME_LIB)
    }

    /// Current installation status.
    pub fn status(&self) -> MlStatus {
        let has_runtime = self.onnx_runtime_path().exists();
        let has_model = self.model_path().exists() && self.tokenizer_path().exists();

        match (has_runtime, has_model) {
            (true, true) => MlStatus::Ready,
            (false, true) => MlStatus::MissingRuntime,
            (true, false) => MlStatus::MissingModel,
            (false, false) => MlStatus::MissingAll,
        }
    }

    /// Downloads everything that is missing.
    pub async fn ensure_all(&self, progress: Option<ProgressCallback>) -> Result<(), DownloadError> {
        self.ensure_model(progress.clone()).await?;
        self.ensure_onnx_runtime(progress).await?;
        Ok(())
    }

    /// Downloads the model and tokenizer if not already present.
    pub async fn ensure_model(
        &self,
        progress: Option<ProgressCallback>,
    ) -> Result<PathBuf, DownloadError> {
        fs::create_dir_all(&self.models_dir)?;

        let model_path = self.model_path();
        if !model_path.exists() {
            let bytes = fetch(MODEL_URL, "Downloading toxicity model...", &progress).await?;
            write_file(&model_path, &bytes)?;
        }

        let tokenizer_path = self.tokenizer_path();
        if !tokenizer_path.exists() {
            let bytes = fetch(TOKENIZER_URL, "Downloading tokenizer...", &progress).await?;
            write_file(&tokenizer_path, &bytes)?;
        }

        report(&progress, DownloadProgress::complete("Toxicity model installed"));
        Ok(model_path)
    }

    /// Downloads ONNX Runtime if not already present.
    pub async fn ensure_onnx_runtime(
        &self,
        progress: Option<ProgressCallback>,
    ) -> Result<PathBuf, DownloadError> {
        let lib_path = self.onnx_runtime_path();
        if lib_path.exists() {
            report(&progress, DownloadProgress::complete("ONNX Runtime already installed"));
            return Ok(lib_path);
        }

        if ONNX_RUNTIME_URL.is_empty() {
            return Err(DownloadError::NotFound(
                "ONNX Runtime not available for this platform".to_string(),
            ));
        }

        fs::create_dir_all(&self.lib_dir)?;

        let step = format!("Downloading ONNX Runtime v{}...", ONNX_RUNTIME_VERSION);
        let bytes = fetch(ONNX_RUNTIME_URL, &step, &progress).await?;

        if ONNX_RUNTIME_URL.ends_with(".zip") {
            extract_zip(&bytes, RUNTIME_LIB, &lib_path)?;
        } else {
            extract_tgz(&bytes, RUNTIME_LIB, &lib_path)?;
        }

        report(&progress, DownloadProgress::complete("ONNX Runtime installed"));
        Ok(lib_path)
    }

    /// Environment variable read by ONNX Runtime's dynamic loader.
    pub fn onnx_lib_env_var() -> &'static str {
        "ORT_DYLIB_PATH"
    }

    /// Points ONNX Runtime at the downloaded library, unless the variable is
    /// already set. Returns true if the library is available.
    pub fn setup_environment(&self) -> bool {
        if std::env::var_os(Self::onnx_lib_env_var()).is_some() {
            return true;
        }

        let lib_path = self.onnx_runtime_path();
        if !lib_path.exists() {
            return false;
        }

        std::env::set_var(Self::onnx_lib_env_var(), &lib_path);
        tracing::info!("Set {} to {:?}", Self::onnx_lib_env_var(), lib_path);
        true
    }
}

fn report(progress: &Option<ProgressCallback>, update: DownloadProgress) {
    if let Some(cb) = progress {
        cb(update);
    }
}

async fn fetch(
    url: &str,
    step: &str,
    progress: &Option<ProgressCallback>,
) -> Result<Vec<u8>, DownloadError> {
    report(progress, DownloadProgress::new(step, 0, None));
    tracing::info!(url, "{}", step);

    let response = reqwest::get(url)
        .await
        .map_err(|e| DownloadError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(DownloadError::Network(format!(
            "HTTP error: {}",
            response.status()
        )));
    }

    let total = response.content_length();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DownloadError::Network(e.to_string()))?;

    report(progress, DownloadProgress::new(step, bytes.len() as u64, total));
    Ok(bytes.to_vec())
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), DownloadError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}

/// Extracts `lib_name` from a ZIP archive to `dest`.
fn extract_zip(data: &[u8], lib_name: &str, dest: &Path) -> Result<(), DownloadError> {
    use std::io::Cursor;

    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| DownloadError::Archive(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DownloadError::Archive(e.to_string()))?;

        if entry.name().ends_with(lib_name) {
            let mut out = File::create(dest)?;
            io::copy(&mut entry, &mut out)?;
            return Ok(());
        }
    }

    Err(DownloadError::Archive(format!("{} not found in archive", lib_name)))
}

/// Extracts `lib_name` from a tar.gz archive to `dest`.
fn extract_tgz(data: &[u8], lib_name: &str, dest: &Path) -> Result<(), DownloadError> {
    let decoder = flate2::read::GzDecoder::new(data);
    let mut archive = tar::Archive::new(decoder);

    let entries = archive
        .entries()
        .map_err(|e| DownloadError::Archive(e.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| DownloadError::Archive(e.to_string()))?;
        let matches = entry
            .path()
            .map_err(|e| DownloadError::Archive(e.to_string()))?
            .file_name()
            .map(|n| n.to_string_lossy().starts_with(lib_name))
            .unwrap_or(false);

        if matches {
            let mut out = File::create(dest)?;
            io::copy(&mut entry, &mut out)?;
            return Ok(());
        }
    }

    Err(DownloadError::Archive(format!("{} not found in archive", lib_name)))
}

/// Status of the ML dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlStatus {
    /// Model, tokenizer and runtime are installed.
    Ready,
    /// ONNX Runtime is missing.
    MissingRuntime,
    /// Model or tokenizer is missing.
    MissingModel,
    /// Nothing is installed.
    MissingAll,
}

impl MlStatus {
    /// Returns true if ML is ready to use.
    pub fn is_ready(&self) -> bool {
        matches!(self, MlStatus::Ready)
    }

    /// Returns a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            MlStatus::Ready => "Toxicity classifier ready",
            MlStatus::MissingRuntime => "ONNX Runtime not installed",
            MlStatus::MissingModel => "Toxicity model not installed",
            MlStatus::MissingAll => "ML dependencies not installed",
        }
    }
}
