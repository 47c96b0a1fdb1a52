/// Model file auto-download from HuggingFace.
///
/// Fetches the ONNX export and tokenizer files for a sentence-transformers
/// model on first use, so a fresh checkout works without manual setup.
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// Files required by the embedder, with their repo-relative URL paths.
const MODEL_FILES: &[(&str, &str)] = &[
    ("model.onnx", "onnx/model.onnx"),
    ("tokenizer.json", "tokenizer.json"),
    ("config.json", "config.json"),
];

/// Directory where files for `model_name` are stored locally.
#[must_use]
pub fn model_dir(model_name: &str) -> PathBuf {
    PathBuf::from("models").join(model_name)
}

/// Whether all required model files exist in `dir`.
#[must_use]
pub fn all_files_present(dir: &Path) -> bool {
    MODEL_FILES.iter().all(|(name, _)| dir.join(name).exists())
}

/// Download any missing model files for `model_name` into `dir`.
pub fn ensure_model_files(dir: &Path, model_name: &str) -> Result<()> {
    info!("Checking model files in {}", dir.display());

    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create model directory: {}", dir.display()))?;

    if all_files_present(dir) {
        info!("All model files found, skipping download");
        return Ok(());
    }

    let base = format!("https://huggingface.co/sentence-transformers/{model_name}/resolve/main");
    eprintln!("[INFO] Downloading model files for {model_name} from HuggingFace...");
    eprintln!("[INFO] This is a one-time download, please wait...");

    for &(filename, url_path) in MODEL_FILES {
        let dest = dir.join(filename);
        if dest.exists() {
            info!("File already exists: {filename}");
            continue;
        }

        let url = format!("{base}/{url_path}");
        eprintln!("[INFO] Downloading {filename}...");
        download_file(&dest, &url).with_context(|| format!("failed to download {filename}"))?;
    }

    eprintln!("[INFO] Model download complete!");
    Ok(())
}

/// Download a single file with a progress bar.
fn download_file(dest: &Path, url: &str) -> Result<()> {
    let resp =
        reqwest::blocking::get(url).with_context(|| format!("HTTP request failed: {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("bad status: {} for {url}", resp.status());
    }

    let total = resp.content_length().unwrap_or(0);
    let pb = if total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {bar:40.cyan/blue} {percent}% ({bytes}/{total_bytes}) {msg}")
                .expect("valid template")
                .progress_chars("█▓░"),
        );
        pb
    } else {
        ProgressBar::new_spinner()
    };

    let mut file = fs::File::create(dest)
        .with_context(|| format!("failed to create file: {}", dest.display()))?;

    let bytes = resp.bytes().context("failed to read response body")?;
    file.write_all(&bytes).context("failed to write file")?;
    pb.set_position(bytes.len() as u64);
    pb.finish_and_clear();

    Ok(())
}
