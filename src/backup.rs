use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/workspace.sqlite3";
pub const BUNDLE_FORMAT_V1: &str = "coursed-workspace-v1";
pub const LEGACY_SQLITE_FORMAT: &str = "legacy-sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

/// Writes `<workspace>/<db_file_name>` and a manifest into a zip bundle.
pub fn export_workspace_bundle(
    workspace_path: &Path,
    db_file_name: &str,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(db_file_name);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }
    let db_sha256 = sha256_file(&db_path)?;

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        db_sha256,
    })
}

/// Restores a bundle (or a bare SQLite file) as `<workspace>/<db_file_name>`.
/// The current database is replaced only after the checksum matches.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
    db_file_name: &str,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = workspace_path.join(db_file_name);

    if !is_zip_file(in_path)? {
        std::fs::copy(in_path, &dst).with_context(|| {
            format!(
                "failed to copy legacy sqlite backup from {} to {}",
                in_path.to_string_lossy(),
                dst.to_string_lossy()
            )
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: LEGACY_SQLITE_FORMAT.to_string(),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .context("manifest.json missing dbSha256")?
        .to_ascii_lowercase();

    let tmp_dst = workspace_path.join(format!("{}.importing", db_file_name));
    if tmp_dst.exists() {
        let _ = std::fs::remove_file(&tmp_dst);
    }

    let mut db_out = File::create(&tmp_dst).with_context(|| {
        format!(
            "failed to create temp database {}",
            tmp_dst.to_string_lossy()
        )
    })?;
    {
        let mut db_entry = archive
            .by_name(DB_ENTRY)
            .with_context(|| format!("bundle missing {}", DB_ENTRY))?;
        std::io::copy(&mut db_entry, &mut db_out).context("failed to extract database entry")?;
    }
    db_out
        .flush()
        .context("failed to flush extracted database")?;
    drop(db_out);

    let actual_sha = sha256_file(&tmp_dst)?;
    if actual_sha != expected_sha {
        let _ = std::fs::remove_file(&tmp_dst);
        return Err(anyhow!(
            "database checksum mismatch: manifest {}, bundle {}",
            expected_sha,
            actual_sha
        ));
    }

    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(&tmp_dst, &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
    })
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open {} for hashing", path.to_string_lossy()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut f, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.to_string_lossy()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}
