//! Disk persistence for the catalog using bincode serialization.
//!
//! The catalog is serialized to `catalog.cdb` with bincode. Writes use atomic
//! temp-file + rename to prevent corruption on crash. A CRC32 checksum is
//! appended as a footer and verified on load.

use crate::storage::catalog::{Catalog, CatalogData};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Snapshot file name inside the data directory.
pub const SNAPSHOT_FILE: &str = "catalog.cdb";

/// Magic bytes written before the CRC32 footer.
const SNAPSHOT_CRC_MAGIC: &[u8; 4] = b"CCR1";

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// Save the catalog to `dir` with an atomic write.
/// Layout: [bincode payload][magic "CCR1"][u32 CRC32 BE]. Returns bytes written.
pub fn save_catalog(catalog: &Catalog, dir: &Path) -> io::Result<usize> {
    let bytes = {
        let data = catalog.data.read();
        bincode::serialize(&*data).map_err(|e| io::Error::other(e.to_string()))?
    };
    let crc = crc32fast::hash(&bytes);

    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
    }
    let path = snapshot_path(dir);
    let tmp_path = dir.join(format!("{}.tmp", SNAPSHOT_FILE));

    let mut output = Vec::with_capacity(bytes.len() + 8);
    output.extend_from_slice(&bytes);
    output.extend_from_slice(SNAPSHOT_CRC_MAGIC);
    output.extend_from_slice(&crc.to_be_bytes());

    fs::write(&tmp_path, &output)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }
    fs::rename(&tmp_path, &path)?;

    tracing::info!(
        path = %path.display(),
        bytes = output.len(),
        crc = format_args!("{:#010x}", crc),
        "Saved catalog snapshot"
    );
    Ok(output.len())
}

/// Load a snapshot file, verifying its CRC32 footer and record invariants.
pub fn load_catalog(path: &Path) -> io::Result<Catalog> {
    let raw = fs::read(path)?;

    if raw.len() < 8 || &raw[raw.len() - 8..raw.len() - 4] != SNAPSHOT_CRC_MAGIC {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot {:?} has no CRC32 footer", path),
        ));
    }
    let payload = &raw[..raw.len() - 8];
    let stored_crc = u32::from_be_bytes([
        raw[raw.len() - 4],
        raw[raw.len() - 3],
        raw[raw.len() - 2],
        raw[raw.len() - 1],
    ]);
    let computed_crc = crc32fast::hash(payload);
    if computed_crc != stored_crc {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Snapshot CRC32 mismatch: expected {:#010x}, got {:#010x}. File may be corrupted: {:?}",
                stored_crc, computed_crc, path
            ),
        ));
    }
    tracing::debug!("Snapshot CRC32 verified: {:#010x}", stored_crc);

    let data: CatalogData = bincode::deserialize(payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    data.validate().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("snapshot validation failed: {}", e),
        )
    })?;

    tracing::info!(
        path = %path.display(),
        records = data.records.len(),
        "Loaded catalog snapshot"
    );
    Ok(Catalog::from_data(data))
}

/// Loads `dir/catalog.cdb`, or returns an empty catalog when none exists.
pub fn load_or_default(dir: &Path) -> io::Result<Catalog> {
    let path = snapshot_path(dir);
    if !path.exists() {
        tracing::info!(path = %path.display(), "No snapshot found, starting with an empty catalog");
        return Ok(Catalog::new());
    }
    load_catalog(&path)
}
