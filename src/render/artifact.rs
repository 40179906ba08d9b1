//! Owner-only, replace-by-rename file writes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// Mode of generated artifacts: owner read/write/execute only.
pub const ARTIFACT_MODE: u32 = 0o700;

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub fn write_artifact(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(ARTIFACT_MODE)
            .open(&tmp)?;
        // mode() only applies on creation; a stale temp file keeps its own.
        file.set_permissions(fs::Permissions::from_mode(ARTIFACT_MODE))?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}
