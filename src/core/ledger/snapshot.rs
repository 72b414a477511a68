// Copyright (c) 2026 Ddns-node Contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Block-database snapshot export/import, the catch-up mechanism for a
//! lagging peer (C9's `sync`). Export copies the block database to
//! `snapshots/<ts>.db`; import stages the incoming database under a
//! per-sync unique scratch path and only then atomically swaps it into
//! place, so two concurrent syncs never race on the same scratch file (the
//! failure mode the fixed-scratch-filename design in the original source
//! was vulnerable to).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::{fs, io};

use thiserror::Error;

/// Snapshot errors.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A filesystem operation failed.
    #[error("io")]
    Io,
}

impl From<io::Error> for SnapshotError {
    fn from(_: io::Error) -> Self {
        SnapshotError::Io
    }
}

static SCRATCH_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A scratch path guaranteed unique within this process, combining the
/// process id with a monotonic counter so concurrent syncs never collide.
fn unique_scratch_name(prefix: &str) -> String {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}.tmp", prefix, std::process::id(), n)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), SnapshotError> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let ty = entry.file_type()?;
        let dst_path = dst.join(entry.file_name());
        if ty.is_dir() {
            copy_dir_recursive(&entry.path(), &dst_path)?;
        } else {
            fs::copy(entry.path(), &dst_path)?;
        }
    }
    Ok(())
}

/// Export the block database at `db_path` into `snapshots_dir/<ts>.db`,
/// returning the snapshot's path.
pub fn export_snapshot(db_path: &Path, snapshots_dir: &Path, timestamp_ms: u64) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshots_dir)?;
    let dest = snapshots_dir.join(format!("{}.db", timestamp_ms));
    copy_dir_recursive(db_path, &dest)?;
    Ok(dest)
}

/// Import a snapshot at `snapshot_path`, replacing the database at
/// `dest_db_path`. Stages the copy under a unique scratch directory next to
/// the destination, then atomically renames it into place, so a reader
/// opening `dest_db_path` mid-import never observes a partially written
/// database.
pub fn import_snapshot(snapshot_path: &Path, dest_db_path: &Path) -> Result<(), SnapshotError> {
    let parent = dest_db_path.parent().unwrap_or_else(|| Path::new("."));
    let scratch = parent.join(unique_scratch_name("import"));

    copy_dir_recursive(snapshot_path, &scratch)?;

    if dest_db_path.exists() {
        let backup = parent.join(unique_scratch_name("replaced"));
        fs::rename(dest_db_path, &backup)?;
        fs::rename(&scratch, dest_db_path)?;
        let _ = fs::remove_dir_all(&backup);
    } else {
        fs::rename(&scratch, dest_db_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_restores_contents() {
        let root = tempfile::tempdir().unwrap();
        let db_path = root.path().join("block.bin");
        fs::create_dir_all(&db_path).unwrap();
        fs::write(db_path.join("data.bin"), b"hello").unwrap();

        let snapshots_dir = root.path().join("snapshots");
        let snapshot = export_snapshot(&db_path, &snapshots_dir, 123).unwrap();
        assert!(snapshot.join("data.bin").exists());

        let dest = root.path().join("restored.bin");
        import_snapshot(&snapshot, &dest).unwrap();
        assert_eq!(fs::read(dest.join("data.bin")).unwrap(), b"hello");
    }

    #[test]
    fn import_replaces_existing_destination() {
        let root = tempfile::tempdir().unwrap();
        let dest = root.path().join("live.bin");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("data.bin"), b"old").unwrap();

        let snapshot = root.path().join("incoming.db");
        fs::create_dir_all(&snapshot).unwrap();
        fs::write(snapshot.join("data.bin"), b"new").unwrap();

        import_snapshot(&snapshot, &dest).unwrap();
        assert_eq!(fs::read(dest.join("data.bin")).unwrap(), b"new");
    }

    #[test]
    fn concurrent_imports_use_distinct_scratch_paths() {
        let a = unique_scratch_name("import");
        let b = unique_scratch_name("import");
        assert_ne!(a, b);
    }
}
