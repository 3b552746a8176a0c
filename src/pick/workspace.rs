//! pick::workspace
//!
//! Scratch working-tree snapshot for local patch application.
//!
//! A workspace is a temporary directory holding the fetched patch file and
//! a `files/` directory with the materialized blobs the patch touches. It
//! is owned by exactly one delivery and removed when dropped, so every
//! exit path (success, conflict, error) reclaims it.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

/// Ephemeral on-disk snapshot of the files a patch touches.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    files: PathBuf,
    patch_file: PathBuf,
}

impl Workspace {
    /// Create an empty workspace under the system temp directory.
    pub fn create() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("graft-wd-").tempdir()?;
        let files = dir.path().join("files");
        fs::create_dir(&files)?;
        let patch_file = dir.path().join("patch");
        Ok(Self {
            dir,
            files,
            patch_file,
        })
    }

    /// Root of the workspace (holds the patch file and the files dir).
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory the patch tool runs in.
    pub fn files_dir(&self) -> &Path {
        &self.files
    }

    /// Location of the fetched patch file.
    pub fn patch_file(&self) -> &Path {
        &self.patch_file
    }

    /// Write the fetched diff to the patch file.
    pub fn write_patch(&self, diff: &str) -> io::Result<()> {
        fs::write(&self.patch_file, diff)
    }

    /// Write blob content at a repository-relative path, creating parent
    /// directories as needed.
    pub fn materialize(&self, rel: &str, content: &[u8]) -> io::Result<()> {
        let path = self.resolve(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)
    }

    /// Read a file back out of the snapshot.
    pub fn read_file(&self, rel: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(rel)?)
    }

    /// Recreate the files dir if the patch tool removed it.
    ///
    /// A deletion-only patch can leave the directory itself deleted; the
    /// post-apply walk still needs it to exist.
    pub fn ensure_files_dir(&self) -> io::Result<()> {
        if !self.files.is_dir() {
            fs::create_dir(&self.files)?;
        }
        Ok(())
    }

    /// Resolve a repository-relative path, refusing anything that would
    /// escape the snapshot.
    fn resolve(&self, rel: &str) -> io::Result<PathBuf> {
        let rel_path = Path::new(rel);
        let escapes = rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if rel.is_empty() || escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path escapes the workspace: {rel}"),
            ));
        }
        Ok(self.files.join(rel_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_makes_files_dir() {
        let ws = Workspace::create().unwrap();
        assert!(ws.path().is_dir());
        assert!(ws.files_dir().is_dir());
    }

    #[test]
    fn materialize_and_read_nested_paths() {
        let ws = Workspace::create().unwrap();
        ws.materialize("test/nested/mod_me.txt", b"contents\n").unwrap();
        assert_eq!(ws.read_file("test/nested/mod_me.txt").unwrap(), b"contents\n");
    }

    #[test]
    fn write_patch_lands_outside_files_dir() {
        let ws = Workspace::create().unwrap();
        ws.write_patch("diff --git a/x b/x\n").unwrap();
        assert!(ws.patch_file().is_file());
        assert!(!ws.patch_file().starts_with(ws.files_dir()));
    }

    #[test]
    fn rejects_escaping_paths() {
        let ws = Workspace::create().unwrap();
        assert!(ws.materialize("../outside.txt", b"x").is_err());
        assert!(ws.materialize("/etc/passwd", b"x").is_err());
        assert!(ws.materialize("", b"x").is_err());
        assert!(ws.materialize("a/../../b", b"x").is_err());
    }

    #[test]
    fn ensure_files_dir_recreates_after_removal() {
        let ws = Workspace::create().unwrap();
        fs::remove_dir(ws.files_dir()).unwrap();
        ws.ensure_files_dir().unwrap();
        assert!(ws.files_dir().is_dir());
    }

    #[test]
    fn drop_removes_the_directory() {
        let path;
        {
            let ws = Workspace::create().unwrap();
            path = ws.path().to_path_buf();
            ws.materialize("a.txt", b"x").unwrap();
        }
        assert!(!path.exists());
    }
}
