//! Atomic file writes for generated configuration.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::ProvisionError;

/// Write `content` to `path` via a synced temp file and rename, creating
/// parent directories as needed.
pub fn write_file_atomic(path: &Path, content: &str, mode: u32) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    {
        let mut file = fs::File::create(temp_path).map_err(|e| ProvisionError::io(temp_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| ProvisionError::io(temp_path, e))?;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .map_err(|e| ProvisionError::io(temp_path, e))?;
        file.sync_all().map_err(|e| ProvisionError::io(temp_path, e))?;
    }

    fs::rename(temp_path, path).map_err(|e| ProvisionError::io(path, e))?;
    Ok(())
}

/// Remove a file or directory tree if present. Returns whether something was removed.
pub fn remove_path(path: &Path) -> Result<bool, ProvisionError> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(false);
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| ProvisionError::io(path, e))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_with_mode_and_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("usr/local/bin/helper");
        write_file_atomic(&path, "#!/bin/sh\n", 0o755).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "#!/bin/sh\n");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
        assert!(!dir.path().join("usr/local/bin/helper.tmp").exists());
    }

    #[test]
    fn remove_path_handles_files_dirs_and_absence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("version");
        let tree = dir.path().join("etc/nginx");
        fs::write(&file, "0.1.0").unwrap();
        fs::create_dir_all(tree.join("sites-enabled")).unwrap();

        assert!(remove_path(&file).unwrap());
        assert!(remove_path(&tree).unwrap());
        assert!(!remove_path(&tree).unwrap());
        assert!(!file.exists() && !tree.exists());
    }
}
