//! File persistence under `.ideaflow/`. Every write goes through
//! [`atomic_write`], so readers see either the old manifest or the new one.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replace `path` with `data`. The bytes land in a sibling tempfile that is
/// synced and then renamed over the target; missing parents are created.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// YAML file at `path`, or `None` when it does not exist.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read_to_string(path) {
        Ok(data) => Ok(Some(serde_yaml::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_yaml::to_string(value)?;
    atomic_write(path, data.as_bytes())
}

/// Make sure `dir/.gitignore` has a line equal to `entry`, keeping any lines
/// already there.
pub fn ensure_gitignore_entry(dir: &Path, entry: &str) -> Result<()> {
    let gitignore = dir.join(".gitignore");
    let mut content = match std::fs::read_to_string(&gitignore) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    if content.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(entry);
    content.push('\n');
    atomic_write(&gitignore, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions/abc/transcripts/business_analyst.yaml");
        atomic_write(&path, b"entries: []").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "entries: []");
    }

    #[test]
    fn atomic_write_replaces_without_leftovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.yaml");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn yaml_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let value: Option<BTreeMap<String, u32>> = read_yaml(&dir.path().join("decisions.yaml")).unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn yaml_written_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions/s/session.yaml");
        let mut value = BTreeMap::new();
        value.insert("version".to_string(), 3u32);
        write_yaml(&path, &value).unwrap();
        assert_eq!(read_yaml::<BTreeMap<String, u32>>(&path).unwrap(), Some(value));

        std::fs::write(&path, "version: [").unwrap();
        assert!(read_yaml::<BTreeMap<String, u32>>(&path).is_err());
    }

    #[test]
    fn gitignore_entry_is_added_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "*.tmp").unwrap();
        ensure_gitignore_entry(dir.path(), "state.yaml").unwrap();
        ensure_gitignore_entry(dir.path(), "state.yaml").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "*.tmp\nstate.yaml\n");
    }

    #[test]
    fn gitignore_is_created_when_missing() {
        let dir = TempDir::new().unwrap();
        ensure_gitignore_entry(dir.path(), "state.yaml").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "state.yaml\n");
    }
}
