use std::{
    fmt::Debug,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use fs_err::File;
use serde::Deserialize;

pub fn read_toml<P: Into<PathBuf> + Debug, T: for<'de> Deserialize<'de>>(
    path: P,
) -> anyhow::Result<T> {
    let path = path.into();
    (|| toml::from_str(&fs_err::read_to_string(&path)?).map_err(anyhow::Error::new))().with_context(
        || {
            format!(
                "While trying to parse {path:?} as {}",
                std::any::type_name::<T>()
            )
        },
    )
}

/// Writes `contents` to a sibling temporary file, then renames it over `path`.
/// A failed write never leaves a truncated file at `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{path:?} has no parent directory"))?;
    fs_err::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{path:?} has no valid file name"))?;
    let tmp = dir.join(format!("{file_name}.tmp"));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.flush()?;
    }
    fs_err::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "transfer-scraping-test-{name}-{}",
            std::process::id()
        ));
        fs_err::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn write_atomic_replaces_previous_contents() {
        let dir = temp_dir("atomic");
        let path = dir.join("nested").join("out.csv");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs_err::read(&path).unwrap(), b"second");
        assert!(!path.with_file_name("out.csv.tmp").exists());
        fs_err::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn read_toml_reports_the_offending_path() {
        #[derive(Debug, Deserialize)]
        struct Config {
            #[allow(unused)]
            name: String,
        }
        let dir = temp_dir("toml");
        let path = dir.join("config.toml");
        fs_err::write(&path, "name = 42").unwrap();
        let err = read_toml::<_, Config>(&path).unwrap_err();
        assert!(format!("{err:#}").contains("config.toml"));
        fs_err::remove_dir_all(&dir).unwrap();
    }
}
