use crate::StorageError;
use std::fs;
use std::path::{Path, PathBuf};

pub const STIMULI_FILE: &str = "stimuli.js";
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StimulusManifest {
    pub targets: Vec<String>,
    pub fillers: Vec<String>,
}

impl StimulusManifest {
    /// Collect image names from the target and optional filler directories.
    pub fn collect(target_dir: &Path, filler_dir: Option<&Path>) -> Result<Self, StorageError> {
        Ok(Self {
            targets: list_images(target_dir)?,
            fillers: match filler_dir {
                Some(dir) => list_images(dir)?,
                None => Vec::new(),
            },
        })
    }

    pub fn render(&self) -> Result<String, StorageError> {
        let encode = |names: &[String]| {
            serde_json::to_string_pretty(names)
                .map_err(|err| StorageError::Serialization(err.to_string()))
        };
        Ok(format!(
            "var TARGETIMGLST = {};\nvar FILLERIMGLST = {};\n",
            encode(&self.targets)?,
            encode(&self.fillers)?
        ))
    }
}

/// Image file names in `dir`, sorted, matched on extension case-insensitively.
pub fn list_images(dir: &Path) -> Result<Vec<String>, StorageError> {
    let entries = fs::read_dir(dir).map_err(|err| StorageError::io(dir, err))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| StorageError::io(dir, err))?;
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });
        if !is_image {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn write_stimuli_js(
    output_dir: &Path,
    manifest: &StimulusManifest,
) -> Result<PathBuf, StorageError> {
    fs::create_dir_all(output_dir).map_err(|err| StorageError::io(output_dir, err))?;
    let path = output_dir.join(STIMULI_FILE);
    fs::write(&path, manifest.render()?).map_err(|err| StorageError::io(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).expect("mkdir");
        for name in names {
            fs::write(dir.join(name), b"").expect("touch");
        }
    }

    #[test]
    fn only_images_are_listed_in_name_order() {
        let dir = tempdir().expect("tempdir");
        touch(
            dir.path(),
            &["b.JPG", "a.png", "notes.txt", "c.jpeg", "README"],
        );
        assert_eq!(
            list_images(dir.path()).expect("list"),
            vec!["a.png", "b.JPG", "c.jpeg"]
        );
    }

    #[test]
    fn stimuli_js_declares_both_lists() {
        let dir = tempdir().expect("tempdir");
        let targets = dir.path().join("targets");
        touch(&targets, &["t2.jpg", "t1.jpg"]);

        let manifest = StimulusManifest::collect(&targets, None).expect("collect");
        let out = dir.path().join("site/js");
        let path = write_stimuli_js(&out, &manifest).expect("write stimuli.js");

        let contents = fs::read_to_string(path).expect("read back");
        assert_eq!(
            contents,
            "var TARGETIMGLST = [\n  \"t1.jpg\",\n  \"t2.jpg\"\n];\nvar FILLERIMGLST = [];\n"
        );
    }

    #[test]
    fn missing_target_directory_is_an_io_error() {
        let dir = tempdir().expect("tempdir");
        assert!(matches!(
            list_images(&dir.path().join("absent")),
            Err(StorageError::Io { .. })
        ));
    }
}
