//! Temporary on-disk catalog trees.
//!
//! The tree mirrors the layout the service reads:
//!
//! ```text
//! {root}/{directory}/output/{summary file}
//! {root}/{directory}/output/{detail subdir}/{event name}.json
//! ```

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::{self, layout};

/// A catalog data directory that is removed on drop.
pub struct CatalogTree {
    dir: TempDir,
}

impl CatalogTree {
    /// Create an empty tree.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("oac_catalogs_").tempdir()?;
        Ok(Self { dir })
    }

    /// Create a tree holding the standard fixture catalogs and the SN2014J
    /// detail record.
    pub fn standard() -> io::Result<Self> {
        let tree = Self::new()?;
        tree.write_summary(layout::SNE_DIRECTORY, layout::SUMMARY_FILE, &fixtures::sne_catalog())?;
        tree.write_summary(
            layout::SNE_DIRECTORY,
            layout::GRAVEYARD_FILE,
            &fixtures::sne_graveyard_catalog(),
        )?;
        tree.write_summary(
            layout::KILONOVA_DIRECTORY,
            layout::SUMMARY_FILE,
            &fixtures::kilonova_catalog(),
        )?;
        tree.write_detail(layout::SNE_DIRECTORY, "SN2014J", &fixtures::sn2014j_detail())?;
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Output directory of one catalog repository.
    pub fn output_dir(&self, directory: &str) -> PathBuf {
        self.root().join(directory).join("output")
    }

    /// Write a summary file, creating directories as needed.
    pub fn write_summary(&self, directory: &str, file: &str, contents: &Value) -> io::Result<PathBuf> {
        let out = self.output_dir(directory);
        fs::create_dir_all(&out)?;
        let path = out.join(file);
        fs::write(&path, contents.to_string())?;
        Ok(path)
    }

    /// Write a detail record. `/` in event names becomes `_`.
    pub fn write_detail(&self, directory: &str, event: &str, contents: &Value) -> io::Result<PathBuf> {
        let out = self.output_dir(directory).join(layout::DETAIL_SUBDIR);
        fs::create_dir_all(&out)?;
        let path = out.join(format!("{}.json", event.replace('/', "_")));
        fs::write(&path, contents.to_string())?;
        Ok(path)
    }

    /// Write raw text, e.g. a deliberately broken file.
    pub fn write_raw(&self, relative: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.root().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }
}
