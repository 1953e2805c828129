//! Enumerates the export directory layout.
//!
//! ```text
//! <root>/_users/*.json
//! <root>/<site>/meta/page_id_map.json
//! <root>/<site>/meta/file_map.json
//! <root>/<site>/meta/pages/<slug>.json
//! <root>/<site>/pages/<slug>.7z
//! <root>/<site>/files/<path>
//! <root>/<site>/meta/forum/category/*.json
//! <root>/<site>/meta/forum/<category_id>/<thread>.json
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use ignore::WalkBuilder;
use serde_derive::Deserialize;

use crate::{
    document,
    error::{ConfigError, Error, Result},
    models::DbId,
};

pub const USERS_DIR: &str = "_users";
pub const PENDING_USERS: &str = "pending.json";
const FORUM_CATEGORY_DIR: &str = "category";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileLocation {
    pub path: String,
    pub url: String,
}

pub type FileMap = HashMap<DbId, FileLocation>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    File,
    Dir,
}

/// Direct children of `dir` of one kind, sorted by name. Hidden entries are
/// skipped.
fn list(dir: &Path, kind: Kind) -> Result<Vec<PathBuf>> {
    let walk = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .standard_filters(false)
        .hidden(true)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    itertools::process_results(walk, |entries| {
        entries
            .filter(|entry| entry.depth() == 1)
            .filter(|entry| {
                let is_dir = entry.file_type().map_or(false, |ty| ty.is_dir());
                match kind {
                    Kind::Dir => is_dir,
                    Kind::File => !is_dir,
                }
            })
            .map(ignore::DirEntry::into_path)
            .collect::<Vec<_>>()
    })
    .map_err(Error::from)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn parse_id(raw: &str) -> Result<DbId> {
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidId(raw.to_owned()))
}

#[derive(Debug)]
pub struct Export {
    root: PathBuf,
    replace_colons: bool,
}

impl Export {
    pub fn open(root: impl Into<PathBuf>, replace_colons: bool) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot(root));
        }
        if !root.join(USERS_DIR).is_dir() {
            return Err(ConfigError::MissingUsers(root));
        }

        Ok(Self {
            root,
            replace_colons,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Applies the exporter's filename convention.
    ///
    /// Some exports replace `:` with `_` even though colons are valid in
    /// UNIX paths.
    #[must_use]
    pub fn filename(&self, name: &str) -> String {
        if self.replace_colons {
            name.replace(':', "_")
        } else {
            name.to_owned()
        }
    }

    /// User batch files, without the reserved pending file.
    pub fn user_batches(&self) -> Result<Vec<PathBuf>> {
        let mut batches = list(&self.root.join(USERS_DIR), Kind::File)?;
        batches.retain(|path| {
            if file_name(path) == PENDING_USERS {
                tracing::debug!("Skipping {PENDING_USERS}");
                false
            } else {
                true
            }
        });
        Ok(batches)
    }

    pub fn sites(&self) -> Result<Vec<Site<'_>>> {
        Ok(list(&self.root, Kind::Dir)?
            .into_iter()
            .map(|dir| file_name(&dir))
            .filter(|slug| slug != USERS_DIR)
            .map(|slug| self.site(&slug))
            .collect())
    }

    #[must_use]
    pub fn site(&self, slug: &str) -> Site<'_> {
        Site {
            export: self,
            slug: slug.to_owned(),
            dir: self.root.join(slug),
        }
    }
}

#[derive(Debug)]
pub struct ThreadSource {
    pub category: String,
    pub path: PathBuf,
}

#[derive(Debug)]
pub struct Site<'a> {
    export: &'a Export,
    slug: String,
    dir: PathBuf,
}

impl<'a> Site<'a> {
    #[must_use]
    pub fn slug(&self) -> &str {
        &self.slug
    }

    fn meta(&self) -> PathBuf {
        self.dir.join("meta")
    }

    fn forum_meta(&self) -> PathBuf {
        self.meta().join("forum")
    }

    /// External page id to page slug, ordered by id.
    pub fn page_ids(&self) -> Result<BTreeMap<DbId, String>> {
        // JSON keys are always strings
        let raw: BTreeMap<String, String> =
            document::read_json_as(&self.meta().join("page_id_map.json"))?;

        raw.into_iter()
            .map(|(id, slug)| Ok((parse_id(&id)?, slug)))
            .collect()
    }

    pub fn file_map(&self) -> Result<FileMap> {
        let path = self.meta().join("file_map.json");
        if !path.exists() {
            tracing::debug!("No file map for site '{}'", self.slug);
            return Ok(FileMap::new());
        }

        let raw: HashMap<String, FileLocation> = document::read_json_as(&path)?;
        raw.into_iter()
            .map(|(id, location)| Ok((parse_id(&id)?, location)))
            .collect()
    }

    #[must_use]
    pub fn page_metadata_path(&self, page_slug: &str) -> PathBuf {
        self.meta()
            .join("pages")
            .join(self.export.filename(&format!("{page_slug}.json")))
    }

    #[must_use]
    pub fn page_archive_path(&self, page_slug: &str) -> PathBuf {
        self.dir
            .join("pages")
            .join(self.export.filename(&format!("{page_slug}.7z")))
    }

    #[must_use]
    pub fn file_path(&self, location: &FileLocation) -> PathBuf {
        self.dir.join("files").join(&location.path)
    }

    pub fn forum_categories(&self) -> Result<Vec<PathBuf>> {
        let dir = self.forum_meta().join(FORUM_CATEGORY_DIR);
        if !dir.is_dir() {
            tracing::debug!("No forum categories for site '{}'", self.slug);
            return Ok(Vec::new());
        }
        list(&dir, Kind::File)
    }

    /// Thread documents, grouped under the directory named for their category.
    pub fn forum_threads(&self) -> Result<Vec<ThreadSource>> {
        let dir = self.forum_meta();
        if !dir.is_dir() {
            tracing::debug!("No forum for site '{}'", self.slug);
            return Ok(Vec::new());
        }

        let mut threads = Vec::new();
        for category_dir in list(&dir, Kind::Dir)? {
            let category = file_name(&category_dir);
            if category == FORUM_CATEGORY_DIR {
                continue;
            }

            for path in list(&category_dir, Kind::File)? {
                threads.push(ThreadSource {
                    category: category.clone(),
                    path,
                });
            }
        }
        Ok(threads)
    }
}
