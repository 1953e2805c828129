//! Reconciles revision archives with revision metadata.
//!
//! Each page has one archive whose members are named `<revision_number>.txt`.
//! The whole archive is read once and turned into a [`RevisionTexts`]
//! mapping, which revision metadata is then joined against by revision
//! number. The global revision id is a different number and never used here.

use std::{collections::BTreeMap, path::Path, str::Utf8Error};

use sevenz_rust::{Password, SevenZReader};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub data: Vec<u8>,
}

/// Reads every member of an archive in one pass.
pub trait ArchiveReader {
    fn read_members(&self, path: &Path) -> Result<Vec<Member>>;
}

/// 7-Zip archives, as written by the exporter.
#[derive(Debug, Default, Clone, Copy)]
pub struct SevenZip;

impl ArchiveReader for SevenZip {
    fn read_members(&self, path: &Path) -> Result<Vec<Member>> {
        let archive_error = |e: sevenz_rust::Error| Error::Archive {
            path: path.to_owned(),
            message: e.to_string(),
        };

        // Closed on drop.
        let mut archive = SevenZReader::open(path, Password::empty()).map_err(archive_error)?;

        let mut members = Vec::new();
        archive
            .for_each_entries(|entry, reader| {
                if entry.is_directory() {
                    tracing::trace!("Skipping directory entry '{}'", entry.name());
                    return Ok(true);
                }

                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                members.push(Member {
                    name: entry.name().to_owned(),
                    data,
                });
                Ok(true)
            })
            .map_err(archive_error)?;

        Ok(members)
    }
}

/// Parses a member name of the form `<integer>.txt`.
#[must_use]
pub fn revision_number(name: &str) -> Option<i64> {
    let digits = name.strip_suffix(".txt")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Revision number to revision text for one page.
#[derive(Debug, Default)]
pub struct RevisionTexts {
    texts: BTreeMap<i64, String>,
    undecodable: BTreeMap<i64, Utf8Error>,
}

impl RevisionTexts {
    /// Builds the mapping from every member of an archive.
    ///
    /// A member that does not follow the naming convention rejects the whole
    /// archive. A member that is not valid UTF-8 only affects the revision it
    /// holds.
    pub fn from_members(members: Vec<Member>) -> Result<Self> {
        let mut texts = Self::default();

        for member in members {
            tracing::trace!("Found file in archive: {}", member.name);

            let number = revision_number(&member.name)
                .ok_or_else(|| Error::ArchiveMember(member.name.clone()))?;

            match String::from_utf8(member.data) {
                Ok(text) => {
                    texts.texts.insert(number, text);
                }
                Err(e) => {
                    tracing::warn!("Archive member {} is not valid UTF-8", member.name);
                    texts.undecodable.insert(number, e.utf8_error());
                }
            }
        }

        Ok(texts)
    }

    pub fn load(reader: &dyn ArchiveReader, path: &Path) -> Result<Self> {
        tracing::debug!("Loading revision archive {}", path.display());
        Self::from_members(reader.read_members(path)?)
    }

    /// The text archived for `revision_number`.
    pub fn text(&self, revision_number: i64) -> Result<&str> {
        if let Some(text) = self.texts.get(&revision_number) {
            return Ok(text);
        }

        match self.undecodable.get(&revision_number) {
            Some(source) => Err(Error::UndecodableRevisionText {
                revision_number,
                source: *source,
            }),
            None => Err(Error::MissingRevisionText { revision_number }),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len() + self.undecodable.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
