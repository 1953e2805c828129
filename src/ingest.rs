//! Drives the import, one unit of work at a time.
//!
//! A unit is a user batch file, a page, a file, the forum categories of a
//! site, or a forum thread. Each unit is written in its own transaction. A
//! failed unit is recorded in the [`Report`] and the run moves on to the
//! next one.

use core::fmt;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use diesel::Connection;

use crate::{
    archive::{ArchiveReader, RevisionTexts},
    document,
    error::{Category, Error, Result},
    forum,
    mapper::{self, FileMeta},
    models::{
        forum::{ForumCategory, ForumPost, ForumPostRevision},
        page::{PageRevision, PageVote},
        user::User,
        DbConn, DbId, DbPool,
    },
    walker::{self, Export, FileMap, Site, ThreadSource},
};

/// Everything a unit needs, passed explicitly.
pub struct Context<'a> {
    pub export: &'a Export,
    pub archives: &'a dyn ArchiveReader,
    pub pool: &'a DbPool,
}

impl<'a> Context<'a> {
    /// Runs `f` in one transaction on a pooled connection. The connection
    /// goes back to the pool when this returns, committed or not.
    fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut DbConn) -> Result<T>,
    {
        let mut conn = self.pool.get()?;
        let conn: &mut DbConn = &mut conn;
        conn.transaction(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Users { path: PathBuf },
    Site { site: String },
    Page { site: String, slug: String },
    File { site: String, page: String, file_id: DbId },
    ForumCategories { site: String },
    ForumCategory { site: String, path: PathBuf },
    ForumThread { site: String, path: PathBuf },
    ForumPost { thread_id: DbId, position: String },
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Users { path } => write!(f, "user batch {}", path.display()),
            Unit::Site { site } => write!(f, "site '{site}'"),
            Unit::Page { site, slug } => write!(f, "page '{site}/{slug}'"),
            Unit::File {
                site,
                page,
                file_id,
            } => write!(f, "file {file_id} of page '{site}/{page}'"),
            Unit::ForumCategories { site } => write!(f, "forum categories of site '{site}'"),
            Unit::ForumCategory { site, path } => {
                write!(f, "forum category {} of site '{site}'", path.display())
            }
            Unit::ForumThread { site, path } => {
                write!(f, "forum thread {} of site '{site}'", path.display())
            }
            Unit::ForumPost {
                thread_id,
                position,
            } => write!(f, "forum post {position} of thread {thread_id}"),
        }
    }
}

#[derive(Debug)]
pub struct Failure {
    pub unit: Unit,
    pub error: Error,
}

#[derive(Debug, Default)]
pub struct Report {
    pub completed: usize,
    pub failures: Vec<Failure>,
    /// Sub-entities skipped because the importer cannot extract them yet.
    pub unsupported: usize,
}

impl Report {
    fn record(&mut self, unit: Unit, result: Result<()>) {
        match result {
            Ok(()) => self.completed += 1,
            Err(error) => self.fail(unit, error),
        }
    }

    fn fail(&mut self, unit: Unit, error: Error) {
        tracing::error!("Failed to ingest {unit}: {error}");
        self.failures.push(Failure { unit, error });
    }

    #[must_use]
    pub fn failures_in(&self, category: Category) -> usize {
        self.failures
            .iter()
            .filter(|f| f.error.category() == category)
            .count()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            completed = self.completed,
            failed = self.failures.len(),
            unsupported = self.unsupported,
            "Import finished"
        );

        let mut by_category: BTreeMap<Category, Vec<&Failure>> = BTreeMap::new();
        for failure in &self.failures {
            by_category
                .entry(failure.error.category())
                .or_default()
                .push(failure);
        }

        for (category, failures) in by_category {
            tracing::warn!("{} unit(s) failed with {category}:", failures.len());
            for failure in failures {
                tracing::warn!("  {}: {}", failure.unit, failure.error);
            }
        }
    }
}

pub fn ingest_users(ctx: &Context, report: &mut Report) {
    tracing::info!("Ingesting all user data");

    let batches = match ctx.export.user_batches() {
        Ok(batches) => batches,
        Err(e) => {
            let path = ctx.export.root().join(walker::USERS_DIR);
            report.fail(Unit::Users { path }, e);
            return;
        }
    };

    for path in batches {
        let result = ingest_user_batch(ctx, &path);
        report.record(Unit::Users { path }, result);
    }
}

fn ingest_user_batch(ctx: &Context, path: &Path) -> Result<()> {
    tracing::info!("Ingesting users from {}", path.display());

    let doc = document::read_json(path)?;
    let users = mapper::users(&doc)?;

    let count = ctx.write(|conn| Ok(User::upsert_all(&users, conn)?))?;
    tracing::debug!("Inserted {count} user rows");
    Ok(())
}

pub fn ingest_sites(ctx: &Context, report: &mut Report) {
    tracing::info!("Ingesting all site data");

    let sites = match ctx.export.sites() {
        Ok(sites) => sites,
        Err(e) => {
            report.fail(
                Unit::Site {
                    site: ctx.export.root().display().to_string(),
                },
                e,
            );
            return;
        }
    };

    for site in sites {
        ingest_site(ctx, &site, report);
    }
}

pub fn ingest_site(ctx: &Context, site: &Site, report: &mut Report) {
    tracing::info!("Ingesting site '{}'", site.slug());
    ingest_pages(ctx, site, report);
    ingest_forums(ctx, site, report);
}

fn ingest_pages(ctx: &Context, site: &Site, report: &mut Report) {
    let (pages, file_map) = match site.page_ids().and_then(|p| Ok((p, site.file_map()?))) {
        Ok(maps) => maps,
        Err(e) => {
            let site = site.slug().to_owned();
            report.fail(Unit::Site { site }, e);
            return;
        }
    };
    tracing::info!("Processing {} pages", pages.len());

    for (page_id, slug) in pages {
        tracing::info!("Ingesting page '{slug}' (ID {page_id})");
        ingest_page(ctx, site, page_id, &slug, &file_map, report);
    }
}

fn ingest_page(
    ctx: &Context,
    site: &Site,
    mapped_id: DbId,
    slug: &str,
    file_map: &FileMap,
    report: &mut Report,
) {
    let page_unit = Unit::Page {
        site: site.slug().to_owned(),
        slug: slug.to_owned(),
    };

    match write_page(ctx, site, mapped_id, slug) {
        Ok((page_id, files)) => {
            report.record(page_unit, Ok(()));
            for meta in files {
                let result = write_file(ctx, site, page_id, &meta, file_map);
                report.record(
                    Unit::File {
                        site: site.slug().to_owned(),
                        page: slug.to_owned(),
                        file_id: meta.wikidot_id,
                    },
                    result,
                );
            }
        }
        Err(e) => report.fail(page_unit, e),
    }
}

/// Writes the page, its votes and its revisions as one unit, returning the
/// page id and the files still to be loaded.
fn write_page(
    ctx: &Context,
    site: &Site,
    mapped_id: DbId,
    slug: &str,
) -> Result<(DbId, Vec<FileMeta>)> {
    let doc = document::read_json(&site.page_metadata_path(slug))?;
    let page = mapper::page(&doc, site.slug(), slug)?;
    let page_id = page.page.wikidot_id;
    if page_id != mapped_id {
        tracing::warn!(
            "Page '{slug}' is listed as ID {mapped_id} but its metadata says {page_id}; using {page_id}"
        );
    }

    // All text is reconciled before any revision row is written.
    let texts = if page.revisions.is_empty() {
        tracing::debug!("Page '{slug}' has no revisions, not opening its archive");
        RevisionTexts::default()
    } else {
        RevisionTexts::load(ctx.archives, &site.page_archive_path(slug))?
    };
    if texts.is_empty() && !page.revisions.is_empty() {
        tracing::warn!("Archive for page '{slug}' holds no revision text");
    }
    tracing::debug!(
        "Archive has {} revisions, metadata declares {}",
        texts.len(),
        page.revisions.len()
    );
    let revisions = page
        .revisions
        .iter()
        .map(|meta| mapper::page_revision(page_id, meta, &texts))
        .collect::<Result<Vec<PageRevision>>>()?;

    ctx.write(|conn| {
        page.page.upsert(conn)?;
        tracing::debug!("Adding {} votes for this page", page.votes.len());
        PageVote::upsert_all(&page.votes, conn)?;
        tracing::debug!("Adding {} revisions for this page", revisions.len());
        PageRevision::upsert_all(&revisions, conn)?;
        Ok(())
    })?;

    Ok((page_id, page.files))
}

fn write_file(
    ctx: &Context,
    site: &Site,
    page_id: DbId,
    meta: &FileMeta,
    file_map: &FileMap,
) -> Result<()> {
    tracing::debug!("Loading file data for {}", meta.name);

    let location = mapper::file_location(meta, file_map)?;
    let path = site.file_path(location);
    let data = fs::read(&path).map_err(|e| Error::io(&path, e))?;
    let file = mapper::file(page_id, meta, data);

    tracing::debug!("Inserting file data for ID {}", file.wikidot_id);
    ctx.write(|conn| Ok(file.upsert(conn)?))?;
    Ok(())
}

fn ingest_forums(ctx: &Context, site: &Site, report: &mut Report) {
    tracing::info!("Ingesting all forum data for site '{}'", site.slug());
    ingest_forum_categories(ctx, site, report);
    ingest_forum_threads(ctx, site, report);
}

fn ingest_forum_categories(ctx: &Context, site: &Site, report: &mut Report) {
    let batch_unit = Unit::ForumCategories {
        site: site.slug().to_owned(),
    };

    let paths = match site.forum_categories() {
        Ok(paths) => paths,
        Err(e) => {
            report.fail(batch_unit, e);
            return;
        }
    };

    let mut categories = Vec::with_capacity(paths.len());
    for path in paths {
        match document::read_json(&path).and_then(|doc| mapper::forum_category(&doc, site.slug()))
        {
            Ok(category) => categories.push(category),
            Err(e) => report.fail(
                Unit::ForumCategory {
                    site: site.slug().to_owned(),
                    path,
                },
                e,
            ),
        }
    }

    tracing::info!("Inserting {} forum categories", categories.len());
    let result = ctx.write(|conn| {
        ForumCategory::upsert_all(&categories, conn)?;
        Ok(())
    });
    report.record(batch_unit, result);
}

fn ingest_forum_threads(ctx: &Context, site: &Site, report: &mut Report) {
    let threads = match site.forum_threads() {
        Ok(threads) => threads,
        Err(e) => {
            report.fail(
                Unit::Site {
                    site: site.slug().to_owned(),
                },
                e,
            );
            return;
        }
    };

    for source in threads {
        let result = ingest_forum_thread(ctx, &source, report);
        report.record(
            Unit::ForumThread {
                site: site.slug().to_owned(),
                path: source.path,
            },
            result,
        );
    }
}

/// Writes a thread with all of its posts and stored post revisions.
fn ingest_forum_thread(ctx: &Context, source: &ThreadSource, report: &mut Report) -> Result<()> {
    let forum_category_id = walker::parse_id(&source.category)?;
    let doc = document::read_json(&source.path)?;
    let (thread, roots) = mapper::forum_thread(&doc, forum_category_id)?;
    let thread_id = thread.wikidot_id;
    tracing::info!("Ingesting forum thread ID {thread_id}");

    let flat = forum::flatten(thread_id, roots);

    for failure in flat.failures {
        report.fail(
            Unit::ForumPost {
                thread_id,
                position: failure.position,
            },
            failure.error,
        );
    }

    for revision in &flat.unsupported {
        tracing::warn!(
            "Unsupported: revision {} of forum post {} has no body in the thread document, skipping",
            revision.wikidot_id,
            revision.forum_post_id
        );
    }
    report.unsupported += flat.unsupported.len();

    ctx.write(|conn| {
        thread.upsert(conn)?;
        tracing::debug!("Inserting {} forum posts", flat.posts.len());
        ForumPost::upsert_all(&flat.posts, conn)?;
        ForumPostRevision::upsert_all(&flat.revisions, conn)?;
        Ok(())
    })
}
