//! Turns export documents into entity records.
//!
//! Everything here is pure: documents and side-loaded content in, records
//! or errors out.

use serde_json::Value;
use url::Url;

use crate::{
    archive::RevisionTexts,
    document::Fields,
    error::{Error, FieldMismatch, Result},
    models::{
        file::File,
        forum::{ForumCategory, ForumPost, ForumPostRevision, ForumThread},
        page::{Page, PageRevision, PageVote},
        user::User,
        DbId,
    },
    walker::{FileLocation, FileMap},
};

fn user(value: &Value) -> Result<User, FieldMismatch> {
    let mut fields = Fields::new("user", value);
    let user = User {
        wikidot_id: fields.required("user_id"),
        created_at: fields.required("wikidot_user_since"),
        full_name: fields.required("full_name"),
        slug: fields.required("slug"),
        account_type: fields.required("account_type"),
        karma: fields.required("activity"),
    };
    fields.finish()?;
    Ok(user)
}

/// Decodes one user batch document.
///
/// The exporter writes either an object keyed by user id or an array of
/// `[key, user]` pairs.
pub fn users(doc: &Value) -> Result<Vec<User>> {
    let entries: Vec<(String, &Value)> = match doc {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Array(pair) if pair.len() == 2 => (format!("[{i}]"), &pair[1]),
                _ => (format!("[{i}]"), item),
            })
            .collect(),
        _ => {
            let mut batch = Fields::collect("user batch");
            batch.malformed("<document>", "expected an object or an array");
            batch.finish()?;
            return Ok(Vec::new());
        }
    };

    let mut batch = Fields::collect("user batch");
    let mut users = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        match user(value) {
            Ok(user) => users.push(user),
            Err(e) => batch.absorb(&key, e),
        }
    }
    batch.finish()?;

    Ok(users)
}

/// Normalizes a vote: booleans become `+1`/`-1`, integers are kept.
pub fn vote_value(user_id: DbId, value: &Value) -> Result<i64> {
    match value {
        Value::Bool(true) => Ok(1),
        Value::Bool(false) => Ok(-1),
        Value::Number(n) if n.is_i64() => Ok(n.as_i64().unwrap_or_default()),
        _ => Err(Error::VoteValue {
            user_id,
            value: value.clone(),
        }),
    }
}

/// Revision metadata, before its text is joined in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionMeta {
    pub wikidot_id: DbId,
    pub revision_number: i64,
    pub user_id: DbId,
    pub created_at: i64,
    pub flags: String,
    pub comments: String,
}

fn revision_meta(value: &Value) -> Result<RevisionMeta, FieldMismatch> {
    let mut fields = Fields::new("revision", value);
    let meta = RevisionMeta {
        wikidot_id: fields.required("global_revision"),
        revision_number: fields.required("revision"),
        user_id: fields.required("author"),
        created_at: fields.required("stamp"),
        flags: fields.or_default("flags"),
        comments: fields.or_default("commentary"),
    };
    fields.finish()?;
    Ok(meta)
}

/// File metadata from the page document, before its payload is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub wikidot_id: DbId,
    pub user_id: DbId,
    pub created_at: i64,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub mime: String,
    pub mime_description: String,
    pub internal_version: i64,
}

fn file_meta(value: &Value) -> Result<FileMeta, FieldMismatch> {
    let mut fields = Fields::new("file", value);
    let meta = FileMeta {
        wikidot_id: fields.required("file_id"),
        user_id: fields.required("author"),
        created_at: fields.required("stamp"),
        name: fields.required("name"),
        url: fields.required("url"),
        size: fields.required("size_bytes"),
        mime: fields.required("mime"),
        mime_description: fields.or_default("content"),
        internal_version: fields.required("internal_version"),
    };
    fields.finish()?;
    Ok(meta)
}

#[derive(Debug)]
pub struct PageDocument {
    pub page: Page,
    pub votes: Vec<PageVote>,
    pub revisions: Vec<RevisionMeta>,
    pub files: Vec<FileMeta>,
}

/// Decodes a page metadata document found at the path for `expected_slug`.
pub fn page(doc: &Value, site_slug: &str, expected_slug: &str) -> Result<PageDocument> {
    let mut fields = Fields::new("page", doc);

    let wikidot_id: DbId = fields.required("page_id");
    let declared_slug: String = fields.required("name");
    let title: String = fields.or_default("title");
    let tags: Vec<String> = fields.required("tags");
    let locked: bool = fields.required("is_locked");
    let discussion_thread_id: Option<DbId> = fields.optional("discussion_thread_id");
    let votings: Vec<(DbId, Value)> = fields.required("votings");

    let mut revisions = Vec::new();
    for (i, entry) in fields.array("revisions").iter().enumerate() {
        match revision_meta(entry) {
            Ok(meta) => revisions.push(meta),
            Err(e) => fields.absorb(&format!("revisions[{i}]"), e),
        }
    }

    let mut files = Vec::new();
    for (i, entry) in fields.array_or_empty("files").iter().enumerate() {
        match file_meta(entry) {
            Ok(meta) => files.push(meta),
            Err(e) => fields.absorb(&format!("files[{i}]"), e),
        }
    }

    fields.finish()?;

    if declared_slug != expected_slug {
        return Err(Error::SlugMismatch {
            declared: declared_slug,
            expected: expected_slug.to_owned(),
        });
    }

    let votes: Vec<PageVote> = votings
        .iter()
        .map(|(user_id, value)| {
            Ok(PageVote {
                page_id: wikidot_id,
                user_id: *user_id,
                value: vote_value(*user_id, value)?,
            })
        })
        .collect::<Result<_>>()?;

    Ok(PageDocument {
        page: Page {
            wikidot_id,
            site_slug: site_slug.to_owned(),
            page_slug: declared_slug,
            title,
            tags,
            locked,
            discussion_thread_id,
        },
        votes,
        revisions,
        files,
    })
}

/// Joins revision metadata with its archived text by revision number.
pub fn page_revision(
    page_id: DbId,
    meta: &RevisionMeta,
    texts: &RevisionTexts,
) -> Result<PageRevision> {
    let wikitext = texts.text(meta.revision_number)?;

    Ok(PageRevision {
        wikidot_id: meta.wikidot_id,
        revision_number: meta.revision_number,
        page_id,
        user_id: meta.user_id,
        created_at: meta.created_at,
        flags: meta.flags.clone(),
        comments: meta.comments.clone(),
        wikitext: wikitext.to_owned(),
    })
}

fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Finds the file map entry for a file and checks that both sources agree
/// on its URL.
pub fn file_location<'m>(meta: &FileMeta, file_map: &'m FileMap) -> Result<&'m FileLocation> {
    let location = file_map
        .get(&meta.wikidot_id)
        .ok_or(Error::UnmappedFile(meta.wikidot_id))?;

    if !same_url(&meta.url, &location.url) {
        return Err(Error::UrlMismatch {
            file_id: meta.wikidot_id,
            declared: meta.url.clone(),
            mapped: location.url.clone(),
        });
    }

    Ok(location)
}

#[must_use]
pub fn file(page_id: DbId, meta: &FileMeta, data: Vec<u8>) -> File {
    File {
        wikidot_id: meta.wikidot_id,
        page_id,
        user_id: meta.user_id,
        created_at: meta.created_at,
        name: meta.name.clone(),
        url: meta.url.clone(),
        size: meta.size,
        mime: meta.mime.clone(),
        mime_description: meta.mime_description.clone(),
        internal_version: meta.internal_version,
        data,
    }
}

pub fn forum_category(doc: &Value, site_slug: &str) -> Result<ForumCategory> {
    let mut fields = Fields::new("forum category", doc);
    let category = ForumCategory {
        wikidot_id: fields.required("id"),
        site_slug: site_slug.to_owned(),
        title: fields.required("title"),
        description: fields.or_default("description"),
    };
    fields.finish()?;
    Ok(category)
}

/// Decodes a thread document, returning the thread and its root posts.
pub fn forum_thread(doc: &Value, forum_category_id: DbId) -> Result<(ForumThread, &[Value])> {
    let mut fields = Fields::new("forum thread", doc);
    let thread = ForumThread {
        wikidot_id: fields.required("id"),
        forum_category_id,
        title: fields.or_default("title"),
        description: fields.or_default("description"),
        user_id: fields.optional("startedUser"),
        created_at: fields.required("started"),
        locked: fields.optional("locked"),
        sticky: fields.or_default("sticky"),
    };
    let posts = fields.array_or_empty("posts");
    fields.finish()?;
    Ok((thread, posts))
}

/// A decoded post plus the parts of its document still to be walked.
#[derive(Debug)]
pub struct PostDocument<'a> {
    pub post: ForumPost,
    pub children: &'a [Value],
    pub revisions: &'a [Value],
}

pub fn forum_post(
    value: &Value,
    forum_thread_id: DbId,
    parent_post_id: Option<DbId>,
) -> Result<PostDocument<'_>, FieldMismatch> {
    let mut fields = Fields::new("forum post", value);
    let post = ForumPost {
        wikidot_id: fields.required("id"),
        forum_thread_id,
        parent_post_id,
        user_id: fields.required("poster"),
        created_at: fields.required("stamp"),
        title: fields.or_default("title"),
    };
    let children = fields.array_or_empty("children");
    let revisions = fields.array_or_empty("revisions");
    fields.finish()?;

    Ok(PostDocument {
        post,
        children,
        revisions,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRevision {
    /// The entry carries its own body.
    Stored(ForumPostRevision),
    /// Only metadata is present; the body lives elsewhere in the export.
    BodyUnavailable { wikidot_id: DbId },
}

pub fn forum_post_revision(
    value: &Value,
    forum_post_id: DbId,
) -> Result<PostRevision, FieldMismatch> {
    let mut fields = Fields::new("forum post revision", value);
    let wikidot_id: DbId = fields.required("id");
    let user_id: DbId = fields.required("author");
    let created_at: i64 = fields.required("stamp");
    let title: String = fields.or_default("title");
    let html: Option<String> = fields.optional("html");
    let wikitext: Option<String> = fields.optional("wikitext");
    fields.finish()?;

    Ok(match html {
        Some(html) => PostRevision::Stored(ForumPostRevision {
            wikidot_id,
            forum_post_id,
            user_id,
            created_at,
            title,
            html,
            wikitext,
        }),
        None => PostRevision::BodyUnavailable { wikidot_id },
    })
}
