use diesel::prelude::*;

use crate::{
    error::{Error, Result},
    models::{DbConn, DbId},
    schema::{page, page_revision, page_vote},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub wikidot_id: DbId,
    pub site_slug: String,
    pub page_slug: String,
    pub title: String,
    pub tags: Vec<String>,
    pub locked: bool,
    pub discussion_thread_id: Option<DbId>,
}

impl Page {
    /// Inserts or replaces the page by `wikidot_id`. Tags are stored as a
    /// JSON array.
    pub fn upsert(&self, conn: &mut DbConn) -> Result<usize> {
        let tags = serde_json::to_string(&self.tags).map_err(|source| Error::Encode {
            what: "page tags",
            source,
        })?;

        let row = NewPage {
            wikidot_id: self.wikidot_id,
            site_slug: &self.site_slug,
            page_slug: &self.page_slug,
            title: &self.title,
            tags: &tags,
            locked: self.locked,
            discussion_thread_id: self.discussion_thread_id,
        };

        Ok(diesel::replace_into(page::table)
            .values(&row)
            .execute(conn)?)
    }
}

#[allow(clippy::module_name_repetitions)]
#[derive(Insertable)]
#[diesel(table_name = page)]
struct NewPage<'a> {
    wikidot_id: DbId,
    site_slug: &'a str,
    page_slug: &'a str,
    title: &'a str,
    tags: &'a str,
    locked: bool,
    discussion_thread_id: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = page_revision)]
pub struct PageRevision {
    pub wikidot_id: DbId,
    pub revision_number: i64,
    pub page_id: DbId,
    pub user_id: DbId,
    pub created_at: i64,
    pub flags: String,
    pub comments: String,
    pub wikitext: String,
}

impl PageRevision {
    #[cfg(test)]
    pub fn with_page(page_id: DbId, conn: &mut DbConn) -> QueryResult<Vec<Self>> {
        page_revision::table
            .filter(page_revision::page_id.eq(page_id))
            .select(Self::as_select())
            .order(page_revision::revision_number)
            .load(conn)
    }

    /// Inserts or replaces each revision by `wikidot_id`.
    pub fn upsert_all(revisions: &[Self], conn: &mut DbConn) -> QueryResult<usize> {
        revisions.iter().try_fold(0, |count, row| {
            diesel::replace_into(page_revision::table)
                .values(row)
                .execute(conn)
                .map(|n| count + n)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = page_vote)]
pub struct PageVote {
    pub page_id: DbId,
    pub user_id: DbId,
    pub value: i64,
}

impl PageVote {
    #[cfg(test)]
    pub fn with_page(page_id: DbId, conn: &mut DbConn) -> QueryResult<Vec<Self>> {
        page_vote::table
            .filter(page_vote::page_id.eq(page_id))
            .select(Self::as_select())
            .order(page_vote::user_id)
            .load(conn)
    }

    /// Inserts or replaces each vote by `(page_id, user_id)`.
    pub fn upsert_all(votes: &[Self], conn: &mut DbConn) -> QueryResult<usize> {
        votes.iter().try_fold(0, |count, row| {
            diesel::replace_into(page_vote::table)
                .values(row)
                .execute(conn)
                .map(|n| count + n)
        })
    }
}
