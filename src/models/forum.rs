use diesel::prelude::*;

use crate::{
    models::{DbConn, DbId},
    schema::{forum_category, forum_post, forum_post_revision, forum_thread},
};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = forum_category)]
pub struct ForumCategory {
    pub wikidot_id: DbId,
    pub site_slug: String,
    pub title: String,
    pub description: String,
}

impl ForumCategory {
    pub fn upsert_all(categories: &[Self], conn: &mut DbConn) -> QueryResult<usize> {
        categories.iter().try_fold(0, |count, row| {
            diesel::replace_into(forum_category::table)
                .values(row)
                .execute(conn)
                .map(|n| count + n)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = forum_thread)]
pub struct ForumThread {
    pub wikidot_id: DbId,
    pub forum_category_id: DbId,
    pub title: String,
    pub description: String,
    /// `None` for threads started by Wikidot itself.
    pub user_id: Option<DbId>,
    pub created_at: i64,
    /// `None` when the export does not say.
    pub locked: Option<bool>,
    pub sticky: bool,
}

impl ForumThread {
    pub fn upsert(&self, conn: &mut DbConn) -> QueryResult<usize> {
        diesel::replace_into(forum_thread::table)
            .values(self)
            .execute(conn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = forum_post)]
pub struct ForumPost {
    pub wikidot_id: DbId,
    pub forum_thread_id: DbId,
    pub parent_post_id: Option<DbId>,
    pub user_id: DbId,
    pub created_at: i64,
    pub title: String,
}

impl ForumPost {
    #[cfg(test)]
    pub fn with_thread(thread_id: DbId, conn: &mut DbConn) -> QueryResult<Vec<Self>> {
        forum_post::table
            .filter(forum_post::forum_thread_id.eq(thread_id))
            .select(Self::as_select())
            .order(forum_post::wikidot_id)
            .load(conn)
    }

    pub fn upsert_all(posts: &[Self], conn: &mut DbConn) -> QueryResult<usize> {
        posts.iter().try_fold(0, |count, row| {
            diesel::replace_into(forum_post::table)
                .values(row)
                .execute(conn)
                .map(|n| count + n)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = forum_post_revision)]
pub struct ForumPostRevision {
    pub wikidot_id: DbId,
    pub forum_post_id: DbId,
    pub user_id: DbId,
    pub created_at: i64,
    pub title: String,
    pub html: String,
    pub wikitext: Option<String>,
}

impl ForumPostRevision {
    pub fn upsert_all(revisions: &[Self], conn: &mut DbConn) -> QueryResult<usize> {
        revisions.iter().try_fold(0, |count, row| {
            diesel::replace_into(forum_post_revision::table)
                .values(row)
                .execute(conn)
                .map(|n| count + n)
        })
    }
}
