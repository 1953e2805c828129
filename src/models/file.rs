use diesel::prelude::*;

use crate::{
    models::{DbConn, DbId},
    schema::file,
};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = file)]
pub struct File {
    pub wikidot_id: DbId,
    pub page_id: DbId,
    pub user_id: DbId,
    pub created_at: i64,
    pub name: String,
    pub url: String,
    pub size: i64,
    pub mime: String,
    pub mime_description: String,
    pub internal_version: i64,
    pub data: Vec<u8>,
}

impl File {
    #[cfg(test)]
    pub fn with_page(page_id: DbId, conn: &mut DbConn) -> QueryResult<Vec<Self>> {
        file::table
            .filter(file::page_id.eq(page_id))
            .select(Self::as_select())
            .order(file::wikidot_id)
            .load(conn)
    }

    pub fn upsert(&self, conn: &mut DbConn) -> QueryResult<usize> {
        diesel::replace_into(file::table).values(self).execute(conn)
    }
}
