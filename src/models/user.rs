use diesel::prelude::*;

use crate::{
    models::{DbConn, DbId},
    schema::user,
};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = user)]
pub struct User {
    pub wikidot_id: DbId,
    pub created_at: i64,
    pub full_name: String,
    pub slug: String,
    pub account_type: String,
    pub karma: i64,
}

impl User {
    #[cfg(test)]
    pub fn all(conn: &mut DbConn) -> QueryResult<Vec<Self>> {
        user::table
            .select(Self::as_select())
            .order(user::wikidot_id)
            .load(conn)
    }

    /// Inserts or replaces each user by `wikidot_id`.
    pub fn upsert_all(users: &[Self], conn: &mut DbConn) -> QueryResult<usize> {
        users.iter().try_fold(0, |count, row| {
            diesel::replace_into(user::table)
                .values(row)
                .execute(conn)
                .map(|n| count + n)
        })
    }
}
