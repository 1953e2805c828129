use std::error::Error;

use diesel::{
    r2d2::{ConnectionManager, Pool, PoolError},
    SqliteConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub mod file;
pub mod forum;
pub mod page;
pub mod user;

pub type DbId = i64;
pub type DbConn = SqliteConnection;
pub type DbPool = Pool<ConnectionManager<DbConn>>;

/// The importer is sequential, so one connection is enough; it also keeps
/// an in-memory database alive across checkouts.
pub fn establish_connection_pool(url: &str) -> Result<DbPool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(url);
    Pool::builder()
        .max_size(1)
        .test_on_check_out(true)
        .build(manager)
}

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Creates every table. Already-applied migrations are skipped, so this is
/// safe to run on each import.
pub fn run_migrations(conn: &mut DbConn) -> Result<(), Box<dyn Error + Send + Sync + 'static>> {
    conn.run_pending_migrations(MIGRATIONS)?;

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use diesel::prelude::*;

    use super::*;
    use crate::schema::user;

    pub fn memory_pool() -> DbPool {
        let pool = establish_connection_pool(":memory:").unwrap();
        run_migrations(&mut pool.get().unwrap()).unwrap();
        pool
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();

        run_migrations(&mut conn).unwrap();

        let users: i64 = user::table.count().get_result(&mut conn).unwrap();
        assert_eq!(0, users);
    }
}
