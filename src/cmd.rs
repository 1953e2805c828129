use std::path::Path;

use anyhow::{anyhow, bail};
use tracing::info;

use crate::{
    archive::ArchiveReader,
    error::Category,
    ingest::{self, Context, Report},
    models,
    walker::Export,
};

#[derive(Debug)]
pub struct Config<'a> {
    pub src: &'a Path,
    pub database_url: &'a str,
    pub replace_colons: bool,
}

/// Sets up the schema, then ingests users followed by every site.
///
/// Only configuration problems are returned as errors; everything else is
/// collected in the returned [`Report`].
pub fn import(config: &Config, archives: &dyn ArchiveReader) -> anyhow::Result<Report> {
    let export = Export::open(config.src, config.replace_colons)?;

    let pool = models::establish_connection_pool(config.database_url)?;
    {
        // The pool holds a single connection.
        let mut conn = pool.get()?;
        models::run_migrations(&mut conn).map_err(|e| anyhow!(e))?;
    }

    let ctx = Context {
        export: &export,
        archives,
        pool: &pool,
    };
    let mut report = Report::default();

    ingest::ingest_users(&ctx, &mut report);
    ingest::ingest_sites(&ctx, &mut report);

    report.log_summary();

    Ok(report)
}

/// How many failed units a run may have and still succeed.
#[derive(Debug, Default)]
pub struct Tolerance {
    pub max_failures: Option<usize>,
    pub fail_on: Vec<Category>,
}

impl Tolerance {
    pub fn check(&self, report: &Report) -> anyhow::Result<()> {
        for &category in &self.fail_on {
            let count = report.failures_in(category);
            if count > 0 {
                bail!("{count} unit(s) failed with {category}");
            }
        }

        if let Some(max) = self.max_failures {
            if report.failures.len() > max {
                bail!(
                    "{} unit(s) failed, more than the {max} allowed",
                    report.failures.len()
                );
            }
        }

        info!("Import completed within tolerance");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use diesel::prelude::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use super::*;
    use crate::{
        archive::tests::DirectoryArchive,
        error::Error,
        ingest::Unit,
        models::{
            file::File,
            forum::ForumPost,
            page::{PageRevision, PageVote},
            user::User,
            DbConn,
        },
        schema::{
            file, forum_category, forum_post, forum_thread, page, page_revision, page_vote, user,
        },
    };

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let fixture = Self {
                dir: tempfile::tempdir().unwrap(),
            };
            fs::create_dir_all(fixture.export().join("_users")).unwrap();
            fixture
        }

        fn export(&self) -> PathBuf {
            self.dir.path().join("export")
        }

        fn database(&self) -> String {
            self.dir.path().join("out.sqlite").display().to_string()
        }

        fn write(&self, path: &str, contents: &[u8]) {
            let path = self.export().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        fn write_json(&self, path: &str, value: &Value) {
            self.write(path, value.to_string().as_bytes());
        }

        fn import(&self) -> Report {
            let src = self.export();
            let database_url = self.database();
            import(
                &Config {
                    src: &src,
                    database_url: &database_url,
                    replace_colons: true,
                },
                &DirectoryArchive,
            )
            .unwrap()
        }

        fn conn(&self) -> DbConn {
            DbConn::establish(&self.database()).unwrap()
        }
    }

    fn revision(global: i64, number: i64) -> Value {
        json!({
            "global_revision": global, "revision": number, "stamp": 1000 + number,
            "flags": "S", "author": 7, "commentary": ""
        })
    }

    fn page_meta(id: i64, slug: &str, revisions: Vec<Value>, files: Vec<Value>) -> Value {
        json!({
            "page_id": id,
            "name": slug,
            "title": slug.to_uppercase(),
            "tags": ["test"],
            "is_locked": false,
            "votings": [[7, true], [8, -1], [9, 0]],
            "revisions": revisions,
            "files": files
        })
    }

    fn file_meta(id: i64, name: &str, url: &str) -> Value {
        json!({
            "file_id": id, "name": name, "url": url, "size_bytes": 4, "mime": "text/plain",
            "content": "ASCII text", "author": 7, "stamp": 5, "internal_version": 1
        })
    }

    /// A site with two good pages, one page missing archived text, one
    /// file with a mismatched URL, and a forum thread.
    fn populate(fixture: &Fixture) {
        fixture.write_json(
            "_users/users-1.json",
            &json!({
                "7": { "user_id": 7, "full_name": "Alice", "slug": "alice",
                       "wikidot_user_since": 10, "account_type": "free", "activity": 2 },
                "8": { "user_id": 8, "full_name": "Bob", "slug": "bob",
                       "wikidot_user_since": 20, "account_type": "pro", "activity": 0 }
            }),
        );
        fixture.write("_users/pending.json", b"not json");

        fixture.write_json(
            "wiki/meta/page_id_map.json",
            &json!({ "100": "start", "200": "broken", "300": "component:box" }),
        );
        fixture.write_json(
            "wiki/meta/file_map.json",
            &json!({
                "41": { "path": "start/a.txt", "url": "http://wiki.example/local--files/start/a.txt" },
                "42": { "path": "start/b.txt", "url": "http://wiki.example/local--files/start/other.txt" }
            }),
        );
        fixture.write("wiki/files/start/a.txt", b"aaaa");
        fixture.write("wiki/files/start/b.txt", b"bbbb");

        // Global ids 2 and 1 collide with the other revision's number.
        fixture.write_json(
            "wiki/meta/pages/start.json",
            &page_meta(
                100,
                "start",
                vec![revision(2, 1), revision(1, 2)],
                vec![
                    file_meta(41, "a.txt", "http://wiki.example/local--files/start/a.txt"),
                    file_meta(42, "b.txt", "http://wiki.example/local--files/start/b.txt"),
                ],
            ),
        );
        fixture.write("wiki/pages/start.7z/1.txt", b"Hello");
        fixture.write("wiki/pages/start.7z/2.txt", b"World");

        fixture.write_json(
            "wiki/meta/pages/broken.json",
            &page_meta(200, "broken", vec![revision(601, 1), revision(603, 3)], vec![]),
        );
        fixture.write("wiki/pages/broken.7z/1.txt", b"only one");

        fixture.write_json(
            "wiki/meta/pages/component_box.json",
            &page_meta(300, "component:box", vec![revision(701, 1)], vec![]),
        );
        fixture.write("wiki/pages/component_box.7z/1.txt", b"[[div]]");

        fixture.write_json(
            "wiki/meta/forum/category/5.json",
            &json!({ "id": 5, "title": "General", "description": "Talk" }),
        );
        fixture.write_json(
            "wiki/meta/forum/5/77.json",
            &json!({
                "id": 77, "title": "Hello", "description": "", "started": 1,
                "startedUser": 7, "sticky": true,
                "posts": [{
                    "id": 1, "poster": 7, "stamp": 1, "title": "A", "revisions": [],
                    "children": [
                        { "id": 2, "poster": 8, "stamp": 2, "title": "B", "revisions": [],
                          "children": [
                            { "id": 4, "poster": 7, "stamp": 4, "title": "D",
                              "revisions": [], "children": [] }
                          ] },
                        { "id": 3, "poster": 8, "stamp": 3, "title": "C", "children": [],
                          "revisions": [{ "id": 90, "author": 8, "stamp": 9 }] }
                    ]
                }]
            }),
        );
    }

    fn snapshot(conn: &mut DbConn) -> Vec<i64> {
        vec![
            user::table.count().get_result(conn).unwrap(),
            page::table.count().get_result(conn).unwrap(),
            page_revision::table.count().get_result(conn).unwrap(),
            page_vote::table.count().get_result(conn).unwrap(),
            file::table.count().get_result(conn).unwrap(),
            forum_category::table.count().get_result(conn).unwrap(),
            forum_thread::table.count().get_result(conn).unwrap(),
            forum_post::table.count().get_result(conn).unwrap(),
        ]
    }

    #[test]
    fn missing_root_is_fatal() {
        let fixture = Fixture::new();
        fs::remove_dir(fixture.export().join("_users")).unwrap();

        let src = fixture.export();
        let database_url = fixture.database();
        let result = import(
            &Config {
                src: &src,
                database_url: &database_url,
                replace_colons: false,
            },
            &DirectoryArchive,
        );

        assert!(result.is_err());
        assert!(!Path::new(&database_url).exists());
    }

    #[test]
    fn joins_revision_text_by_number() {
        let fixture = Fixture::new();
        populate(&fixture);
        fixture.import();

        let revisions = PageRevision::with_page(100, &mut fixture.conn()).unwrap();
        let pairs: Vec<_> = revisions
            .iter()
            .map(|r| (r.wikidot_id, r.revision_number, r.wikitext.as_str()))
            .collect();
        assert_eq!(vec![(2, 1, "Hello"), (1, 2, "World")], pairs);
    }

    #[test]
    fn missing_archive_entry_fails_only_that_page() {
        let fixture = Fixture::new();
        populate(&fixture);
        let report = fixture.import();

        let page_failures: Vec<_> = report
            .failures
            .iter()
            .filter(|f| matches!(f.unit, Unit::Page { .. }))
            .collect();
        assert_eq!(1, page_failures.len());
        assert_eq!(
            Unit::Page {
                site: "wiki".into(),
                slug: "broken".into()
            },
            page_failures[0].unit
        );
        assert!(matches!(
            page_failures[0].error,
            Error::MissingRevisionText { revision_number: 3 }
        ));

        let mut conn = fixture.conn();
        let pages: Vec<String> = page::table
            .select(page::page_slug)
            .order(page::page_slug)
            .load(&mut conn)
            .unwrap();
        assert_eq!(vec!["component:box", "start"], pages);
        assert!(PageRevision::with_page(200, &mut conn).unwrap().is_empty());
        assert_eq!(1, PageRevision::with_page(300, &mut conn).unwrap().len());
    }

    #[test]
    fn file_url_mismatch_rejects_only_that_file() {
        let fixture = Fixture::new();
        populate(&fixture);
        let report = fixture.import();

        let file_failures: Vec<_> = report
            .failures
            .iter()
            .filter(|f| matches!(f.unit, Unit::File { .. }))
            .collect();
        assert_eq!(1, file_failures.len());
        assert!(matches!(
            file_failures[0].error,
            Error::UrlMismatch { file_id: 42, .. }
        ));

        let files = File::with_page(100, &mut fixture.conn()).unwrap();
        assert_eq!(1, files.len());
        assert_eq!("a.txt", files[0].name);
        assert_eq!(b"aaaa".to_vec(), files[0].data);
    }

    #[test]
    fn stores_normalized_votes_and_users() {
        let fixture = Fixture::new();
        populate(&fixture);
        fixture.import();

        let mut conn = fixture.conn();
        let votes: Vec<_> = PageVote::with_page(100, &mut conn)
            .unwrap()
            .into_iter()
            .map(|v| (v.user_id, v.value))
            .collect();
        assert_eq!(vec![(7, 1), (8, -1), (9, 0)], votes);

        let users = User::all(&mut conn).unwrap();
        assert_eq!(vec!["alice", "bob"], users.iter().map(|u| u.slug.as_str()).collect::<Vec<_>>());

        let tags: String = page::table
            .filter(page::wikidot_id.eq(100))
            .select(page::tags)
            .get_result(&mut conn)
            .unwrap();
        assert_eq!(r#"["test"]"#, tags);
    }

    #[test]
    fn flattens_forum_threads() {
        let fixture = Fixture::new();
        populate(&fixture);
        let report = fixture.import();

        let posts = ForumPost::with_thread(77, &mut fixture.conn()).unwrap();
        let chain: Vec<_> = posts
            .iter()
            .map(|p| (p.wikidot_id, p.parent_post_id))
            .collect();
        assert_eq!(
            vec![(1, None), (2, Some(1)), (3, Some(1)), (4, Some(2))],
            chain
        );
        assert_eq!(1, report.unsupported);
    }

    #[test]
    fn page_without_revisions_needs_no_archive() {
        let fixture = Fixture::new();
        fixture.write_json("wiki/meta/page_id_map.json", &json!({ "500": "empty" }));
        fixture.write_json(
            "wiki/meta/pages/empty.json",
            &page_meta(500, "empty", vec![], vec![]),
        );

        let report = fixture.import();

        assert!(report.failures.is_empty());
        let mut conn = fixture.conn();
        let pages: i64 = page::table.count().get_result(&mut conn).unwrap();
        assert_eq!(1, pages);
        assert_eq!(3, PageVote::with_page(500, &mut conn).unwrap().len());
        assert!(PageRevision::with_page(500, &mut conn).unwrap().is_empty());
    }

    #[test]
    fn reimport_is_idempotent() {
        let fixture = Fixture::new();
        populate(&fixture);

        let first = fixture.import();
        let mut conn = fixture.conn();
        let counts = snapshot(&mut conn);
        let revisions = PageRevision::with_page(100, &mut conn).unwrap();
        let posts = ForumPost::with_thread(77, &mut conn).unwrap();
        drop(conn);

        let second = fixture.import();
        let mut conn = fixture.conn();

        assert_eq!(counts, snapshot(&mut conn));
        assert_eq!(vec![2, 2, 3, 6, 1, 1, 1, 4], counts);
        assert_eq!(revisions, PageRevision::with_page(100, &mut conn).unwrap());
        assert_eq!(posts, ForumPost::with_thread(77, &mut conn).unwrap());
        assert_eq!(first.completed, second.completed);
        assert_eq!(first.failures.len(), second.failures.len());
    }

    #[test]
    fn tolerance_decides_exit_status() {
        let fixture = Fixture::new();
        populate(&fixture);
        let report = fixture.import();
        assert_eq!(2, report.failures.len());

        assert!(Tolerance::default().check(&report).is_ok());
        let lenient = Tolerance {
            max_failures: Some(2),
            fail_on: vec![Category::Storage],
        };
        assert!(lenient.check(&report).is_ok());
        let strict = Tolerance {
            max_failures: Some(1),
            fail_on: Vec::new(),
        };
        assert!(strict.check(&report).is_err());
        let gaps = Tolerance {
            max_failures: None,
            fail_on: vec![Category::IntegrityGap],
        };
        assert!(gaps.check(&report).is_err());
    }
}
