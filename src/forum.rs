//! Flattens nested forum post documents.
//!
//! A thread document holds root posts, each with a `children` list of
//! replies and a `revisions` list of edits. The tree is walked with an
//! explicit stack rather than recursion, and nesting deeper than
//! [`MAX_POST_DEPTH`] is rejected.

use serde_json::Value;

use crate::{
    error::Error,
    mapper::{self, PostRevision},
    models::{
        forum::{ForumPost, ForumPostRevision},
        DbId,
    },
};

/// Root posts are at depth 1.
pub const MAX_POST_DEPTH: usize = 64;

/// A post that could not be flattened. Its replies are dropped with it,
/// since they have no parent to point at.
#[derive(Debug)]
pub struct PostFailure {
    /// `parent/index` path of the post within the thread.
    pub position: String,
    pub error: Error,
}

/// A post revision whose body is not in the thread document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedRevision {
    pub forum_post_id: DbId,
    pub wikidot_id: DbId,
}

#[derive(Debug, Default)]
pub struct FlatThread {
    /// Posts in pre-order: each post before its replies.
    pub posts: Vec<ForumPost>,
    pub revisions: Vec<ForumPostRevision>,
    pub unsupported: Vec<UnsupportedRevision>,
    pub failures: Vec<PostFailure>,
}

enum Frame<'a> {
    Post {
        value: &'a Value,
        parent: Option<DbId>,
        depth: usize,
        position: String,
    },
    /// Visited once every reply of the post has been visited.
    Revisions {
        post_id: DbId,
        entries: &'a [Value],
        position: String,
    },
}

fn push_posts<'a>(
    stack: &mut Vec<Frame<'a>>,
    posts: &'a [Value],
    parent: Option<DbId>,
    depth: usize,
    prefix: &str,
) {
    // Reversed so the first post is popped first.
    for (i, value) in posts.iter().enumerate().rev() {
        stack.push(Frame::Post {
            value,
            parent,
            depth,
            position: format!("{prefix}/{i}"),
        });
    }
}

pub fn flatten(forum_thread_id: DbId, roots: &[Value]) -> FlatThread {
    let mut flat = FlatThread::default();
    let mut stack = Vec::new();
    push_posts(&mut stack, roots, None, 1, "");

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Post {
                value,
                parent,
                depth,
                position,
            } => {
                if depth > MAX_POST_DEPTH {
                    flat.failures.push(PostFailure {
                        position,
                        error: Error::DepthExceeded(MAX_POST_DEPTH),
                    });
                    continue;
                }

                let doc = match mapper::forum_post(value, forum_thread_id, parent) {
                    Ok(doc) => doc,
                    Err(e) => {
                        flat.failures.push(PostFailure {
                            position,
                            error: e.into(),
                        });
                        continue;
                    }
                };

                let post_id = doc.post.wikidot_id;
                tracing::trace!(
                    "Flattened post {} (parent {:?}, depth {})",
                    post_id,
                    parent,
                    depth
                );
                flat.posts.push(doc.post);

                stack.push(Frame::Revisions {
                    post_id,
                    entries: doc.revisions,
                    position: position.clone(),
                });
                push_posts(&mut stack, doc.children, Some(post_id), depth + 1, &position);
            }
            Frame::Revisions {
                post_id,
                entries,
                position,
            } => {
                // An empty list means the post was never edited.
                for entry in entries {
                    match mapper::forum_post_revision(entry, post_id) {
                        Ok(PostRevision::Stored(revision)) => flat.revisions.push(revision),
                        Ok(PostRevision::BodyUnavailable { wikidot_id }) => {
                            flat.unsupported.push(UnsupportedRevision {
                                forum_post_id: post_id,
                                wikidot_id,
                            });
                        }
                        Err(e) => flat.failures.push(PostFailure {
                            position: format!("{position}/revisions"),
                            error: e.into(),
                        }),
                    }
                }
            }
        }
    }

    flat
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn post(id: DbId, children: Value) -> Value {
        json!({
            "id": id,
            "poster": 7,
            "stamp": 1000 + id,
            "title": format!("post {id}"),
            "children": children,
            "revisions": []
        })
    }

    #[test]
    fn flattens_with_parent_chain() {
        // A -> [B -> [D], C]
        let roots = vec![post(
            1,
            json!([post(2, json!([post(4, json!([]))])), post(3, json!([]))]),
        )];

        let flat = flatten(50, &roots);

        let chain: Vec<_> = flat
            .posts
            .iter()
            .map(|p| (p.wikidot_id, p.parent_post_id))
            .collect();
        assert_eq!(
            vec![(1, None), (2, Some(1)), (4, Some(2)), (3, Some(1))],
            chain
        );
        assert!(flat.posts.iter().all(|p| p.forum_thread_id == 50));
        assert!(flat.failures.is_empty());
        assert!(flat.revisions.is_empty());
        assert!(flat.unsupported.is_empty());
    }

    #[test]
    fn rejects_nesting_past_limit() {
        let mut node = post(1000, json!([]));
        for id in (1..=MAX_POST_DEPTH as DbId).rev() {
            node = post(id, json!([node]));
        }

        let flat = flatten(1, &[node]);

        assert_eq!(MAX_POST_DEPTH, flat.posts.len());
        assert_eq!(1, flat.failures.len());
        assert!(matches!(flat.failures[0].error, Error::DepthExceeded(_)));
    }

    #[test]
    fn bad_post_drops_only_its_subtree() {
        let roots = vec![
            json!({ "id": 1, "children": [post(2, json!([]))] }),
            post(3, json!([])),
        ];

        let flat = flatten(1, &roots);

        assert_eq!(vec![3], flat.posts.iter().map(|p| p.wikidot_id).collect::<Vec<_>>());
        assert_eq!(1, flat.failures.len());
        assert_eq!("/0", flat.failures[0].position);
    }

    #[test]
    fn collects_revisions_after_replies() {
        let mut root = post(1, json!([post(2, json!([]))]));
        root["revisions"] = json!([
            { "id": 90, "author": 7, "stamp": 5, "title": "old", "html": "<p>old</p>" },
            { "id": 91, "author": 7, "stamp": 6 }
        ]);

        let flat = flatten(1, &[root]);

        assert_eq!(2, flat.posts.len());
        assert_eq!(1, flat.revisions.len());
        assert_eq!(90, flat.revisions[0].wikidot_id);
        assert_eq!(1, flat.revisions[0].forum_post_id);
        assert_eq!(
            vec![UnsupportedRevision {
                forum_post_id: 1,
                wikidot_id: 91
            }],
            flat.unsupported
        );
    }
}
