//! Threaded display ordering.
//!
//! A post has at most one reply, so a thread is a chain hanging off a root
//! post. The assembler emits every root of the page followed by its chain,
//! indenting each level by [`DEPTH_STEP`].

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::domain::post::Post;

pub const DEPTH_STEP: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct ThreadEntry {
    #[serde(flatten)]
    pub post: Post,
    pub depth: usize,
    /// Leaves are the only posts that can still receive a reply.
    pub is_leaf: bool,
}

/// Builds the threaded ordering for one page.
///
/// `page` is the sorted page as returned by the store; roots keep that order.
/// `descendants` holds replies living outside the page so chains are never
/// cut at a page boundary. Replies whose root is not on the page are not
/// emitted.
///
/// Each step moves to a post whose parent is the current one, and a post has
/// a single parent, so a walk from a root never revisits a post. Posts in a
/// parent cycle have no root and are skipped.
pub fn assemble(page: &[Post], descendants: &[Post]) -> Vec<ThreadEntry> {
    let mut replies: HashMap<Uuid, &Post> = HashMap::new();

    for post in page.iter().chain(descendants) {
        let Some(parent_id) = post.parent_post_id else {
            continue;
        };
        match replies.entry(parent_id) {
            Entry::Vacant(slot) => {
                slot.insert(post);
            }
            Entry::Occupied(mut slot) => {
                let current = *slot.get();
                if current.id == post.id {
                    continue;
                }
                let earliest = if post.timestamp < current.timestamp {
                    post
                } else {
                    current
                };
                warn!(
                    parent_post_id = %parent_id,
                    kept = %earliest.id,
                    "post has more than one reply, keeping the earliest"
                );
                slot.insert(earliest);
            }
        }
    }

    let mut entries = Vec::with_capacity(page.len());
    for root in page.iter().filter(|post| post.is_root()) {
        let mut depth = 0;
        let mut current = Some(root);
        while let Some(post) = current {
            let reply = replies.get(&post.id).copied();
            entries.push(ThreadEntry {
                post: post.clone(),
                depth,
                is_leaf: reply.is_none(),
            });
            depth += DEPTH_STEP;
            current = reply;
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::User;
    use chrono::{Duration, Utc};

    fn author() -> User {
        User::new("alice".into(), "alice@example.com".into(), "hash".into())
    }

    fn chain(len: usize) -> Vec<Post> {
        let author = author();
        let start = Utc::now();
        let mut posts: Vec<Post> = Vec::with_capacity(len);
        for i in 0..len {
            let parent = posts.last().map(|p| p.id);
            let mut post = Post::new(&author, format!("post {i}"), parent);
            post.timestamp = start + Duration::seconds(i as i64);
            posts.push(post);
        }
        posts
    }

    #[test]
    fn chain_depth_strictly_increases() {
        let posts = chain(5);
        let entries = assemble(&posts, &[]);

        assert_eq!(entries.len(), 5);
        for pair in entries.windows(2) {
            assert!(pair[1].depth > pair[0].depth);
            assert_eq!(pair[1].post.parent_post_id, Some(pair[0].post.id));
        }
        assert_eq!(entries[0].depth, 0);
        assert_eq!(entries[4].depth, 4 * DEPTH_STEP);
    }

    #[test]
    fn only_the_tail_is_a_leaf() {
        let entries = assemble(&chain(3), &[]);
        let leaves: Vec<bool> = entries.iter().map(|e| e.is_leaf).collect();
        assert_eq!(leaves, vec![false, false, true]);
    }

    #[test]
    fn roots_keep_page_order() {
        let author = author();
        let first = Post::new(&author, "first".into(), None);
        let second = Post::new(&author, "second".into(), None);
        let reply = Post::new(&author, "reply".into(), Some(second.id));

        // page sorted newest first: reply, second, first
        let page = vec![reply.clone(), second.clone(), first.clone()];
        let entries = assemble(&page, &[]);

        let ids: Vec<Uuid> = entries.iter().map(|e| e.post.id).collect();
        assert_eq!(ids, vec![second.id, reply.id, first.id]);
        assert!(entries[2].is_leaf);
    }

    #[test]
    fn replies_outside_the_page_are_followed() {
        let posts = chain(4);
        let (page, rest) = posts.split_at(1);
        let entries = assemble(page, rest);

        assert_eq!(entries.len(), 4);
        assert!(entries.last().is_some_and(|e| e.is_leaf));
    }

    #[test]
    fn orphaned_replies_are_not_roots() {
        let posts = chain(3);
        let entries = assemble(&posts[1..], &[]);
        assert!(entries.is_empty());
    }

    #[test]
    fn duplicate_replies_keep_the_earliest() {
        let author = author();
        let root = Post::new(&author, "root".into(), None);
        let mut early = Post::new(&author, "early".into(), Some(root.id));
        let mut late = Post::new(&author, "late".into(), Some(root.id));
        early.timestamp = root.timestamp + Duration::seconds(1);
        late.timestamp = root.timestamp + Duration::seconds(2);

        let entries = assemble(&[root.clone(), late, early.clone()], &[]);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].post.id, early.id);
        assert!(!entries[0].is_leaf);
    }

    #[test]
    fn parent_cycles_are_not_emitted() {
        let author = author();
        let root = Post::new(&author, "root".into(), None);
        let mut looped = Post::new(&author, "looped".into(), None);
        looped.parent_post_id = Some(looped.id);
        let mut a = Post::new(&author, "a".into(), None);
        let b = Post::new(&author, "b".into(), Some(a.id));
        a.parent_post_id = Some(b.id);

        let entries = assemble(&[root.clone(), looped, a, b], &[]);

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].post.id, root.id);
        assert!(entries[0].is_leaf);
    }

    #[test]
    fn post_on_page_and_in_descendants_is_emitted_once() {
        let posts = chain(3);
        let entries = assemble(&posts, &posts[1..]);
        assert_eq!(entries.len(), 3);
    }
}
