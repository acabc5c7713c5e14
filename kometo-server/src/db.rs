use std::collections::{HashMap, HashSet};

use chrono::{TimeZone, Utc};
use kometo_api::{Comment, CommentId, Reaction, ReactionSummary, Time, User, UserId};

use crate::reactions::ReactionSet;

/// In-memory state of the board
///
/// Owns the three collections. Nothing else mutates them: handlers go
/// through the methods below while holding the lock of a `SharedBoard`.
#[derive(Clone, Debug, Default)]
pub struct Board {
    comments: Vec<Comment>,
    users: Vec<User>,
    reactions: ReactionSet,

    /// Last numeric comment id handed out, ids must keep increasing
    last_id: i64,
}

impl Board {
    pub fn new(users: Vec<User>) -> Board {
        Board {
            users,
            ..Board::default()
        }
    }

    /// Board pre-filled with a couple of users, a short thread and reactions
    pub fn demo() -> Board {
        let avatar = |n| {
            format!("https://demo.mescius.jp/inputmanjs/demos/ja/samples/comment/commentMode/threadMode/img/avatar{n}.png")
        };
        let mut board = Board::new(vec![
            User {
                id: UserId::new("0"),
                name: String::from("森上 偉久馬"),
                avatar_url: avatar(1),
            },
            User {
                id: UserId::new("1"),
                name: String::from("葛城 孝史"),
                avatar_url: avatar(2),
            },
        ]);
        let date = Utc
            .with_ymd_and_hms(2024, 8, 23, 8, 1, 59)
            .single()
            .expect("demo date is valid");
        board.insert_comment(Comment {
            id: CommentId::new("1"),
            author_user_id: UserId::new("1"),
            post_time: date,
            update_time: date,
            parent_comment_id: None,
            content: String::from("新入社員の松沢と申します。どうぞよろしくお願いいたします。"),
        });
        board.insert_comment(Comment {
            id: CommentId::new("2"),
            author_user_id: UserId::new("0"),
            post_time: date,
            update_time: date,
            parent_comment_id: Some(CommentId::new("1")),
            content: String::from("どうぞよろしくお願いいたします。"),
        });
        board.add_reaction(reaction("0", "1", "👍"));
        board.add_reaction(reaction("1", "1", "🔥"));
        board
    }

    /// Adds an already-built comment, eg. when seeding the board
    pub fn insert_comment(&mut self, c: Comment) {
        if let Ok(id) = c.id.0.parse::<i64>() {
            self.last_id = self.last_id.max(id);
        }
        self.comments.push(c);
    }

    fn next_comment_id(&mut self, now: &Time) -> CommentId {
        self.last_id = std::cmp::max(now.timestamp_millis(), self.last_id + 1);
        CommentId(self.last_id.to_string())
    }

    /// All comments, in insertion order
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn comment(&self, id: &CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == *id)
    }

    // The parent is not checked for existence, a reply can outlive its thread
    pub fn create_comment(
        &mut self,
        author: UserId,
        parent: Option<CommentId>,
        content: String,
    ) -> Comment {
        let now = Utc::now();
        let c = Comment {
            id: self.next_comment_id(&now),
            author_user_id: author,
            post_time: now,
            update_time: now,
            parent_comment_id: parent,
            content,
        };
        self.comments.push(c.clone());
        c
    }

    pub fn update_comment(&mut self, id: &CommentId, content: String) -> Option<Comment> {
        let c = self.comments.iter_mut().find(|c| c.id == *id)?;
        c.content = content;
        c.update_time = std::cmp::max(Utc::now(), c.post_time);
        Some(c.clone())
    }

    /// Removes a comment along with all its descendants and their reactions
    ///
    /// Returns the removed ids, starting with `id` and then walking down the
    /// thread depth-first. Returns nothing if `id` is not a known comment.
    pub fn delete_comment_cascade(&mut self, id: &CommentId) -> Vec<CommentId> {
        if self.comment(id).is_none() {
            return Vec::new();
        }
        let mut children: HashMap<&CommentId, Vec<&CommentId>> = HashMap::new();
        for c in self.comments.iter() {
            if let Some(p) = &c.parent_comment_id {
                children.entry(p).or_default().push(&c.id);
            }
        }

        let mut removed = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if !seen.insert(cur) {
                continue;
            }
            removed.push(cur.clone());
            if let Some(kids) = children.get(cur) {
                stack.extend(kids.iter().rev());
            }
        }

        let gone = removed.iter().cloned().collect::<HashSet<_>>();
        self.comments.retain(|c| !gone.contains(&c.id));
        let reactions = self.reactions.remove_for_comments(&gone);
        tracing::debug!(
            comments = removed.len(),
            reactions,
            "cascade-deleted comment {id:?}"
        );
        removed
    }

    pub fn user(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| u.id == *id)
    }

    pub fn find_users(&self, filter: &str) -> Vec<User> {
        self.users
            .iter()
            .filter(|u| u.name.contains(filter))
            .cloned()
            .collect()
    }

    pub fn reactions(&self) -> &ReactionSet {
        &self.reactions
    }

    pub fn summarize_reactions(&self, comment: &CommentId, viewer: &UserId) -> Vec<ReactionSummary> {
        self.reactions.summarize(comment, viewer)
    }

    /// Returns whether the reaction is now on the board
    ///
    /// Reacting to a missing comment does nothing, so that no reaction can
    /// outlive the cascade that removed its comment.
    pub fn add_reaction(&mut self, r: Reaction) -> bool {
        if self.comment(&r.comment_id).is_none() {
            tracing::debug!(comment = ?r.comment_id, "ignoring reaction to missing comment");
            return false;
        }
        self.reactions.add(r);
        true
    }

    pub fn remove_reaction(&mut self, r: &Reaction) -> bool {
        self.reactions.remove(r)
    }
}

fn reaction(user: &str, comment: &str, c: &str) -> Reaction {
    Reaction {
        user_id: UserId::new(user),
        comment_id: CommentId::new(comment),
        reaction_char: String::from(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(board: &Board) -> Vec<&str> {
        board.comments().iter().map(|c| &c.id.0 as &str).collect()
    }

    #[test]
    fn demo_board_is_consistent() {
        let board = Board::demo();
        assert_eq!(ids(&board), vec!["1", "2"]);
        assert_eq!(board.reactions().len(), 2);
        assert_eq!(board.user(&UserId::new("1")).unwrap().name, "葛城 孝史");
        assert_eq!(board.user(&UserId::new("7")), None);
    }

    #[test]
    fn created_ids_keep_increasing() {
        let mut board = Board::demo();
        let a = board.create_comment(UserId::new("0"), None, String::from("a"));
        let b = board.create_comment(UserId::new("0"), None, String::from("b"));
        let a_id = a.id.0.parse::<i64>().unwrap();
        let b_id = b.id.0.parse::<i64>().unwrap();
        assert!(a_id > 2);
        assert!(b_id > a_id);
        assert_eq!(a.post_time, a.update_time);
        assert_eq!(ids(&board)[2..], [&a.id.0 as &str, &b.id.0 as &str]);
    }

    #[test]
    fn seeded_ids_are_not_reused() {
        let mut board = Board::new(vec![]);
        let future = Utc::now().timestamp_millis() + 1_000_000;
        board.insert_comment(Comment {
            id: CommentId(future.to_string()),
            author_user_id: UserId::new("0"),
            post_time: Utc::now(),
            update_time: Utc::now(),
            parent_comment_id: None,
            content: String::new(),
        });
        let c = board.create_comment(UserId::new("0"), None, String::new());
        assert_eq!(c.id, CommentId((future + 1).to_string()));
    }

    #[test]
    fn update_bumps_update_time() {
        let mut board = Board::demo();
        let c = board
            .update_comment(&CommentId::new("2"), String::from("edited"))
            .unwrap();
        assert_eq!(c.content, "edited");
        assert!(c.update_time >= c.post_time);
        assert_eq!(board.comment(&CommentId::new("2")), Some(&c));
        assert_eq!(
            board.update_comment(&CommentId::new("nope"), String::from("x")),
            None
        );
    }

    #[test]
    fn delete_cascades_to_descendants_and_reactions() {
        let mut board = Board::demo();
        let root = CommentId::new("1");
        let child = board.create_comment(UserId::new("0"), Some(root.clone()), String::new());
        let grandchild =
            board.create_comment(UserId::new("1"), Some(child.id.clone()), String::new());
        let other = board.create_comment(UserId::new("1"), None, String::new());
        board.add_reaction(reaction("0", &grandchild.id.0, "🎉"));
        board.add_reaction(reaction("0", &other.id.0, "🎉"));

        let removed = board.delete_comment_cascade(&root);
        assert_eq!(
            removed,
            vec![root, CommentId::new("2"), child.id, grandchild.id]
        );
        assert_eq!(ids(&board), vec![&other.id.0 as &str]);
        assert_eq!(
            board.reactions().iter().cloned().collect::<Vec<_>>(),
            vec![reaction("0", &other.id.0, "🎉")]
        );
    }

    #[test]
    fn delete_of_unknown_comment_is_a_no_op() {
        let mut board = Board::demo();
        assert_eq!(board.delete_comment_cascade(&CommentId::new("9")), vec![]);
        assert_eq!(ids(&board), vec!["1", "2"]);
        assert_eq!(board.reactions().len(), 2);
    }

    #[test]
    fn reactions_need_an_existing_comment() {
        let mut board = Board::demo();
        assert!(board.add_reaction(reaction("1", "2", "👍")));
        // already there, still on the board
        assert!(board.add_reaction(reaction("1", "2", "👍")));
        assert_eq!(board.reactions().len(), 3);

        assert!(!board.add_reaction(reaction("0", "9", "👍")));
        board.delete_comment_cascade(&CommentId::new("1"));
        assert!(!board.add_reaction(reaction("0", "1", "👍")));
        assert_eq!(board.reactions().len(), 0);
    }

    #[test]
    fn delete_survives_parent_cycles() {
        let mut board = Board::new(vec![]);
        let now = Utc::now();
        for (id, parent) in [("a", "b"), ("b", "a")] {
            board.insert_comment(Comment {
                id: CommentId::new(id),
                author_user_id: UserId::new("0"),
                post_time: now,
                update_time: now,
                parent_comment_id: Some(CommentId::new(parent)),
                content: String::new(),
            });
        }
        assert_eq!(
            board.delete_comment_cascade(&CommentId::new("a")),
            vec![CommentId::new("a"), CommentId::new("b")]
        );
        assert!(board.comments().is_empty());
    }

    #[test]
    fn deep_threads_do_not_overflow() {
        let mut board = Board::new(vec![]);
        let root = board.create_comment(UserId::new("0"), None, String::new());
        let mut parent = root.id.clone();
        for _ in 0..100_000 {
            parent = board
                .create_comment(UserId::new("0"), Some(parent), String::new())
                .id;
        }
        assert_eq!(board.delete_comment_cascade(&root.id).len(), 100_001);
        assert!(board.comments().is_empty());
    }

    #[test]
    fn finding_users_is_case_sensitive() {
        let board = Board::new(vec![
            User {
                id: UserId::new("0"),
                name: String::from("Alice"),
                avatar_url: String::new(),
            },
            User {
                id: UserId::new("1"),
                name: String::from("alicia"),
                avatar_url: String::new(),
            },
        ]);
        let names = |f| {
            board
                .find_users(f)
                .into_iter()
                .map(|u| u.name)
                .collect::<Vec<_>>()
        };
        assert_eq!(names("Ali"), vec!["Alice"]);
        assert_eq!(names("li"), vec!["Alice", "alicia"]);
        assert_eq!(names(""), vec!["Alice", "alicia"]);
        assert!(names("Bob").is_empty());
    }
}
