use std::collections::{HashMap, HashSet};

use kometo_api::{CommentId, Reaction, ReactionSummary, UserId};

/// Set of reactions, kept in insertion order
///
/// Each `(user, comment, char)` triple is present at most once.
#[derive(Clone, Debug, Default)]
pub struct ReactionSet {
    ordered: Vec<Reaction>,
    present: HashSet<Reaction>,
}

impl ReactionSet {
    pub fn new() -> ReactionSet {
        ReactionSet::default()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.ordered.iter()
    }

    /// Returns whether the reaction was not already there
    pub fn add(&mut self, r: Reaction) -> bool {
        if !self.present.insert(r.clone()) {
            return false;
        }
        self.ordered.push(r);
        true
    }

    pub fn remove(&mut self, r: &Reaction) -> bool {
        if !self.present.remove(r) {
            return false;
        }
        if let Some(pos) = self.ordered.iter().position(|o| o == r) {
            self.ordered.remove(pos);
        }
        true
    }

    /// Drops every reaction on one of `comments`, returning how many went away
    pub fn remove_for_comments(&mut self, comments: &HashSet<CommentId>) -> usize {
        let before = self.ordered.len();
        self.ordered.retain(|r| !comments.contains(&r.comment_id));
        self.present.retain(|r| !comments.contains(&r.comment_id));
        before - self.ordered.len()
    }

    /// Groups the reactions on `comment` by glyph, in first-seen order
    pub fn summarize(&self, comment: &CommentId, viewer: &UserId) -> Vec<ReactionSummary> {
        let mut res: Vec<ReactionSummary> = Vec::new();
        let mut index = HashMap::new();
        for r in self.ordered.iter().filter(|r| r.comment_id == *comment) {
            let i = *index.entry(&r.reaction_char).or_insert_with(|| {
                res.push(ReactionSummary {
                    reaction_char: r.reaction_char.clone(),
                    count: 0,
                    viewer_reacted: false,
                });
                res.len() - 1
            });
            res[i].count += 1;
            res[i].viewer_reacted |= r.user_id == *viewer;
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(user: &str, comment: &str, c: &str) -> Reaction {
        Reaction {
            user_id: UserId::new(user),
            comment_id: CommentId::new(comment),
            reaction_char: String::from(c),
        }
    }

    fn summary(c: &str, count: usize, viewer_reacted: bool) -> ReactionSummary {
        ReactionSummary {
            reaction_char: String::from(c),
            count,
            viewer_reacted,
        }
    }

    #[test]
    fn summary_groups_in_first_seen_order() {
        let mut set = ReactionSet::new();
        set.add(r("u0", "c0", "👍"));
        set.add(r("u1", "c0", "🔥"));
        assert_eq!(
            set.summarize(&CommentId::new("c0"), &UserId::new("u0")),
            vec![summary("👍", 1, true), summary("🔥", 1, false)],
        );

        set.add(r("u2", "c0", "👍"));
        set.add(r("u2", "c1", "🎉"));
        assert_eq!(
            set.summarize(&CommentId::new("c0"), &UserId::new("u1")),
            vec![summary("👍", 2, false), summary("🔥", 1, true)],
        );
        assert_eq!(
            set.summarize(&CommentId::new("c2"), &UserId::new("u1")),
            vec![],
        );
    }

    #[test]
    fn adding_twice_is_idempotent() {
        let mut set = ReactionSet::new();
        assert!(set.add(r("u0", "c0", "👍")));
        assert!(!set.add(r("u0", "c0", "👍")));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.summarize(&CommentId::new("c0"), &UserId::new("u0")),
            vec![summary("👍", 1, true)],
        );
    }

    #[test]
    fn add_then_remove_restores_the_set() {
        let mut set = ReactionSet::new();
        set.add(r("u0", "c0", "👍"));
        set.add(r("u1", "c0", "🔥"));
        let before = set.iter().cloned().collect::<Vec<_>>();

        assert!(set.add(r("u1", "c0", "👍")));
        assert!(set.remove(&r("u1", "c0", "👍")));
        assert_eq!(set.iter().cloned().collect::<Vec<_>>(), before);

        assert!(!set.remove(&r("u1", "c0", "👍")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn removing_by_comment() {
        let mut set = ReactionSet::new();
        set.add(r("u0", "c0", "👍"));
        set.add(r("u1", "c1", "🔥"));
        set.add(r("u1", "c2", "🔥"));
        let gone = [CommentId::new("c0"), CommentId::new("c2")]
            .into_iter()
            .collect::<HashSet<_>>();
        assert_eq!(set.remove_for_comments(&gone), 2);
        assert_eq!(
            set.iter().cloned().collect::<Vec<_>>(),
            vec![r("u1", "c1", "🔥")]
        );
        // re-adding a dropped reaction must work again
        assert!(set.add(r("u0", "c0", "👍")));
    }
}
