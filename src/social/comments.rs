//! Reply-tree assembly for a post's flat comment list.

use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use super::types::{CommentNode, CommentRecord};

/// Newest first; ids break timestamp ties so output never depends on input order.
fn newest_first(records: &[CommentRecord], a: usize, b: usize) -> Ordering {
    let (a, b) = (&records[a].comment, &records[b].comment);
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Builds the reply forest for one post's comments.
///
/// A comment is a root when it has no parent, or when its parent is not in
/// `comments` (the parent was deleted). Every level, roots included, is
/// ordered newest first. Any depth is accepted: the walk uses explicit
/// stacks, and a parent cycle in the input is broken at its first member.
pub fn build_comment_tree(comments: Vec<CommentRecord>) -> Vec<CommentNode> {
    let count = comments.len();
    let index: HashMap<Uuid, usize> = comments
        .iter()
        .enumerate()
        .map(|(i, record)| (record.comment.id, i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut roots = Vec::new();
    for (i, record) in comments.iter().enumerate() {
        match record.comment.parent_id.and_then(|p| index.get(&p).copied()) {
            Some(parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    // Assign each comment to exactly one parent, walking down from the roots.
    let mut placed = vec![false; count];
    let mut tree: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut forest = Vec::new();
    let mut work = Vec::new();
    for start in roots.into_iter().chain(0..count) {
        if placed[start] {
            continue;
        }
        placed[start] = true;
        forest.push(start);
        work.push(start);
        while let Some(parent) = work.pop() {
            for &child in &children[parent] {
                if !placed[child] {
                    placed[child] = true;
                    tree[parent].push(child);
                    work.push(child);
                }
            }
        }
    }

    forest.sort_by(|&a, &b| newest_first(&comments, a, b));
    for replies in &mut tree {
        replies.sort_by(|&a, &b| newest_first(&comments, a, b));
    }

    // Pre-order, so walking it backwards builds every child before its parent.
    let mut order = Vec::with_capacity(count);
    work.extend(&forest);
    while let Some(i) = work.pop() {
        order.push(i);
        work.extend(&tree[i]);
    }

    let mut records: Vec<Option<CommentRecord>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..count).map(|_| None).collect();
    for &i in order.iter().rev() {
        let replies = tree[i].iter().filter_map(|&c| built[c].take()).collect();
        if let Some(record) = records[i].take() {
            built[i] = Some(CommentNode::from_record(record, replies));
        }
    }

    forest
        .into_iter()
        .filter_map(|i| built[i].take())
        .collect()
}
