//! Threaded comment rendering.
//!
//! Comments are flat records keyed by `parent_id`; the tree is rebuilt here
//! and each node rendered through an askama template so all interpolation
//! stays inside the template layer. Recursion is driven from Rust rather
//! than template self-inclusion. Comments whose parent is missing from the
//! batch are omitted, matching how threads behave when a parent was deleted.

use std::collections::HashMap;

use askama::Template;

use crate::application::error::HttpError;
use crate::application::markdown::MarkdownRenderer;
use crate::domain::Comment;
use crate::presentation::views::TemplateRenderError;

// Indentation stops growing past this depth so deep threads stay readable.
const MAX_DEPTH_CLASS: usize = 5;

struct CommentNodeView {
    id: String,
    post_id: String,
    author: String,
    score: i64,
    created_at: Option<String>,
    content_html: String,
    depth_class: String,
    children_html: String,
}

#[derive(Template)]
#[template(path = "comment.html")]
struct CommentTemplate {
    view: CommentNodeView,
}

/// Render the full tree for a post, roots first, depth-first.
pub fn render_tree(
    comments: &[Comment],
    post_id: &str,
    markdown: &MarkdownRenderer,
) -> Result<String, HttpError> {
    let by_parent = group_by_parent(comments);
    render_level(&by_parent, None, 0, post_id, markdown)
}

/// Render one comment and its descendants, for targeted fragment swaps.
/// Returns `None` when the comment is not in the batch.
pub fn render_subtree(
    comments: &[Comment],
    comment_id: &str,
    post_id: &str,
    markdown: &MarkdownRenderer,
) -> Result<Option<String>, HttpError> {
    let Some(comment) = comments.iter().find(|c| c.id == comment_id) else {
        return Ok(None);
    };
    let by_parent = group_by_parent(comments);
    let depth = usize::from(comment.parent_id.is_some());
    render_node(&by_parent, comment, depth, post_id, markdown).map(Some)
}

fn group_by_parent(comments: &[Comment]) -> HashMap<Option<&str>, Vec<&Comment>> {
    let mut by_parent: HashMap<Option<&str>, Vec<&Comment>> = HashMap::new();
    for comment in comments {
        by_parent
            .entry(comment.parent_id.as_deref())
            .or_default()
            .push(comment);
    }
    by_parent
}

fn render_level(
    by_parent: &HashMap<Option<&str>, Vec<&Comment>>,
    parent: Option<&str>,
    depth: usize,
    post_id: &str,
    markdown: &MarkdownRenderer,
) -> Result<String, HttpError> {
    let Some(children) = by_parent.get(&parent) else {
        return Ok(String::new());
    };
    let mut html = String::new();
    for comment in children {
        html.push_str(&render_node(by_parent, comment, depth, post_id, markdown)?);
    }
    Ok(html)
}

fn render_node(
    by_parent: &HashMap<Option<&str>, Vec<&Comment>>,
    comment: &Comment,
    depth: usize,
    post_id: &str,
    markdown: &MarkdownRenderer,
) -> Result<String, HttpError> {
    let children_html = render_level(by_parent, Some(&comment.id), depth + 1, post_id, markdown)?;

    let mut depth_class = format!("comment depth-{}", depth.min(MAX_DEPTH_CLASS));
    if depth == 0 {
        depth_class.push_str(" comment-root");
    }

    let view = CommentNodeView {
        id: comment.id.clone(),
        post_id: post_id.to_string(),
        author: comment.author.clone(),
        score: comment.score,
        created_at: comment.created_at.clone(),
        content_html: markdown.render(&comment.content),
        depth_class,
        children_html,
    };

    CommentTemplate { view }.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::comments::render_node",
            "Comment rendering failed",
            err,
        )
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(id: &str, parent: Option<&str>, author: &str, content: &str) -> Comment {
        Comment {
            id: id.to_string(),
            post_id: Some("p1".to_string()),
            parent_id: parent.map(str::to_string),
            author: author.to_string(),
            content: content.to_string(),
            score: 0,
            created_at: None,
        }
    }

    #[test]
    fn nests_replies_under_parents() {
        let comments = vec![
            comment("c1", None, "alice", "root"),
            comment("c2", Some("c1"), "bob", "reply"),
            comment("c3", Some("c2"), "carol", "deep reply"),
        ];
        let markdown = MarkdownRenderer::new();
        let html = render_tree(&comments, "p1", &markdown).unwrap();

        let c1 = html.find("id=\"comment-c1\"").expect("c1 rendered");
        let c2 = html.find("id=\"comment-c2\"").expect("c2 rendered");
        let c3 = html.find("id=\"comment-c3\"").expect("c3 rendered");
        assert!(c1 < c2 && c2 < c3);
        assert!(html.contains("depth-0"));
        assert!(html.contains("depth-1"));
        assert!(html.contains("depth-2"));
    }

    #[test]
    fn orphaned_comments_are_omitted() {
        let comments = vec![
            comment("c1", None, "alice", "root"),
            comment("c9", Some("gone"), "bob", "orphan"),
        ];
        let markdown = MarkdownRenderer::new();
        let html = render_tree(&comments, "p1", &markdown).unwrap();

        assert!(html.contains("comment-c1"));
        assert!(!html.contains("comment-c9"));
    }

    #[test]
    fn depth_class_caps_for_deep_threads() {
        let mut comments = vec![comment("c0", None, "a", "root")];
        for i in 1..9 {
            comments.push(comment(
                &format!("c{i}"),
                Some(&format!("c{}", i - 1)),
                "a",
                "deeper",
            ));
        }
        let markdown = MarkdownRenderer::new();
        let html = render_tree(&comments, "p1", &markdown).unwrap();

        assert!(html.contains("depth-5"));
        assert!(!html.contains("depth-6"));
        assert!(html.contains("comment-c8"));
    }

    #[test]
    fn comment_body_is_sanitized_markdown() {
        let comments = vec![comment("c1", None, "alice", "**hi** <script>x</script>")];
        let markdown = MarkdownRenderer::new();
        let html = render_tree(&comments, "p1", &markdown).unwrap();

        assert!(html.contains("<strong>hi</strong>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn subtree_renders_node_and_descendants_only() {
        let comments = vec![
            comment("c1", None, "alice", "root"),
            comment("c2", Some("c1"), "bob", "reply"),
            comment("c3", Some("c2"), "carol", "deep"),
        ];
        let markdown = MarkdownRenderer::new();
        let html = render_subtree(&comments, "c2", "p1", &markdown)
            .unwrap()
            .expect("subtree present");

        assert!(!html.contains("comment-c1"));
        assert!(html.contains("comment-c2"));
        assert!(html.contains("comment-c3"));

        let missing = render_subtree(&comments, "nope", "p1", &markdown).unwrap();
        assert!(missing.is_none());
    }
}
