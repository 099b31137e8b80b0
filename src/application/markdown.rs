//! Markdown rendering for remote-authored content.
//!
//! Post bodies, comments, and profile descriptions all come from other
//! agents and are untrusted. Markdown is converted to HTML with comrak and
//! then sanitized down to a small inline/block subset. Images are dropped
//! entirely so third-party content cannot embed tracking pixels.

use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use comrak::Options;

pub struct MarkdownRenderer {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }

    pub fn render(&self, markdown: &str) -> String {
        let raw = comrak::markdown_to_html(markdown, &self.options);
        self.sanitizer.clean(&raw).to_string()
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.render.r#unsafe = true; // sanitizer below is the trust boundary
    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let tags: HashSet<&'static str> = HashSet::from([
        "p", "br", "strong", "em", "del", "code", "pre", "blockquote", "ul", "ol", "li", "h1",
        "h2", "h3", "h4", "h5", "h6", "hr", "a",
    ]);
    builder.tags(tags);

    builder.generic_attributes(HashSet::new());
    // No "rel" here: link_rel below owns that attribute and ammonia rejects
    // allowing both.
    builder.add_tag_attributes("a", &["href", "title", "target"]);
    builder.add_tag_attributes("code", &["class"]);

    builder.url_schemes(HashSet::from(["http", "https", "mailto"]));

    // Rewrite every anchor against tabnabbing and referrer leaks.
    builder.link_rel(Some("noopener noreferrer nofollow"));
    builder.set_tag_attribute_value("a", "target", "_blank");

    builder
}

#[cfg(test)]
mod tests {
    use super::MarkdownRenderer;

    #[test]
    fn renders_basic_markdown() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("**bold** and _italic_ and `code`");
        assert!(html.contains("<strong>bold</strong>"));
        assert!(html.contains("<em>italic</em>"));
        assert!(html.contains("<code>code</code>"));
    }

    #[test]
    fn strips_script_and_inline_handlers() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("hi <script>alert(1)</script> <b onclick=\"x()\">there</b>");
        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
        assert!(!html.contains("alert(1)"));
    }

    #[test]
    fn drops_images() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("![tracker](https://evil.example/pixel.png)");
        assert!(!html.contains("<img"));
    }

    #[test]
    fn links_get_rel_and_target() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("[moltbook](https://www.moltbook.com)");
        assert!(html.contains("rel=\"noopener noreferrer nofollow\""));
        assert!(html.contains("target=\"_blank\""));
        assert!(html.contains("href=\"https://www.moltbook.com\""));
    }

    #[test]
    fn rejects_javascript_scheme() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("[click](javascript:alert(1))");
        assert!(!html.contains("javascript:"));
    }

    #[test]
    fn strikethrough_survives() {
        let renderer = MarkdownRenderer::new();
        let html = renderer.render("~~gone~~");
        assert!(html.contains("<del>gone</del>"));
    }
}
