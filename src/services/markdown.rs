use pulldown_cmark::{Event, Options, Parser, html};

/// Renders review markdown to HTML. Raw HTML in the source is demoted to
/// text, since the rendered column is injected into pages unescaped. Empty
/// input stays empty so templates can use the column directly.
#[must_use]
pub fn render(source: &str) -> String {
    if source.trim().is_empty() {
        return String::new();
    }

    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) => Event::Text(raw),
        event => event,
    });
    let mut output = String::with_capacity(source.len());
    html::push_html(&mut output, parser);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_basic_markdown() {
        let html = render("# Great stuff\n\nReally **loved** it.");
        assert!(html.contains("<h1>Great stuff</h1>"));
        assert!(html.contains("<strong>loved</strong>"));
    }

    #[test]
    fn test_render_strikethrough() {
        let html = render("~~meh~~ actually good");
        assert!(html.contains("<del>meh</del>"));
    }

    #[test]
    fn test_render_empty_and_blank() {
        assert_eq!(render(""), "");
        assert_eq!(render("   \n  "), "");
    }

    #[test]
    fn test_render_escapes_raw_scripts() {
        let html = render("hello <script>alert(1)</script>");
        assert!(!html.contains("<script>alert(1)</script>"));
    }
}
