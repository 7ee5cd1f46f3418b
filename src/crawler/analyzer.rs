use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use url::Url;

/// What a fetched page allows the crawler to do, and where it links to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAnalysis {
    /// Raw body bytes, as fetched
    pub content: Vec<u8>,

    /// False once a robots META tag says `noindex`
    pub index: bool,

    /// False once a robots META tag says `nofollow`
    pub follow: bool,

    /// Absolute link targets, in document order
    pub links: Vec<Url>,
}

impl PageAnalysis {
    /// Links the crawler may follow: none when the page said `nofollow`
    pub fn followable_links(&self) -> &[Url] {
        if self.follow {
            &self.links
        } else {
            &[]
        }
    }
}

/// Start-tag scanner fed by the html5ever tokenizer
struct TagScanner<'a> {
    source: &'a Url,
    index: bool,
    follow: bool,
    links: Vec<Url>,
}

impl TagScanner<'_> {
    fn start_tag(&mut self, tag: &Tag) {
        if &*tag.name == "meta" {
            let is_robots =
                attr(tag, "name").map_or(false, |name| name.trim().eq_ignore_ascii_case("robots"));
            if !is_robots {
                return;
            }

            let directives = attr(tag, "content").unwrap_or_default();
            for directive in directives
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|d| !d.is_empty())
            {
                if directive.eq_ignore_ascii_case("noindex") {
                    self.index = false;
                } else if directive.eq_ignore_ascii_case("nofollow") {
                    self.follow = false;
                }
            }
        } else if self.follow {
            let href = match attr(tag, "href") {
                Some(href) => Some(href),
                None if &*tag.name == "frame" => attr(tag, "src"),
                None => None,
            };

            if let Some(link) = href.and_then(|href| resolve_link(self.source, href)) {
                self.links.push(link);
            }
        }
    }
}

impl TokenSink for TagScanner<'_> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if let Token::TagToken(tag) = token {
            if tag.kind == TagKind::StartTag {
                self.start_tag(&tag);
            }
        }
        TokenSinkResult::Continue
    }
}

fn attr<'t>(tag: &'t Tag, name: &str) -> Option<&'t str> {
    tag.attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| &*attr.value)
}

/// Scan a page's start tags for links and robots META directives.
///
/// The markup is decoded lossily and run through the html5ever tokenizer without building a tree,
/// so broken HTML never fails the scan and every tag is seen in stream order, `<noscript>`
/// content included. The META flags are order-sensitive: links after a `nofollow` are not
/// collected at all.
pub fn analyze(content: Vec<u8>, source: &Url) -> PageAnalysis {
    let scanner = TagScanner {
        source,
        index: true,
        follow: true,
        links: Vec::new(),
    };

    let mut input = BufferQueue::new();
    input.push_back(StrTendril::from_slice(&String::from_utf8_lossy(&content)));

    let mut tokenizer = Tokenizer::new(scanner, TokenizerOpts::default());
    let _ = tokenizer.feed(&mut input);
    tokenizer.end();

    let TagScanner {
        index,
        follow,
        links,
        ..
    } = tokenizer.sink;

    PageAnalysis {
        content,
        index,
        follow,
        links,
    }
}

/// Resolve `href` against `base` after dropping any fragment; unresolvable links are `None`
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.split('#').next().unwrap_or_default();
    base.join(href.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    fn link_strings(analysis: &PageAnalysis) -> Vec<&str> {
        analysis.links.iter().map(Url::as_str).collect()
    }

    #[test]
    fn test_extracts_and_resolves_links() {
        let html = r#"
            <html><head><link rel="stylesheet" href="/style.css"></head>
            <body>
                <a href="other.html">Other</a>
                <a href="../up.html#section">Up</a>
                <a href="http://elsewhere.org/x">Elsewhere</a>
                <a name="no-href">Anchor</a>
            </body></html>
        "#;

        let analysis = analyze(html.as_bytes().to_vec(), &base());

        assert!(analysis.index);
        assert!(analysis.follow);
        assert_eq!(
            link_strings(&analysis),
            vec![
                "http://example.com/style.css",
                "http://example.com/dir/other.html",
                "http://example.com/up.html",
                "http://elsewhere.org/x",
            ]
        );
        assert_eq!(analysis.content, html.as_bytes());
    }

    #[test]
    fn test_noindex_nofollow() {
        let html = r#"<html><head><meta name="robots" content="noindex, nofollow"></head>
            <body><a href="/hidden">x</a></body></html>"#;

        let analysis = analyze(html.as_bytes().to_vec(), &base());

        assert!(!analysis.index);
        assert!(!analysis.follow);
        assert!(analysis.followable_links().is_empty());
    }

    #[test]
    fn test_directives_are_case_insensitive() {
        let html = r#"<meta name="ROBOTS" content="NoIndex">"#;
        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert!(!analysis.index);
        assert!(analysis.follow);
    }

    #[test]
    fn test_late_nofollow_suppresses_earlier_links() {
        let html = r#"<html><body>
            <a href="/before">before</a>
            <meta name="robots" content="nofollow">
            <a href="/after">after</a>
        </body></html>"#;

        let analysis = analyze(html.as_bytes().to_vec(), &base());

        assert!(!analysis.follow);
        assert!(analysis.index);
        // collected before the directive, but the caller must not use them
        assert_eq!(link_strings(&analysis), vec!["http://example.com/before"]);
        assert!(analysis.followable_links().is_empty());
    }

    #[test]
    fn test_flags_never_reset() {
        let html = r#"<meta name="robots" content="noindex">
            <meta name="robots" content="index, follow">"#;
        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert!(!analysis.index);
    }

    #[test]
    fn test_other_meta_tags_ignored() {
        let html = r#"<meta name="description" content="noindex nofollow">"#;
        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert!(analysis.index);
        assert!(analysis.follow);
    }

    #[test]
    fn test_frame_src() {
        let html = r#"<html><frameset>
            <frame src="menu.html">
            <frame src="main.html#top">
        </frameset></html>"#;

        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert_eq!(
            link_strings(&analysis),
            vec!["http://example.com/dir/menu.html", "http://example.com/dir/main.html"]
        );
    }

    #[test]
    fn test_src_ignored_outside_frames() {
        let html = r#"<img src="/pic.png"><script src="/app.js"></script>"#;
        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert!(analysis.links.is_empty());
    }

    #[test]
    fn test_malformed_markup_and_links() {
        let html: &[u8] = b"<a href=\"http://[::1\">bad</a><div <<<>> <a href='ok.html'>ok</a \xff\xfe";
        let analysis = analyze(html.to_vec(), &base());
        assert!(link_strings(&analysis).contains(&"http://example.com/dir/ok.html"));
        assert!(!link_strings(&analysis).iter().any(|l| l.contains("[::1")));
    }

    #[test]
    fn test_links_inside_noscript() {
        let html = r#"<noscript><a href="/ns">x</a></noscript><a href="/ok">y</a>"#;
        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert_eq!(
            link_strings(&analysis),
            vec!["http://example.com/ns", "http://example.com/ok"]
        );
    }

    #[test]
    fn test_misnested_table_keeps_stream_order() {
        let html = r#"<table><a href="/first">1</a><tr><td><a href="/second">2</a></td></tr></table>"#;
        let analysis = analyze(html.as_bytes().to_vec(), &base());
        assert_eq!(
            link_strings(&analysis),
            vec!["http://example.com/first", "http://example.com/second"]
        );
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link(&base(), "#only-fragment").unwrap().as_str(),
            "http://example.com/dir/page.html"
        );
        assert_eq!(
            resolve_link(&base(), "/a?b=c#d").unwrap().as_str(),
            "http://example.com/a?b=c"
        );
        assert!(resolve_link(&base(), "http://[bad").is_none());
    }
}
