use crate::config::LinkBase;
use crate::store::PageRecord;
use crate::url_store::UrlStore;
use lol_html::html_content::EndTag;
use lol_html::{EndTagHandler, HtmlRewriter, Settings, doc_comments, doc_text, doctype, element};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use url::Url;

/// Most characters of body text kept per page
pub const MAX_CONTENT_CHARS: usize = 500;

/// Most tokenizer events consumed per page before extraction stops
pub const MAX_EVENTS: usize = 500;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Error)]
#[error("tokenizer event budget of {MAX_EVENTS} exhausted")]
struct EventBudgetExhausted;

/// Decides which hrefs the crawl may follow and how relative ones resolve
#[derive(Debug, Clone)]
pub struct LinkScope {
    root: Url,
    base: LinkBase,
}

impl LinkScope {
    pub fn new(root: Url, base: LinkBase) -> Self {
        Self { root, base }
    }

    /// Resolve an href found on `page`. Returns None when the href is
    /// malformed, not http(s), or points at a different host than the root.
    pub fn resolve(&self, href: &str, page: Option<&Url>) -> Option<Url> {
        let resolved = match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = match self.base {
                    LinkBase::Page => page.unwrap_or(&self.root),
                    LinkBase::Root => &self.root,
                };
                base.join(href).ok()?
            }
            Err(_) => return None,
        };

        self.in_scope(&resolved).then_some(resolved)
    }

    /// Same scheme family, host and explicit port as the root
    pub fn in_scope(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url.host_str() == self.root.host_str()
            && url.port() == self.root.port()
    }
}

/// Output of a single page extraction
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub record: PageRecord,
    /// In-scope links in document order, before deduplication
    pub links: Vec<String>,
    /// Tokenizer events consumed
    pub events: usize,
}

/// Per-page tokenizer state
#[derive(Debug, Clone)]
struct ExtractState {
    title: String,
    title_captured: bool,
    awaiting_title: bool,
    in_body: bool,
    in_title: bool,
    awaiting_label: bool,
    content: String,
    content_budget: usize,
    event_budget: usize,
    pending_text: String,
    links: Vec<String>,
}

impl ExtractState {
    fn new() -> Self {
        Self {
            title: String::new(),
            title_captured: false,
            awaiting_title: false,
            in_body: false,
            in_title: false,
            awaiting_label: false,
            content: String::new(),
            content_budget: MAX_CONTENT_CHARS,
            event_budget: MAX_EVENTS,
            pending_text: String::new(),
            links: Vec::new(),
        }
    }

    fn events(&self) -> usize {
        MAX_EVENTS - self.event_budget
    }

    fn tick(&mut self) -> Result<(), EventBudgetExhausted> {
        if self.event_budget == 0 {
            return Err(EventBudgetExhausted);
        }
        self.event_budget -= 1;
        Ok(())
    }

    fn start_tag(&mut self, name: &str) {
        self.other();
        match name {
            "title" => {
                self.in_title = true;
                if !self.title_captured {
                    self.title_captured = true;
                    self.awaiting_title = true;
                }
            }
            "body" => self.in_body = true,
            "a" => self.awaiting_label = true,
            _ => {}
        }
    }

    fn end_tag(&mut self, name: &str) {
        self.other();
        if name == "title" {
            self.in_title = false;
        }
    }

    fn other(&mut self) {
        self.awaiting_title = false;
        self.awaiting_label = false;
    }

    fn text(&mut self, raw: &str) {
        let text = html_escape::decode_html_entities(raw);
        let awaiting_title = self.awaiting_title;
        // The text right after `<a>` is the link's label, not page content.
        let is_label = self.awaiting_label;
        self.other();

        if awaiting_title {
            self.title = text.into_owned();
            return;
        }
        if self.in_body && !self.in_title && !is_label {
            self.append_content(&text);
        }
    }

    fn append_content(&mut self, text: &str) {
        if self.content_budget == 0 {
            return;
        }
        let mut taken = 0;
        for ch in text.chars().take(self.content_budget) {
            self.content.push(ch);
            taken += 1;
        }
        self.content_budget -= taken;
    }
}

/// Stream through `body` once, collecting the page record and the links the
/// crawl may follow. Never fails: malformed markup or the event cap simply
/// end tokenizing early.
pub fn parse_page(body: &[u8], page_url: &str, scope: &LinkScope) -> ParsedPage {
    let page = Url::parse(page_url).ok();
    let state = Rc::new(RefCell::new(ExtractState::new()));

    {
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: vec![element!("*", |el| {
                    let name = el.tag_name();
                    {
                        let mut st = state.borrow_mut();
                        st.tick()?;
                        st.start_tag(&name);

                        if name == "a" {
                            if let Some(href) = el.get_attribute("href") {
                                match scope.resolve(&href, page.as_ref()) {
                                    Some(link) => st.links.push(link.into()),
                                    None => log::debug!("Skipping link {href:?} on {page_url}"),
                                }
                            }
                        }
                    }

                    if let Some(handlers) = el.end_tag_handlers() {
                        let state = Rc::clone(&state);
                        let handler: EndTagHandler<'static> =
                            Box::new(move |end: &mut EndTag<'_>| -> HandlerResult {
                                let mut st = state.borrow_mut();
                                st.tick()?;
                                st.end_tag(&end.name());
                                Ok(())
                            });
                        handlers.push(handler);
                    }
                    Ok(())
                })],
                document_content_handlers: vec![
                    doctype!(|_| {
                        let mut st = state.borrow_mut();
                        st.tick()?;
                        st.other();
                        Ok(())
                    }),
                    doc_comments!(|_| {
                        let mut st = state.borrow_mut();
                        st.tick()?;
                        st.other();
                        Ok(())
                    }),
                    doc_text!(|t| {
                        let mut st = state.borrow_mut();
                        st.pending_text.push_str(t.as_str());
                        if t.last_in_text_node() {
                            let text = std::mem::take(&mut st.pending_text);
                            if !text.is_empty() {
                                st.tick()?;
                                st.text(&text);
                            }
                        }
                        Ok(())
                    }),
                ],
                ..Settings::new()
            },
            |_: &[u8]| {},
        );

        match rewriter.write(body) {
            Ok(()) => {
                if let Err(e) = rewriter.end() {
                    log::debug!("Stopped tokenizing {page_url} at end of input: {e}");
                }
            }
            Err(e) => log::debug!("Stopped tokenizing {page_url}: {e}"),
        }
    }

    let state = Rc::try_unwrap(state)
        .map(RefCell::into_inner)
        .unwrap_or_else(|shared| shared.borrow().clone());

    ParsedPage {
        events: state.events(),
        record: PageRecord {
            title: state.title,
            content: state.content,
            url: page_url.to_string(),
        },
        links: state.links,
    }
}

/// Result of extracting one page into the crawl state
#[derive(Debug, Clone)]
pub struct Extracted {
    pub record: PageRecord,
    /// Links newly added to the frontier by this page
    pub queued: usize,
    pub discovered: usize,
}

/// Parses fetched pages and feeds their links back into the URL store
#[derive(Debug, Clone)]
pub struct Extractor {
    scope: LinkScope,
}

impl Extractor {
    pub fn new(scope: LinkScope) -> Self {
        Self { scope }
    }

    pub fn parse(&self, body: &[u8], page_url: &str) -> ParsedPage {
        parse_page(body, page_url, &self.scope)
    }

    /// Parse the page and queue every in-scope link nobody has seen yet
    pub fn extract(&self, body: &[u8], page_url: &str, urls: &UrlStore) -> Extracted {
        let parsed = self.parse(body, page_url);
        let discovered = parsed.links.len();
        let queued = parsed
            .links
            .iter()
            .filter(|link| urls.add_to_frontier(link))
            .count();

        log::debug!(
            "{page_url}: {} events, {discovered} in-scope links, {queued} new",
            parsed.events
        );

        Extracted {
            record: parsed.record,
            queued,
            discovered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scope(root: &str) -> LinkScope {
        LinkScope::new(Url::parse(root).unwrap(), LinkBase::Page)
    }

    fn parse(html: &str, page_url: &str) -> ParsedPage {
        parse_page(html.as_bytes(), page_url, &scope("http://x.test/"))
    }

    #[test]
    fn extracts_title_content_and_links() {
        let parsed = parse(
            r#"<title>Home</title><body>Hi<a href="/a">A</a></body>"#,
            "http://x.test/",
        );
        assert_eq!(parsed.record.title, "Home");
        assert_eq!(parsed.record.content, "Hi");
        assert_eq!(parsed.record.url, "http://x.test/");
        assert_eq!(parsed.links, ["http://x.test/a"]);
    }

    #[test]
    fn text_before_body_is_not_content() {
        let parsed = parse(
            "<html><head><meta charset=utf-8></head>stray<body><p>kept</p></body></html>",
            "http://x.test/",
        );
        assert_eq!(parsed.record.content, "kept");
    }

    #[test]
    fn document_without_body_tag_has_no_content() {
        let parsed = parse("<p>orphan text</p>", "http://x.test/");
        assert_eq!(parsed.record.content, "");
        assert_eq!(parsed.record.title, "");
    }

    #[test]
    fn first_title_wins() {
        let parsed = parse(
            "<title>First</title><body><svg><title>Second</title></svg></body>",
            "http://x.test/",
        );
        assert_eq!(parsed.record.title, "First");
        assert_eq!(parsed.record.content, "");
    }

    #[test]
    fn title_text_inside_body_is_not_content() {
        let parsed = parse(
            "<title>First</title><body>B<svg><title>Second</title></svg>C</body>",
            "http://x.test/",
        );
        assert_eq!(parsed.record.title, "First");
        assert_eq!(parsed.record.content, "BC");
    }

    #[test]
    fn unclosed_anchor_only_drops_its_label() {
        let parsed = parse(
            r#"<body><p><a href="/x">link</p><p>after paragraph text</p></body>"#,
            "http://x.test/",
        );
        assert_eq!(parsed.record.content, "after paragraph text");
        assert_eq!(parsed.links, ["http://x.test/x"]);
    }

    #[test]
    fn block_content_inside_anchor_is_kept() {
        let parsed = parse(
            r#"<body><a href="/post"><h2>Post headline</h2><p>Summary text</p></a>tail</body>"#,
            "http://x.test/",
        );
        assert_eq!(parsed.record.content, "Post headlineSummary texttail");
    }

    #[test]
    fn empty_title_is_not_filled_by_later_text() {
        let parsed = parse("<title></title><body>Body</body>", "http://x.test/");
        assert_eq!(parsed.record.title, "");
        assert_eq!(parsed.record.content, "Body");
    }

    #[test]
    fn entities_are_decoded() {
        let parsed = parse(
            "<title>Tom &amp; Jerry</title><body>a &lt; b</body>",
            "http://x.test/",
        );
        assert_eq!(parsed.record.title, "Tom & Jerry");
        assert_eq!(parsed.record.content, "a < b");
    }

    #[test]
    fn content_is_cut_at_the_character_budget() {
        let html = format!("<body><p>{}</p><p>tail</p></body>", "é".repeat(600));
        let parsed = parse(&html, "http://x.test/");
        assert_eq!(parsed.record.content.chars().count(), MAX_CONTENT_CHARS);
        assert!(!parsed.record.content.contains("tail"));
    }

    #[test]
    fn links_after_the_content_budget_are_still_found() {
        let html = format!(
            r#"<body><p>{}</p><a href="/late">late</a></body>"#,
            "x".repeat(800)
        );
        let parsed = parse(&html, "http://x.test/");
        assert_eq!(parsed.links, ["http://x.test/late"]);
    }

    #[test]
    fn event_cap_stops_link_discovery() {
        let mut html = String::from("<body>");
        for i in 0..400 {
            html.push_str(&format!(r#"<a href="/p{i}">{i}</a>"#));
        }
        html.push_str("</body>");

        let parsed = parse(&html, "http://x.test/");
        assert_eq!(parsed.events, MAX_EVENTS);
        // One body start, then three events (start, text, end) per anchor.
        assert_eq!(parsed.links.len(), (MAX_EVENTS - 1).div_ceil(3));
        assert!(!parsed.links.contains(&"http://x.test/p399".to_string()));
    }

    #[test]
    fn off_host_links_are_dropped() {
        let parsed = parse(
            r#"<body><a href="http://other.test/x">o</a><a href="//other.test/y">p</a><a href="http://x.test/z">z</a></body>"#,
            "http://x.test/",
        );
        assert_eq!(parsed.links, ["http://x.test/z"]);
    }

    #[test]
    fn non_web_and_malformed_hrefs_are_skipped() {
        let parsed = parse(
            r#"<body><a href="mailto:me@x.test">m</a><a href="javascript:void(0)">j</a><a href="http://[::1">bad</a><a href="ok">ok</a></body>"#,
            "http://x.test/dir/",
        );
        assert_eq!(parsed.links, ["http://x.test/dir/ok"]);
    }

    #[test]
    fn anchors_without_href_are_ignored() {
        let parsed = parse(r#"<body><a name="top">t</a></body>"#, "http://x.test/");
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn relative_links_follow_the_configured_base() {
        let html = r#"<body><a href="next">n</a></body>"#;

        let by_page = parse_page(html.as_bytes(), "http://x.test/docs/intro", &scope("http://x.test/"));
        assert_eq!(by_page.links, ["http://x.test/docs/next"]);

        let root_scope = LinkScope::new(Url::parse("http://x.test/").unwrap(), LinkBase::Root);
        let by_root = parse_page(html.as_bytes(), "http://x.test/docs/intro", &root_scope);
        assert_eq!(by_root.links, ["http://x.test/next"]);
    }

    #[test]
    fn fragments_and_queries_are_kept_verbatim() {
        let parsed = parse(
            r#"<body><a href="/a?b=2&a=1#frag">x</a></body>"#,
            "http://x.test/",
        );
        assert_eq!(parsed.links, ["http://x.test/a?b=2&a=1#frag"]);
    }

    #[test]
    fn scope_compares_explicit_ports() {
        let scope = scope("http://x.test:8080/");
        assert!(scope.resolve("/a", None).is_some());
        assert!(scope.resolve("http://x.test/a", None).is_none());
        assert!(scope.resolve("http://x.test:8080/a", None).is_some());
    }

    #[test]
    fn garbage_input_yields_a_record() {
        let parsed = parse_page(&[0xff, 0xfe, b'<', 0x00, b'>', 0x80], "http://x.test/", &scope("http://x.test/"));
        assert_eq!(parsed.record.url, "http://x.test/");
        assert!(parsed.events <= MAX_EVENTS);
    }

    #[test]
    fn extract_queues_only_unseen_links() {
        let extractor = Extractor::new(scope("http://x.test/"));
        let urls = UrlStore::new();
        urls.add_to_frontier("http://x.test/");
        urls.pop_from_frontier();

        let html = r#"<body><a href="/">home</a><a href="/a">a</a><a href="/a">again</a><a href="http://other.test/">o</a></body>"#;
        let extracted = extractor.extract(html.as_bytes(), "http://x.test/", &urls);

        assert_eq!(extracted.discovered, 3);
        assert_eq!(extracted.queued, 1);
        assert_eq!(urls.frontier_count(), 1);
        assert_eq!(urls.visited_count(), 2);
        assert!(!urls.is_visited("http://other.test/"));
    }

    proptest! {
        #[test]
        fn bounds_hold_for_arbitrary_markup(body in ".{0,4000}") {
            let html = format!("<body>{body}</body>");
            let parsed = parse(&html, "http://x.test/");
            prop_assert!(parsed.record.content.chars().count() <= MAX_CONTENT_CHARS);
            prop_assert!(parsed.events <= MAX_EVENTS);
        }

        #[test]
        fn bounds_hold_for_many_small_elements(n in 0usize..2000, word in "[a-z]{1,12}") {
            let html = format!("<body>{}</body>", format!("<p>{word}</p>").repeat(n));
            let parsed = parse(&html, "http://x.test/");
            prop_assert!(parsed.record.content.chars().count() <= MAX_CONTENT_CHARS);
            prop_assert!(parsed.events <= MAX_EVENTS);
        }
    }
}
