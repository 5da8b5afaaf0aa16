//! Resolves every resource reference of a document through a [`ResourceResolver`].
//!
//! An out-of-process engine cannot call back into the service, so references are resolved
//! up front and replaced by self-contained `data:` URIs. Whatever the resolver refuses
//! fails the render. Inlined resources that can refer to further resources (style sheets,
//! SVG and HTML, including `data:` payloads of those types) are linked recursively,
//! relative to the resource they appear in, up to [`MAX_IMPORT_DEPTH`] levels.
//!
//! Style sheets are tokenized with `cssparser`, so escaped function names and comments
//! between tokens are seen the way the engine sees them.

use std::{cell::RefCell, path::Path, rc::Rc};

use base64::{Engine, engine::general_purpose::STANDARD};
use cssparser::{ParseError, Parser, ParserInput, Token};
use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str, text};
use url::Url;

use crate::application::access::{ResolvedResource, ResourceResolver};

use super::types::RenderError;

/// Maximum nesting of resources referring to further resources.
pub(crate) const MAX_IMPORT_DEPTH: usize = 8;

const CSS_MIME: &str = "text/css";
const MARKUP_MIMES: &[&str] = &[
    "image/svg+xml",
    "text/html",
    "application/xhtml+xml",
    "application/xml",
    "text/xml",
];

/// CSS functions whose string argument is a URL.
const URL_FUNCTIONS: &[&str] = &["url", "src"];
/// CSS functions whose bare string arguments are URLs.
const IMAGE_SET_FUNCTIONS: &[&str] = &["image-set", "-webkit-image-set"];

/// Relations under which the engine fetches a `link` target.
const FETCHED_LINK_RELATIONS: &[&str] = &["stylesheet", "icon", "attachment"];

/// What the engine does with an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttributeRole {
    /// A single resource reference.
    Resource,
    /// Inline style declarations.
    Style,
    /// Dereferenced but not worth inlining; removed.
    Strip,
    /// Not dereferenced (hyperlinks, plain values).
    Ignore,
}

fn attribute_role(tag: &str, name: &str, rel: Option<&str>) -> AttributeRole {
    match name {
        "style" => AttributeRole::Style,
        "srcset" => AttributeRole::Strip,
        "src" if matches!(tag, "iframe" | "frame" | "script") => AttributeRole::Strip,
        "src" | "poster" | "background" | "lowsrc" => AttributeRole::Resource,
        "data" if tag == "object" => AttributeRole::Resource,
        "href" | "xlink:href" => match tag {
            "base" => AttributeRole::Strip,
            "a" | "area" if has_relation(rel, &["attachment"]) => AttributeRole::Resource,
            "a" | "area" => AttributeRole::Ignore,
            "link" if has_relation(rel, FETCHED_LINK_RELATIONS) => AttributeRole::Resource,
            "link" => AttributeRole::Ignore,
            _ => AttributeRole::Resource,
        },
        _ => AttributeRole::Ignore,
    }
}

fn has_relation(rel: Option<&str>, wanted: &[&str]) -> bool {
    rel.is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|token| wanted.iter().any(|w| token.eq_ignore_ascii_case(w)))
    })
}

pub(crate) struct Linker<'a> {
    resolver: &'a dyn ResourceResolver,
}

impl<'a> Linker<'a> {
    pub(crate) fn new(resolver: &'a dyn ResourceResolver) -> Self {
        Self { resolver }
    }

    /// Link an HTML document located at `base`.
    pub(crate) fn link_document(&self, html: &str, base: &Url) -> Result<String, RenderError> {
        self.link_markup(html, base, 0)
    }

    /// Link HTML or SVG markup embedded `depth` levels below the document.
    fn link_markup(&self, markup: &str, base: &Url, depth: usize) -> Result<String, RenderError> {
        check_depth(depth)?;

        let failure: Rc<RefCell<Option<RenderError>>> = Rc::new(RefCell::new(None));
        let style_buffer = Rc::new(RefCell::new(String::new()));

        let mut handlers = Vec::new();
        handlers.push(element!("base", |el| {
            el.remove();
            Ok(())
        }));

        {
            let failure = Rc::clone(&failure);
            handlers.push(element!("*", move |el| {
                let tag = el.tag_name();
                let rel = el.get_attribute("rel");
                let attributes: Vec<(String, String)> = el
                    .attributes()
                    .iter()
                    .map(|attribute| (attribute.name(), attribute.value()))
                    .collect();

                for (name, value) in attributes {
                    let linked = match attribute_role(&tag, &name, rel.as_deref()) {
                        AttributeRole::Ignore => continue,
                        AttributeRole::Strip => {
                            el.remove_attribute(&name);
                            continue;
                        }
                        AttributeRole::Resource => self.inline_reference(&value, base, depth + 1),
                        AttributeRole::Style => {
                            self.link_stylesheet(&value, base, depth).map(Some)
                        }
                    };
                    match linked {
                        Ok(Some(replacement)) => el.set_attribute(&name, &replacement)?,
                        Ok(None) => {}
                        Err(err) => return Err(record_failure(&failure, err)),
                    }
                }
                Ok(())
            }));
        }

        {
            let failure = Rc::clone(&failure);
            let style_buffer = Rc::clone(&style_buffer);
            handlers.push(text!("style", move |chunk| {
                let mut buffer = style_buffer.borrow_mut();
                buffer.push_str(chunk.as_str());
                if !chunk.last_in_text_node() {
                    chunk.remove();
                    return Ok(());
                }

                let css = std::mem::take(&mut *buffer);
                match self.link_stylesheet(&css, base, depth) {
                    Ok(linked) => chunk.replace(&linked, ContentType::Html),
                    Err(err) => return Err(record_failure(&failure, err)),
                }
                Ok(())
            }));
        }

        let rewritten = rewrite_str(
            markup,
            RewriteStrSettings {
                element_content_handlers: handlers,
                ..RewriteStrSettings::new()
            },
        );

        if let Some(err) = failure.borrow_mut().take() {
            return Err(err);
        }
        rewritten.map_err(|err| RenderError::InvalidDocument {
            reason: err.to_string(),
        })
    }

    /// Link style sheet text located at `base`, `depth` levels below the document.
    pub(crate) fn link_stylesheet(
        &self,
        css: &str,
        base: &Url,
        depth: usize,
    ) -> Result<String, RenderError> {
        check_depth(depth)?;

        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let mut output = String::with_capacity(css.len());
        self.link_tokens(&mut parser, base, depth, false, &mut output)?;
        Ok(output)
    }

    /// Copy tokens to `output`, replacing every URL token with its inlined form.
    ///
    /// Source text is copied slice by slice, so everything that is not a reference keeps
    /// its original spelling.
    fn link_tokens<'i, 't>(
        &self,
        parser: &mut Parser<'i, 't>,
        base: &Url,
        depth: usize,
        strings_are_urls: bool,
        output: &mut String,
    ) -> Result<(), RenderError> {
        let mut after_import = false;

        loop {
            let start = parser.position();
            let token = match parser.next_including_whitespace_and_comments() {
                Ok(token) => token.clone(),
                Err(_) => return Ok(()),
            };

            match &token {
                Token::WhiteSpace(_) | Token::Comment(_) => {
                    output.push_str(parser.slice_from(start));
                    continue;
                }
                Token::AtKeyword(name) => {
                    output.push_str(parser.slice_from(start));
                    after_import = name.eq_ignore_ascii_case("import");
                    continue;
                }
                Token::QuotedString(reference) if after_import || strings_are_urls => {
                    self.push_url(reference, parser.slice_from(start), base, depth, output)?;
                }
                Token::UnquotedUrl(reference) => {
                    self.push_url(reference, parser.slice_from(start), base, depth, output)?;
                }
                // The engine ignores malformed URLs; so does the linked output.
                Token::BadUrl(_) => {}
                Token::Function(name) if is_one_of(name, URL_FUNCTIONS) => {
                    let reference = parser
                        .parse_nested_block(|nested| {
                            nested
                                .expect_string_cloned()
                                .map_err(ParseError::<()>::from)
                        })
                        .ok();
                    if let Some(reference) = reference {
                        self.push_url(&reference, parser.slice_from(start), base, depth, output)?;
                    }
                }
                Token::Function(_)
                | Token::ParenthesisBlock
                | Token::SquareBracketBlock
                | Token::CurlyBracketBlock => {
                    output.push_str(parser.slice_from(start));
                    let nested_urls = matches!(
                        &token,
                        Token::Function(name) if is_one_of(name, IMAGE_SET_FUNCTIONS)
                    );

                    let mut failure = None;
                    let mut inner_end = None;
                    let _ = parser.parse_nested_block(|nested| {
                        if let Err(err) =
                            self.link_tokens(nested, base, depth, nested_urls, output)
                        {
                            failure = Some(err);
                        }
                        inner_end = Some(nested.position());
                        Ok::<(), ParseError<'i, ()>>(())
                    });
                    if let Some(err) = failure {
                        return Err(err);
                    }
                    if let Some(end) = inner_end {
                        output.push_str(parser.slice_from(end));
                    }
                }
                _ => output.push_str(parser.slice_from(start)),
            }
            after_import = false;
        }
    }

    fn push_url(
        &self,
        reference: &str,
        original: &str,
        base: &Url,
        depth: usize,
        output: &mut String,
    ) -> Result<(), RenderError> {
        match self.inline_reference(reference, base, depth + 1)? {
            Some(replacement) => output.push_str(&format!("url(\"{replacement}\")")),
            None => output.push_str(original),
        }
        Ok(())
    }

    /// Resolve one reference and return the `data:` URI replacing it.
    ///
    /// `depth` is the nesting level of the referenced resource. Returns `None` for
    /// references that stay as written: empty values, fragment-only references and
    /// `data:` URIs whose content cannot refer to anything else.
    fn inline_reference(
        &self,
        reference: &str,
        base: &Url,
        depth: usize,
    ) -> Result<Option<String>, RenderError> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with('#') {
            return Ok(None);
        }

        if is_data_uri(reference) {
            let resolved = self.resolver.resolve(reference)?;
            // Nested references in a data payload are relative to where it is embedded.
            return self.link_nested(&resolved, base, depth);
        }

        let locator = match base.join(reference) {
            Ok(mut joined) => {
                joined.set_fragment(None);
                joined.to_string()
            }
            Err(_) => reference.to_string(),
        };

        let resolved = self.resolver.resolve(&locator)?;
        let nested_base = Url::parse(&locator).unwrap_or_else(|_| base.clone());
        match self.link_nested(&resolved, &nested_base, depth)? {
            Some(linked) => Ok(Some(linked)),
            None => Ok(Some(data_uri(&resolved.mime_type, &resolved.bytes))),
        }
    }

    /// Link a resource that can refer to further resources, returning its new `data:` URI.
    fn link_nested(
        &self,
        resource: &ResolvedResource,
        base: &Url,
        depth: usize,
    ) -> Result<Option<String>, RenderError> {
        let essence = mime_essence(&resource.mime_type);
        if essence.eq_ignore_ascii_case(CSS_MIME) {
            let text = String::from_utf8_lossy(&resource.bytes);
            let linked = self.link_stylesheet(&text, base, depth)?;
            Ok(Some(data_uri(CSS_MIME, linked.as_bytes())))
        } else if let Some(markup) = MARKUP_MIMES
            .iter()
            .find(|mime| essence.eq_ignore_ascii_case(mime))
        {
            let text = String::from_utf8_lossy(&resource.bytes);
            let linked = self.link_markup(&text, base, depth)?;
            Ok(Some(data_uri(markup, linked.as_bytes())))
        } else {
            Ok(None)
        }
    }
}

/// File URL used as the base for references inside the file at `path`.
pub(crate) fn file_base(path: &Path) -> Result<Url, RenderError> {
    Url::from_file_path(path).map_err(|()| RenderError::InvalidDocument {
        reason: format!("`{}` is not an absolute path", path.display()),
    })
}

fn check_depth(depth: usize) -> Result<(), RenderError> {
    if depth > MAX_IMPORT_DEPTH {
        return Err(RenderError::ImportDepth {
            max_depth: MAX_IMPORT_DEPTH,
        });
    }
    Ok(())
}

fn is_one_of(name: &str, names: &[&str]) -> bool {
    names.iter().any(|candidate| name.eq_ignore_ascii_case(candidate))
}

fn record_failure(
    slot: &Rc<RefCell<Option<RenderError>>>,
    err: RenderError,
) -> Box<dyn std::error::Error + Send + Sync> {
    let message = err.to_string();
    slot.borrow_mut().get_or_insert(err);
    message.into()
}

fn is_data_uri(reference: &str) -> bool {
    reference
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

fn mime_essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or_default().trim()
}

fn data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf, sync::Mutex};

    use bytes::Bytes;
    use tempfile::TempDir;

    use crate::application::access::{AccessError, ResourceAccessController};

    use super::*;

    /// Resolver recording every locator it is asked for.
    #[derive(Default)]
    struct RecordingResolver {
        seen: Mutex<Vec<String>>,
    }

    impl ResourceResolver for RecordingResolver {
        fn resolve(&self, locator: &str) -> Result<ResolvedResource, AccessError> {
            self.seen
                .lock()
                .expect("resolver lock")
                .push(locator.to_string());
            if locator.starts_with("http") {
                return Err(AccessError::ExternalNotPermitted {
                    locator: locator.to_string(),
                });
            }
            let mime_type = if locator.ends_with(".css") {
                "text/css"
            } else {
                "image/png"
            };
            Ok(ResolvedResource {
                mime_type: mime_type.to_string(),
                bytes: Bytes::from_static(b"x"),
            })
        }
    }

    fn base() -> Url {
        Url::parse("file:///work/parts/index.html").expect("base url")
    }

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: TempDir::new().expect("temp dir"),
            }
        }

        fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
            let path = fs::canonicalize(self.dir.path())
                .expect("canonical dir")
                .join(name);
            fs::write(&path, contents).expect("write file");
            path
        }
    }

    #[test]
    fn relative_image_is_joined_against_document_and_inlined() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let linked = linker
            .link_document("<html><img src='logo.png'></html>", &base())
            .expect("linked");

        assert_eq!(
            resolver.seen.lock().expect("lock").as_slice(),
            ["file:///work/parts/logo.png"]
        );
        assert!(linked.contains("data:image/png;base64,eA=="), "{linked}");
        assert!(!linked.contains("logo.png"));
    }

    #[test]
    fn rejected_reference_fails_the_document() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let err = linker
            .link_document(
                "<html><img src='http://evil.example/x.png'></html>",
                &base(),
            )
            .expect_err("external image");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::ExternalNotPermitted { .. })
        ));
    }

    #[test]
    fn base_elements_and_srcset_are_dropped() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let linked = linker
            .link_document(
                "<html><head><base href='http://evil.example/'></head>\
                 <img srcset='http://evil.example/a.png 2x' src='a.png'></html>",
                &base(),
            )
            .expect("linked");

        assert!(!linked.contains("evil.example"), "{linked}");
        assert!(!linked.contains("<base"));
    }

    #[test]
    fn fragment_and_empty_references_are_left_alone() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let html = "<svg><image href='#sprite'></image></svg><img src=''>";
        let linked = linker.link_document(html, &base()).expect("linked");
        assert!(resolver.seen.lock().expect("lock").is_empty());
        assert!(linked.contains("#sprite"));
    }

    #[test]
    fn data_uris_are_checked_but_kept_verbatim() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let html = "<img src='data:image/gif;base64,R0lGOD'>";
        let linked = linker.link_document(html, &base()).expect("linked");
        assert_eq!(resolver.seen.lock().expect("lock").len(), 1);
        assert!(linked.contains("data:image/gif;base64,R0lGOD"));
    }

    #[test]
    fn style_blocks_and_attributes_are_linked() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let html = "<style>body { background: url(bg.png) }</style>\
                    <div style=\"background-image: url('tile.png')\"></div>";
        let linked = linker.link_document(html, &base()).expect("linked");

        let seen = resolver.seen.lock().expect("lock").clone();
        assert_eq!(
            seen,
            [
                "file:///work/parts/bg.png".to_string(),
                "file:///work/parts/tile.png".to_string()
            ]
        );
        assert!(!linked.contains("bg.png"));
        assert!(!linked.contains("tile.png"));
    }

    #[test]
    fn stylesheet_imports_are_linked_recursively() {
        let workspace = Workspace::new();
        let document = workspace.write("index.html", b"<link rel=stylesheet href=main.css>");
        let main = workspace.write("main.css", b"@import 'fonts.css'; h1 { color: red }");
        let fonts = workspace.write(
            "fonts.css",
            b"@font-face { src: url(\"font.woff2\") format('woff2') }",
        );
        let font = workspace.write("font.woff2", b"wOF2");

        let controller = ResourceAccessController::new([&document, &main, &fonts, &font]);
        let linker = Linker::new(&controller);

        let html = fs::read_to_string(&document).expect("read document");
        let linked = linker
            .link_document(&html, &file_base(&document).expect("base"))
            .expect("linked");

        let encoded = linked
            .split("data:text/css;base64,")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("inlined stylesheet");
        let main_css = String::from_utf8(STANDARD.decode(encoded).expect("base64")).expect("utf-8");
        assert!(main_css.contains("@import url(\"data:text/css;base64,"));
        assert!(main_css.contains("h1 { color: red }"));
    }

    #[test]
    fn stylesheet_referencing_unlisted_file_fails() {
        let workspace = Workspace::new();
        let style = workspace.write("site.css", b"body { background: url(../../etc/passwd) }");
        let controller = ResourceAccessController::new([&style]);
        let linker = Linker::new(&controller);

        let css = fs::read_to_string(&style).expect("read style");
        let err = linker
            .link_stylesheet(&css, &file_base(&style).expect("base"), 0)
            .expect_err("traversal");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::NotPermitted { .. })
        ));
    }

    #[test]
    fn comments_are_kept_and_not_resolved() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let css = "/* url(http://evil.example/a.png) */ p { }";
        let linked = linker.link_stylesheet(css, &base(), 0).expect("linked");
        assert!(resolver.seen.lock().expect("lock").is_empty());
        assert_eq!(linked, css);
    }

    #[test]
    fn escaped_url_function_is_resolved() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let err = linker
            .link_stylesheet(
                "p { background: \\75 rl(http://evil.example/x.png) }",
                &base(),
                0,
            )
            .expect_err("escaped url");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::ExternalNotPermitted { .. })
        ));
        assert_eq!(
            resolver.seen.lock().expect("lock").as_slice(),
            ["http://evil.example/x.png"]
        );
    }

    #[test]
    fn comment_between_import_and_string_is_resolved() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let err = linker
            .link_stylesheet("@import/**/\"http://evil.example/x.css\";", &base(), 0)
            .expect_err("commented import");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::ExternalNotPermitted { .. })
        ));
    }

    #[test]
    fn image_set_strings_are_inlined() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let linked = linker
            .link_stylesheet(
                "p { background: image-set(\"a.png\" 1x, url(b.png) 2x) }",
                &base(),
                0,
            )
            .expect("linked");
        assert_eq!(
            resolver.seen.lock().expect("lock").as_slice(),
            ["file:///work/parts/a.png", "file:///work/parts/b.png"]
        );
        assert!(linked.starts_with("p { background: image-set(url(\"data:image/png"), "{linked}");
        assert!(linked.ends_with("2x) }"), "{linked}");
    }

    #[test]
    fn plain_strings_are_not_references() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let css = "p::before { content: \"http://example.com/x.png\" }";
        let linked = linker.link_stylesheet(css, &base(), 0).expect("linked");
        assert!(resolver.seen.lock().expect("lock").is_empty());
        assert_eq!(linked, css);
    }

    #[test]
    fn data_stylesheet_imports_are_checked() {
        let controller = ResourceAccessController::new(Vec::<PathBuf>::new());
        let linker = Linker::new(&controller);

        let err = linker
            .link_document(
                "<link rel=stylesheet href=\"data:text/css,@import url(http://evil.example/x.css)\">",
                &base(),
            )
            .expect_err("import inside data stylesheet");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::ExternalNotPermitted { .. })
        ));
    }

    #[test]
    fn data_svg_references_are_checked() {
        let controller = ResourceAccessController::new(Vec::<PathBuf>::new());
        let linker = Linker::new(&controller);

        let svg = "<svg xmlns='http://www.w3.org/2000/svg'><image href='file:///etc/passwd'/></svg>";
        let html = format!("<img src=\"data:image/svg+xml;base64,{}\">", STANDARD.encode(svg));
        let err = linker
            .link_document(&html, &base())
            .expect_err("reference inside data svg");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::NotPermitted { .. })
        ));
    }

    #[test]
    fn svg_asset_references_are_checked() {
        let workspace = Workspace::new();
        let svg = workspace.write(
            "logo.svg",
            b"<svg xmlns='http://www.w3.org/2000/svg'><image href='file:///etc/passwd'/></svg>",
        );
        let document = workspace.write("index.html", b"<img src=logo.svg>");
        let controller = ResourceAccessController::new([&document, &svg]);
        let linker = Linker::new(&controller);

        let html = fs::read_to_string(&document).expect("read document");
        let err = linker
            .link_document(&html, &file_base(&document).expect("base"))
            .expect_err("svg asset escapes the allow-list");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::NotPermitted { .. })
        ));
    }

    #[test]
    fn svg_asset_references_are_inlined() {
        let workspace = Workspace::new();
        let png = workspace.write("dot.png", b"\x89PNG");
        let svg = workspace.write(
            "logo.svg",
            b"<svg xmlns='http://www.w3.org/2000/svg'><image href='dot.png'/></svg>",
        );
        let document = workspace.write("index.html", b"<img src=logo.svg>");
        let controller = ResourceAccessController::new([&document, &svg, &png]);
        let linker = Linker::new(&controller);

        let html = fs::read_to_string(&document).expect("read document");
        let linked = linker
            .link_document(&html, &file_base(&document).expect("base"))
            .expect("linked");

        let encoded = linked
            .split("data:image/svg+xml;base64,")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("inlined svg");
        let svg = String::from_utf8(STANDARD.decode(encoded).expect("base64")).expect("utf-8");
        assert!(svg.contains("data:image/png;base64,"), "{svg}");
        assert!(!svg.contains("dot.png"), "{svg}");
    }

    #[test]
    fn inline_svg_use_reference_is_checked() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let err = linker
            .link_document(
                "<svg><use href='http://evil.example/sprites.svg#icon'></use></svg>",
                &base(),
            )
            .expect_err("external sprite");
        assert!(matches!(
            err.access_error(),
            Some(AccessError::ExternalNotPermitted { .. })
        ));
    }

    #[test]
    fn hyperlinks_are_left_alone() {
        let resolver = RecordingResolver::default();
        let linker = Linker::new(&resolver);

        let html = "<link rel=canonical href='http://example.com/'>\
                    <a href='http://example.com/page'>page</a>";
        let linked = linker.link_document(html, &base()).expect("linked");
        assert!(resolver.seen.lock().expect("lock").is_empty());
        assert_eq!(linked, html);
    }

    #[test]
    fn self_importing_stylesheet_hits_depth_limit() {
        let workspace = Workspace::new();
        let style = workspace.write("loop.css", b"@import 'loop.css';");
        let controller = ResourceAccessController::new([&style]);
        let linker = Linker::new(&controller);

        let err = linker
            .link_stylesheet("@import 'loop.css';", &file_base(&style).expect("base"), 0)
            .expect_err("loop");
        assert!(matches!(err, RenderError::ImportDepth { .. }));
    }
}
