// ABOUTME: Slide content parsers and the registry that dispatches on file extension
// ABOUTME: Ships a passthrough HTML parser and a Markdown parser built on comrak

use crate::errors::{Result, ShowError};
use crate::presentation::SlideContext;
use comrak::{ComrakOptions, markdown_to_html as comrak_markdown_to_html};
use log::debug;
use std::collections::HashMap;

/// Turns the composed body of a slide file into markup.
///
/// The context carries the slide being built and the whole presentation,
/// so a parser can take presentation-level settings into account.
pub trait SlideParser: Send + Sync {
    fn parse_slide(&self, ctx: &SlideContext<'_>, input: &str) -> Result<String>;
}

/// Passes HTML slides through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlSlideParser;

impl SlideParser for HtmlSlideParser {
    fn parse_slide(&self, _ctx: &SlideContext<'_>, input: &str) -> Result<String> {
        Ok(input.to_string())
    }
}

/// Renders Markdown slides to HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownSlideParser;

impl SlideParser for MarkdownSlideParser {
    fn parse_slide(&self, _ctx: &SlideContext<'_>, input: &str) -> Result<String> {
        Ok(markdown_to_html(input))
    }
}

/// Convert markdown to HTML with the extensions slide authors expect.
/// Raw HTML is allowed through so slides can mix both.
pub fn markdown_to_html(input: &str) -> String {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.description_lists = true;
    options.render.unsafe_ = true;
    comrak_markdown_to_html(input, &options)
}

/// Maps a file extension (case-sensitive, no leading dot) to a parser.
///
/// Populated once at startup and then shared read-only by every render.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Box<dyn SlideParser>>,
}

impl ParserRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `html` and `md` registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("html", HtmlSlideParser);
        registry.register("md", MarkdownSlideParser);
        registry
    }

    /// Associate `format` with `parser`, replacing any previous parser for it.
    pub fn register(&mut self, format: &str, parser: impl SlideParser + 'static) {
        let format = format.trim_start_matches('.');
        debug!("Registering slide parser for {:?}", format);
        self.parsers.insert(format.to_string(), Box::new(parser));
    }

    pub fn supports(&self, format: &str) -> bool {
        self.parsers.contains_key(format)
    }

    /// Registered format tokens, sorted.
    pub fn formats(&self) -> Vec<&str> {
        let mut formats: Vec<&str> = self.parsers.keys().map(String::as_str).collect();
        formats.sort_unstable();
        formats
    }

    /// Parse `input` with the parser registered for `format`.
    pub fn dispatch(&self, format: &str, ctx: &SlideContext<'_>, input: &str) -> Result<String> {
        match self.parsers.get(format) {
            Some(parser) => parser.parse_slide(ctx, input),
            None => Err(ShowError::NoParserForFormat(format.to_string())),
        }
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}
