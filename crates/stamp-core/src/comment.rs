//! Comment-style resolution: which comment syntax wraps the path header
//! for a given file extension.
//!
//! There is exactly one table. Both the new-file stamper and the backfill
//! read it, so a file gets the same header no matter which path stamps it.

use std::collections::BTreeSet;

/// Leading strings that mark a file as already carrying a header comment.
pub const COMMENT_LEADERS: [&str; 5] = ["//", "#", "<!--", "/*", "--"];

/// Extensions the host treats as generic plain text when nothing is configured.
pub const DEFAULT_PLAIN_TEXT_EXTENSIONS: [&str; 4] = ["text", "log", "cfg", "conf"];

const HASH: CommentTemplate = CommentTemplate::new("# ", "");
const SLASH: CommentTemplate = CommentTemplate::new("// ", "");
const MARKUP: CommentTemplate = CommentTemplate::new("<!-- ", " -->");
const BLOCK: CommentTemplate = CommentTemplate::new("/* ", " */");
const DASH: CommentTemplate = CommentTemplate::new("-- ", "");

/// Extension table. `None` marks an extension that is recognised but has no
/// safe comment syntax.
const TABLE: &[(&str, Option<CommentTemplate>)] = &[
    ("py", Some(HASH)),
    ("txt", Some(HASH)),
    ("php", Some(HASH)),
    ("yaml", Some(HASH)),
    ("yml", Some(HASH)),
    ("java", Some(SLASH)),
    ("js", Some(SLASH)),
    ("ts", Some(SLASH)),
    ("c", Some(SLASH)),
    ("cpp", Some(SLASH)),
    ("h", Some(SLASH)),
    ("cs", Some(SLASH)),
    ("go", Some(SLASH)),
    ("kt", Some(SLASH)),
    ("rs", Some(SLASH)),
    ("swift", Some(SLASH)),
    ("xml", Some(MARKUP)),
    ("html", Some(MARKUP)),
    ("css", Some(BLOCK)),
    ("sql", Some(DASH)),
    // A JSON document body has no comment syntax.
    ("json", None),
];

/// Prefix/suffix pair rendered around a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentTemplate {
    pub prefix: &'static str,
    pub suffix: &'static str,
}

impl CommentTemplate {
    pub const fn new(prefix: &'static str, suffix: &'static str) -> Self {
        Self { prefix, suffix }
    }

    /// Render the comment line for `path`, without a line terminator.
    pub fn render(&self, path: &str) -> String {
        format!("{}{}{}", self.prefix, path, self.suffix)
    }

    /// Render the full header: the comment line followed by one blank line.
    pub fn header(&self, path: &str) -> String {
        format!("{}\n\n", self.render(path))
    }
}

/// Resolve the template for a lowercased extension.
///
/// Extensions missing from the table fall back to `# ` when the file is
/// classified as plain text. Never fails: `None` just means "don't stamp".
pub fn resolve(extension: &str, is_plain_text: bool) -> Option<CommentTemplate> {
    let extension = extension.to_ascii_lowercase();
    match TABLE.iter().find(|(ext, _)| *ext == extension) {
        Some((_, template)) => *template,
        None if is_plain_text => Some(HASH),
        None => None,
    }
}

/// Extensions that can be stamped, in table order. This is the backfill
/// allow-list.
pub fn stampable_extensions() -> impl Iterator<Item = &'static str> {
    TABLE
        .iter()
        .filter(|(_, template)| template.is_some())
        .map(|(ext, _)| *ext)
}

/// Whether `text` already starts with one of [`COMMENT_LEADERS`].
///
/// Only the prefix is checked; the comment's content is not compared with
/// the path the file would get.
pub fn has_comment_leader(text: &str) -> bool {
    COMMENT_LEADERS.iter().any(|leader| text.starts_with(leader))
}

/// The host's "generic plain text" classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainTextTypes {
    extensions: BTreeSet<String>,
}

impl PlainTextTypes {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    pub fn is_plain_text(&self, extension: &str) -> bool {
        self.extensions.contains(&extension.to_ascii_lowercase())
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Merge extra extensions (e.g. from a project manifest).
    pub fn extend<I, S>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions.extend(Self::new(extensions).extensions);
    }
}

impl Default for PlainTextTypes {
    fn default() -> Self {
        Self::new(DEFAULT_PLAIN_TEXT_EXTENSIONS)
    }
}
