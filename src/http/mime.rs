use std::path::Path;

/// Content types the server can label a file with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    TextHtml,
    #[default]
    TextPlain,
}

impl ContentType {
    /// Picks the content type from the file name: `.html` (any case) is
    /// HTML, everything else is plain text.
    pub fn for_path(path: &Path) -> Self {
        let name = path.to_string_lossy();
        let is_html = name
            .len()
            .checked_sub(".html".len())
            .and_then(|start| name.get(start..))
            .is_some_and(|ext| ext.eq_ignore_ascii_case(".html"));

        if is_html {
            ContentType::TextHtml
        } else {
            ContentType::TextPlain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::TextHtml => "text/html",
            ContentType::TextPlain => "text/plain",
        }
    }
}
