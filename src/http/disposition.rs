//! Content-Disposition for downloaded files
//!
//! The plain `filename` parameter only carries printable ASCII: quotes,
//! backslashes, control characters and anything non-ASCII are dropped.
//! The full title travels in `filename*` (RFC 6266, RFC 5987) so clients
//! that understand it keep non-Latin titles intact.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::ytdlp::metadata::DEFAULT_TITLE;

/// RFC 5987 `attr-char` is left as is, everything else is encoded
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'')
}

/// ASCII-only file stem for the plain `filename` parameter
pub fn sanitize_filename(title: &str) -> String {
    let stem: String = title
        .chars()
        .filter(|c| c.is_ascii() && !c.is_ascii_control() && !is_quote(*c) && *c != '\\')
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        stem.to_string()
    }
}

/// Header value offering `<title>.<extension>` as an attachment
pub fn content_disposition(title: &str, extension: &str) -> String {
    let full: String = title
        .chars()
        .filter(|c| !c.is_control() && !is_quote(*c))
        .collect();
    let full = match full.trim() {
        "" => DEFAULT_TITLE,
        t => t,
    };

    format!(
        "attachment; filename=\"{}.{}\"; filename*=UTF-8''{}.{}",
        sanitize_filename(title),
        extension,
        utf8_percent_encode(full, ATTR_CHAR),
        extension
    )
}
