//! Line-oriented HLS manifest rewriting.
//!
//! Every URL reference in a playlist is resolved against the manifest's own
//! URL and replaced with a proxy URL, so the player keeps coming back
//! through us for sub-playlists, segments and keys alike. Rewriting is
//! best-effort per line: a reference that fails to resolve leaves its line
//! untouched and the rest of the manifest is still processed.

use super::resolve::{build_proxy_url, resolve};
use crate::headers::HeaderBundle;
use tracing::warn;
use url::Url;

/// Rewrite every URL reference in `content`.
///
/// Three kinds of lines carry references:
/// - tag lines with a quoted `URI="..."` attribute (`EXT-X-KEY`,
///   `EXT-X-MAP`, `EXT-X-MEDIA`, ...) — only the quoted value changes;
/// - bare reference lines (segments and sub-playlists) — the whole line is
///   replaced;
/// - `#EXT-X-STREAM-INF` announces its variant URI on the following line,
///   so the tag itself passes through.
///
/// Comments, blank lines and other tags pass through unchanged, in input
/// order. The header bundle that reached this manifest is propagated to
/// every rewritten reference.
pub fn rewrite(content: &str, base: &Url, origin: &str, bundle: &HeaderBundle) -> String {
    content
        .split('\n')
        .map(|line| rewrite_line(line, base, origin, bundle))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rewrite_line(line: &str, base: &Url, origin: &str, bundle: &HeaderBundle) -> String {
    if let Some(attr) = find_uri_attribute(line) {
        return match resolve(attr.value, base) {
            Ok(target) => {
                let proxied = build_proxy_url(origin, &target, bundle);
                format!(
                    "{}{}{}",
                    &line[..attr.value_start],
                    proxied,
                    &line[attr.value_end..]
                )
            }
            Err(e) => {
                warn!("leaving URI attribute unrewritten: {}", e);
                line.to_string()
            }
        };
    }

    // The variant URI for a STREAM-INF tag sits on the following line.
    if line.starts_with("#EXT-X-STREAM-INF") {
        return line.to_string();
    }

    let trimmed = line.trim();
    if trimmed.is_empty() || line.starts_with('#') {
        return line.to_string();
    }

    match resolve(trimmed, base) {
        Ok(target) => build_proxy_url(origin, &target, bundle),
        Err(e) => {
            warn!("leaving reference line unrewritten: {}", e);
            line.to_string()
        }
    }
}

/// Location of the first quoted `URI=` attribute value in a line.
struct UriAttribute<'a> {
    /// The quoted value, without its quotes.
    value: &'a str,
    /// Byte offset of the value's first character.
    value_start: usize,
    /// Byte offset of the closing quote.
    value_end: usize,
}

/// Scan for `URI="..."` or `URI='...'`, first match only.
///
/// Deliberately not a regex: find a `URI=` token, read the quote character,
/// scan to the matching quote. A `URI=` without an immediate quote is
/// skipped; an opened quote that never closes means no match and the line
/// passes through untouched.
fn find_uri_attribute(line: &str) -> Option<UriAttribute<'_>> {
    let mut search_from = 0;
    while let Some(pos) = line[search_from..].find("URI=") {
        let after_eq = search_from + pos + 4;
        match line[after_eq..].chars().next() {
            Some(quote @ ('"' | '\'')) => {
                let value_start = after_eq + 1;
                let close = line[value_start..].find(quote)?;
                return Some(UriAttribute {
                    value: &line[value_start..value_start + close],
                    value_start,
                    value_end: value_start + close,
                });
            }
            _ => search_from = after_eq,
        }
    }
    None
}
