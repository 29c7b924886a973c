//! Tolerant `SKILL.md` header scanner.
//!
//! Not a YAML parser: it reads `key: value` lines and
//! indented continuation lines, and never fails. Malformed headers only
//! under-populate the result.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ManifestMetadata, ParsedManifest};

const DELIMITER: &str = "---";

#[allow(clippy::expect_used)]
static KEY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+):\s*(.*)$").expect("valid key regex"));

/// Parse manifest text into header metadata and body.
///
/// Without a header the metadata is empty and the body is the whole input.
pub fn parse_manifest(content: &str) -> ParsedManifest {
    let Some((header, body)) = split_header(content) else {
        return ParsedManifest {
            metadata: ManifestMetadata::default(),
            body: content.to_string(),
        };
    };

    ParsedManifest {
        metadata: scan_header(header),
        body: body.to_string(),
    }
}

/// Split at the opening and closing `---` lines into (header, body).
///
/// The opening delimiter must be the very first line.
fn split_header(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix(DELIMITER)?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n').trim_end_matches('\r');
        if bare == DELIMITER {
            let header = rest[..offset]
                .trim_end_matches('\n')
                .trim_end_matches('\r');
            return Some((header, &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// A key waiting for indented continuation lines.
struct PendingKey {
    key: String,
    parts: Vec<String>,
}

fn scan_header(header: &str) -> ManifestMetadata {
    let mut meta = ManifestMetadata::default();
    let mut pending: Option<PendingKey> = None;

    for line in header.lines() {
        if let Some(caps) = KEY_LINE.captures(line) {
            if let Some(done) = pending.take() {
                assign(&mut meta, &done.key, done.parts.join(" "));
            }
            let key = &caps[1];
            let value = caps[2].trim();
            if value.is_empty() || is_block_indicator(value) {
                pending = Some(PendingKey {
                    key: key.to_string(),
                    parts: Vec::new(),
                });
            } else {
                assign(&mut meta, key, unquote(value).to_string());
            }
            continue;
        }

        if let Some(current) = pending.as_mut()
            && line.starts_with("  ")
        {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                current.parts.push(trimmed.to_string());
            }
        }
    }

    if let Some(done) = pending {
        assign(&mut meta, &done.key, done.parts.join(" "));
    }
    meta
}

fn assign(meta: &mut ManifestMetadata, key: &str, value: String) {
    let optional = |value: String| (!value.is_empty()).then_some(value);
    match key {
        "name" => meta.name = value,
        "description" => meta.description = value,
        "license" => meta.license = optional(value),
        "compatibility" => meta.compatibility = optional(value),
        "allowed-tools" => meta.allowed_tools = optional(value),
        other => {
            meta.extra.insert(other.to_string(), value);
        },
    }
}

/// YAML block scalar markers (`|`, `>-`, ...) start a multiline value.
fn is_block_indicator(value: &str) -> bool {
    matches!(value, "|" | ">" | "|-" | ">-" | "|+" | ">+")
}

/// Strip one pair of matching surrounding quotes.
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2
            && let Some(inner) = value
                .strip_prefix(quote)
                .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
