//! LineEntryParser - 1 行 1 コミュニティのテキスト形式
//!
//! Each non-empty line is `identifier[<sep>display name]` where `<sep>` is
//! `;`, `,` or a tab. Lines starting with `#` are comments. The identifier
//! may be:
//! - a numeric id (`12345`, `-12345` as an owner id)
//! - `club12345` / `public12345` / `event12345`
//! - a screen name (`rustlang`)
//! - a URL whose last path segment is one of the above

use crate::domain::{ParsedEntry, ParsedFile};
use crate::ports::{EncodingHint, EntryParser};

const ID_PREFIXES: [&str; 3] = ["club", "public", "event"];

#[derive(Debug, Clone, Copy, Default)]
pub struct LineEntryParser;

impl LineEntryParser {
    pub fn new() -> Self {
        Self
    }

    fn decode(bytes: &[u8], encoding: EncodingHint) -> Result<String, String> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match encoding {
            EncodingHint::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| format!("file is not valid UTF-8: {e}")),
            EncodingHint::Utf8Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
            EncodingHint::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    fn parse_line(line: &str) -> Result<ParsedEntry, String> {
        let (raw_id, display) = match line.find([';', ',', '\t']) {
            Some(at) => (&line[..at], Some(line[at + 1..].trim())),
            None => (line, None),
        };
        let display_name = display.filter(|d| !d.is_empty()).map(str::to_string);

        let ident = last_path_segment(raw_id.trim());
        if ident.is_empty() {
            return Err("empty identifier".to_string());
        }

        if let Some(id) = parse_numeric(ident) {
            return Ok(ParsedEntry {
                numeric_id: Some(id),
                screen_name: None,
                display_name,
            });
        }

        let valid = ident
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
        if !valid {
            return Err(format!("'{ident}' is not a community identifier"));
        }

        Ok(ParsedEntry {
            numeric_id: None,
            screen_name: Some(ident.to_string()),
            display_name,
        })
    }
}

fn last_path_segment(raw: &str) -> &str {
    let without_query = raw.split(['?', '#']).next().unwrap_or(raw);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
        .trim_start_matches('@')
}

fn parse_numeric(ident: &str) -> Option<u64> {
    let digits = ID_PREFIXES
        .iter()
        .find_map(|prefix| ident.strip_prefix(prefix))
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(ident);
    let digits = digits.strip_prefix('-').unwrap_or(digits);
    digits.parse::<u64>().ok().filter(|id| *id > 0)
}

impl EntryParser for LineEntryParser {
    fn parse(&self, bytes: &[u8], encoding: EncodingHint) -> ParsedFile {
        let text = match Self::decode(bytes, encoding) {
            Ok(text) => text,
            Err(message) => {
                return ParsedFile {
                    entries: Vec::new(),
                    errors: vec![message],
                };
            }
        };

        let mut parsed = ParsedFile::default();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Self::parse_line(line) {
                Ok(entry) => parsed.entries.push(entry),
                Err(reason) => parsed.errors.push(format!("line {}: {reason}", index + 1)),
            }
        }
        parsed
    }
}
