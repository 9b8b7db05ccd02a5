//! Zone file parsing
//!
//! Only the subset the registry uses: `$ORIGIN`, `$TTL` and URI records
//! pointing at profile documents.
//!
//! ```text
//! $ORIGIN alice.id
//! $TTL 3600
//! _http._tcp IN URI 10 1 "https://gaia.example/hub/1Abc/0/profile.json"
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneFileError {
    #[error("Zone file is empty")]
    Empty,
    #[error("Invalid record on line {line}: {reason}")]
    InvalidRecord { line: usize, reason: String },
}

/// One URI record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriRecord {
    pub name: String,
    pub ttl: Option<u32>,
    pub priority: u16,
    pub weight: u16,
    pub target: String,
}

/// Parsed zone file
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneFile {
    pub origin: Option<String>,
    pub ttl: Option<u32>,
    pub uris: Vec<UriRecord>,
}

impl ZoneFile {
    /// Profile location with the lowest priority value.
    ///
    /// Targets published without a scheme are fetched over https.
    pub fn profile_url(&self) -> Option<String> {
        let target = &self.uris.iter().min_by_key(|r| r.priority)?.target;
        if target.contains("://") {
            Some(target.clone())
        } else {
            Some(format!("https://{}", target))
        }
    }
}

/// Parse a zone file. Record types other than URI are skipped.
pub fn parse_zone_file(text: &str) -> Result<ZoneFile, ZoneFileError> {
    if text.trim().is_empty() {
        return Err(ZoneFileError::Empty);
    }

    let mut zone = ZoneFile::default();
    for (i, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let line_no = i + 1;

        if let Some(rest) = line.strip_prefix("$ORIGIN") {
            zone.origin = Some(rest.trim().to_string());
            continue;
        }
        if let Some(rest) = line.strip_prefix("$TTL") {
            zone.ttl = Some(parse_number(rest.trim(), line_no, "TTL")?);
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(uri_pos) = tokens.iter().position(|t| t.eq_ignore_ascii_case("URI")) else {
            continue;
        };
        zone.uris.push(parse_uri(&tokens, uri_pos, line, line_no)?);
    }
    Ok(zone)
}

/// Minimal zone file pointing `origin` at one profile document
pub fn make_zone_file(origin: &str, profile_url: &str) -> String {
    format!(
        "$ORIGIN {}\n$TTL 3600\n_http._tcp IN URI 10 1 \"{}\"\n",
        origin, profile_url
    )
}

fn parse_uri(
    tokens: &[&str],
    uri_pos: usize,
    line: &str,
    line_no: usize,
) -> Result<UriRecord, ZoneFileError> {
    let invalid = |reason: &str| ZoneFileError::InvalidRecord {
        line: line_no,
        reason: reason.to_string(),
    };

    // Owner name, then optional TTL and class before the type
    let name = tokens
        .first()
        .filter(|_| uri_pos > 0)
        .ok_or_else(|| invalid("missing owner name"))?
        .to_string();
    let ttl = tokens[1..uri_pos]
        .iter()
        .find(|t| t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| parse_number(t, line_no, "TTL"))
        .transpose()?;

    let priority = tokens
        .get(uri_pos + 1)
        .ok_or_else(|| invalid("missing priority"))?;
    let weight = tokens
        .get(uri_pos + 2)
        .ok_or_else(|| invalid("missing weight"))?;

    let start = line.find('"').ok_or_else(|| invalid("missing quoted target"))?;
    let end = line
        .rfind('"')
        .filter(|end| *end > start)
        .ok_or_else(|| invalid("unterminated target"))?;
    let target = line[start + 1..end].to_string();
    if target.is_empty() {
        return Err(invalid("empty target"));
    }

    Ok(UriRecord {
        name,
        ttl,
        priority: parse_number(priority, line_no, "priority")?,
        weight: parse_number(weight, line_no, "weight")?,
        target,
    })
}

fn parse_number<T: std::str::FromStr>(s: &str, line: usize, what: &str) -> Result<T, ZoneFileError> {
    s.parse().map_err(|_| ZoneFileError::InvalidRecord {
        line,
        reason: format!("invalid {}: {}", what, s),
    })
}

/// Drop a `;` comment that is not inside quotes
fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => return &line[..i],
            _ => {}
        }
    }
    line
}
