#![forbid(unsafe_code)]

//! Tag shorthand parsing.
//!
//! Element constructors accept `"div#main.card.wide"`-style tags: an
//! optional element name followed by `#id` and `.class` segments in any
//! order. Malformed input degrades instead of failing: an empty name
//! falls back to `"div"`, empty segments are skipped, and later `#id`
//! segments override earlier ones.

/// Parsed form of a tag shorthand string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedTag {
    /// Element name, never empty.
    pub name: String,
    /// Id from the last non-empty `#` segment.
    pub id: Option<String>,
    /// Classes from `.` segments, in order.
    pub classes: Vec<String>,
}

/// Parse a tag shorthand. Never fails.
#[must_use]
pub fn parse_tag(input: &str) -> ParsedTag {
    let mut name = String::new();
    let mut id = None;
    let mut classes = Vec::new();

    let mut marker = '\0';
    let mut segment = String::new();
    for ch in input.chars() {
        if ch == '#' || ch == '.' {
            commit(marker, &segment, &mut name, &mut id, &mut classes);
            marker = ch;
            segment.clear();
        } else {
            segment.push(ch);
        }
    }
    commit(marker, &segment, &mut name, &mut id, &mut classes);

    if name.is_empty() {
        name.push_str("div");
    }
    ParsedTag { name, id, classes }
}

fn commit(
    marker: char,
    segment: &str,
    name: &mut String,
    id: &mut Option<String>,
    classes: &mut Vec<String>,
) {
    if segment.is_empty() {
        return;
    }
    match marker {
        '#' => *id = Some(segment.to_owned()),
        '.' => classes.push(segment.to_owned()),
        _ => name.push_str(segment),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
