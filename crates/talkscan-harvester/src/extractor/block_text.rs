//! Line-based reading of a content block's rendered text.

use std::sync::LazyLock;

use regex::Regex;

use crate::platform::NoiseLines;

static TIME_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)^(
            \d+\s*(秒|分鐘|分钟|小時|小时|天|日|週|周|個月|个月|年|s|m|h|d|w|y|mins?|hrs?|days?|wks?|weeks?)(前|\s+ago)?
            | 剛剛 | 刚刚 | 今天 | 昨天 | just\ now | yesterday
            | \d{4}年\d{1,2}月\d{1,2}日
            | \d{1,2}月\d{1,2}日
            | \d{4}[-/]\d{1,2}[-/]\d{1,2}
        )(\s+\d{1,2}:\d{2})?$",
    )
    .expect("valid time token regex")
});

/// Author, body and time text recovered from free text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BlockText {
    pub author: String,
    pub body: String,
    pub time_text: Option<String>,
}

/// Whether `line` reads as a bare relative or calendar time.
pub(crate) fn is_time_line(line: &str) -> bool {
    TIME_TOKEN.is_match(line.trim())
}

/// Split a block's text into author, body and time.
///
/// Badge lines are dropped, and so are metadata lines made up only of action
/// words, counters and time tokens ("2天 讚 回覆", "Like · Reply · 3d"). The
/// first time token seen is kept as `time_text`. With `known_author`, the
/// matching line is removed and everything else is body; without it, the
/// first remaining line is the author when more than one line remains.
pub(crate) fn split_block_text(
    text: &str,
    noise: NoiseLines,
    known_author: Option<&str>,
) -> BlockText {
    let mut time_text = None;
    let mut lines: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if is_badge(line, noise) {
            continue;
        }
        if let Some(found) = metadata_line(line, noise) {
            if time_text.is_none() {
                time_text = found;
            }
            continue;
        }
        lines.push(line);
    }

    let known_author = known_author.map(str::trim).filter(|a| !a.is_empty());
    let (author, body_lines) = match known_author {
        Some(author) => {
            if let Some(pos) = lines.iter().position(|l| *l == author) {
                lines.remove(pos);
            }
            (author.to_string(), lines)
        }
        None if lines.len() > 1 => (lines[0].to_string(), lines.split_off(1)),
        None => (String::new(), lines),
    };

    BlockText {
        author,
        body: body_lines.join("\n"),
        time_text,
    }
}

fn is_badge(line: &str, noise: NoiseLines) -> bool {
    noise.badges.contains(&line) || noise.badge_suffixes.iter().any(|s| line.ends_with(s))
}

/// `Some(time)` when the whole line is metadata, carrying the time token if
/// the line had one. `None` when the line is content.
fn metadata_line(line: &str, noise: NoiseLines) -> Option<Option<String>> {
    if noise.trailers.contains(&line) {
        return Some(None);
    }
    if is_time_line(line) {
        return Some(Some(line.to_string()));
    }

    let tokens: Vec<&str> = line
        .split(|c: char| c.is_whitespace() || c == '·' || c == '•')
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 2 {
        return None;
    }

    let mut time = None;
    for token in &tokens {
        if is_time_line(token) {
            time.get_or_insert_with(|| (*token).to_string());
        } else if !noise.trailers.contains(token) && !token.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }
    Some(time)
}
