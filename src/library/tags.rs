use clap::ValueEnum;

/// Maximum number of autocomplete suggestions offered at once.
pub const MAX_SUGGESTIONS: usize = 10;

/// Splits a comma-separated tag string, trimming and dropping empty entries.
pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_tags(tags: &[String]) -> String {
    tags.join(", ")
}

/// Bulk tag edit applied to every selected track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TagOperation {
    /// Append tags the track does not have yet
    Add,
    /// Replace the track's tags entirely
    Replace,
    /// Drop the given tags
    Remove,
    /// Drop all tags
    Clear,
}

impl TagOperation {
    /// New tag string for a track currently tagged `current`.
    pub fn apply(self, current: &str, input: &[String]) -> String {
        let current = split_tags(current);
        let result: Vec<String> = match self {
            TagOperation::Add => {
                let mut merged = current;
                for tag in input {
                    if !merged.contains(tag) {
                        merged.push(tag.clone());
                    }
                }
                merged
            }
            TagOperation::Replace => input.to_vec(),
            TagOperation::Remove => current
                .into_iter()
                .filter(|tag| !input.contains(tag))
                .collect(),
            TagOperation::Clear => Vec::new(),
        };
        join_tags(&result)
    }
}

/// The tag being typed at `cursor` (a char index): everything between the
/// last comma before the cursor and the cursor itself.
pub fn fragment_at(text: &str, cursor: usize) -> &str {
    let before = &text[..byte_index(text, cursor)];
    match before.rfind(',') {
        Some(comma) => before[comma + 1..].trim(),
        None => before.trim(),
    }
}

/// Known tags containing the fragment being typed, case-insensitively.
pub fn suggest_tags(known: &[String], text: &str, cursor: usize) -> Vec<String> {
    let fragment = fragment_at(text, cursor).to_lowercase();
    if fragment.is_empty() {
        return Vec::new();
    }
    known
        .iter()
        .filter(|tag| tag.to_lowercase().contains(&fragment))
        .take(MAX_SUGGESTIONS)
        .cloned()
        .collect()
}

/// Replaces the fragment being typed with `tag`. Returns the new text and
/// the char index just after the inserted tag.
pub fn apply_suggestion(text: &str, cursor: usize, tag: &str) -> (String, usize) {
    let split = byte_index(text, cursor);
    let (before, after) = text.split_at(split);

    let head = match before.rfind(',') {
        Some(comma) => format!("{} {}", &before[..=comma], tag),
        None => tag.to_string(),
    };
    let head = head.trim_start().to_string();
    let new_cursor = head.chars().count();
    let new_text = format!("{}{}", head, after).trim().to_string();
    let new_cursor = new_cursor.min(new_text.chars().count());
    (new_text, new_cursor)
}

fn byte_index(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len())
}
