fn is_handle_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Usernames mentioned in a caption, lowercased, in first-appearance order
/// and without duplicates. An `@` glued to a preceding word (an email
/// address) is not a mention.
pub fn parse_mentions(caption: &str) -> Vec<String> {
    let mut mentions: Vec<String> = Vec::new();
    let mut prev: Option<char> = None;
    let mut chars = caption.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        let starts_mention = c == '@' && !prev.is_some_and(is_handle_char);
        prev = Some(c);
        if !starts_mention {
            continue;
        }

        let start = idx + c.len_utf8();
        let mut end = start;
        while let Some(&(i, next)) = chars.peek() {
            if !is_handle_char(next) {
                break;
            }
            end = i + next.len_utf8();
            prev = Some(next);
            chars.next();
        }

        if end > start {
            let handle = caption[start..end].to_ascii_lowercase();
            if !mentions.contains(&handle) {
                mentions.push(handle);
            }
        }
    }

    mentions
}
