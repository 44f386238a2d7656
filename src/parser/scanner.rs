//! Scanner for `@` reference tokens embedded in template text

/// Byte range in template text
pub type Span = std::ops::Range<usize>;

/// A reference token span, leading `@` included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

impl TokenSpan {
    pub fn span(&self) -> Span {
        self.start..self.end
    }

    /// The token text, `@` included
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

/// Scan a template for reference tokens.
///
/// A token starts at `@` and runs until the next `@` or whitespace at zero
/// bracket/brace depth outside quotes, so a token's argument list may itself
/// contain structured syntax: `[...]` and `{...}` spans keep the token open
/// across whitespace, and `"..."`/`'...'` quote spans support `\`-escaping
/// of the quote character. Unterminated spans run to the end of the input.
///
/// Identical input always yields identical spans.
pub fn scan(source: &str) -> Vec<TokenSpan> {
    let mut tokens = Vec::new();
    let mut from = 0;
    while let Some(found) = source[from..].find('@') {
        let start = from + found;
        let end = token_end(source, start);
        tokens.push(TokenSpan { start, end });
        from = end;
    }
    tokens
}

fn token_end(source: &str, start: usize) -> usize {
    let mut brackets = 0usize;
    let mut braces = 0usize;
    let mut quote: Option<char> = None;
    let mut prev = '\0';
    for (offset, ch) in source[start + 1..].char_indices() {
        if let Some(open) = quote {
            if ch == open && prev != '\\' {
                quote = None;
            }
        } else {
            match ch {
                '"' | '\'' => quote = Some(ch),
                '[' => brackets += 1,
                ']' => brackets = brackets.saturating_sub(1),
                '{' => braces += 1,
                '}' => braces = braces.saturating_sub(1),
                _ if (ch == '@' || ch.is_whitespace()) && brackets == 0 && braces == 0 => {
                    return start + 1 + offset;
                }
                _ => {}
            }
        }
        prev = ch;
    }
    source.len()
}
