use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Alternation order matters: markup wins over words, the final `.` catches
    // a stray `<` or `&`, so every byte of the input lands in some token.
    static ref RE: Regex = Regex::new(
        r"(?u)(?P<markup>(?s:<!--.*?-->)|</?[A-Za-z][^<>]*>|&#?\w+;)|(?P<word>[\p{L}\p{N}][\p{L}\p{N}_']*)|(?P<space>[^\p{L}\p{N}<&]+|(?s:.))"
    )
    .expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    /// Whitespace and punctuation between words.
    Space,
    /// HTML/XML tags, comments and entities.
    Markup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    text: String,
    kind: TokenKind,
}

impl Token {
    pub fn text(&self) -> &str { &self.text }
    pub fn into_text(self) -> String { self.text }
    pub fn kind(&self) -> TokenKind { self.kind }
    pub fn is_space(&self) -> bool { self.kind == TokenKind::Space }
    pub fn is_markup(&self) -> bool { self.kind == TokenKind::Markup }
}

/// Lazily splits one text into classified tokens.
///
/// The text is NFKC-normalized and lowercased up front. A tokenizer owns its
/// session; create one per indexing or query call instead of sharing it.
#[derive(Debug, Default)]
pub struct Tokenizer {
    buffer: String,
    pos: usize,
}

impl Tokenizer {
    pub fn new(text: &str) -> Self {
        let mut tokenizer = Self::default();
        tokenizer.set_text(text);
        tokenizer
    }

    /// Start a new session over `text`, discarding any unread tokens.
    pub fn set_text(&mut self, text: &str) {
        self.buffer = text.nfkc().collect::<String>().to_lowercase();
        self.pos = 0;
    }

    pub fn has_next(&self) -> bool {
        self.pos < self.buffer.len()
    }
}

impl Iterator for Tokenizer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if !self.has_next() {
            return None;
        }
        let caps = RE.captures_at(&self.buffer, self.pos)?;
        let whole = caps.get(0)?;
        self.pos = whole.end();
        let kind = if caps.name("markup").is_some() {
            TokenKind::Markup
        } else if caps.name("word").is_some() {
            TokenKind::Word
        } else {
            TokenKind::Space
        };
        Some(Token { text: whole.as_str().to_string(), kind })
    }
}

/// Convenience: the word tokens of `text`, in order, duplicates kept.
pub fn terms(text: &str) -> Vec<String> {
    Tokenizer::new(text)
        .filter(|t| !t.is_space() && !t.is_markup())
        .map(Token::into_text)
        .collect()
}
