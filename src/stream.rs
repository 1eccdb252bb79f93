//! Textual form of tables and sets.
//!
//! A table is written as its entry count followed by a parenthesized list
//! with one `key value` pair per line:
//!
//! ```text
//! 2
//! (
//! alpha 1
//! "two words" 2
//! )
//! ```
//!
//! An empty table is written as `0()`. Sets use the same layout with one key
//! per line.
//!
//! When reading, the leading count is optional, pairs may be written on one
//! line or wrapped in their own parentheses (`(alpha 1)`), and `//` starts a
//! comment that runs to the end of the line. Keys and values are parsed with
//! [`FromStr`]; tokens containing whitespace, parentheses or quotes are
//! double-quoted, with `\"` and `\\` as escapes.

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt::Display;
use core::fmt::Write;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::str::FromStr;

use crate::hash_set::HashSet;
use crate::hash_table::HashTable;
use crate::hash_table::MAX_TABLE_SIZE;

/// Errors produced while reading the textual form of a table or set.
///
/// Offsets are byte offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The input ended before the closing parenthesis.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd {
        /// Offset of the end of input
        offset: usize,
    },
    /// A token appeared where something else was expected.
    #[error("unexpected token `{token}` at offset {offset}, expected {expected}")]
    UnexpectedToken {
        /// Offset of the token
        offset: usize,
        /// The offending token
        token: String,
        /// What the reader was looking for
        expected: &'static str,
    },
    /// A quoted token was not closed.
    #[error("unterminated quoted string starting at offset {offset}")]
    UnterminatedString {
        /// Offset of the opening quote
        offset: usize,
    },
    /// The leading count is not a non-negative integer.
    #[error("invalid entry count `{token}` at offset {offset}")]
    InvalidCount {
        /// Offset of the count
        offset: usize,
        /// The offending token
        token: String,
    },
    /// A key token could not be parsed into the key type.
    #[error("invalid key `{token}` at offset {offset}")]
    InvalidKey {
        /// Offset of the key
        offset: usize,
        /// The offending token
        token: String,
    },
    /// A value token could not be parsed into the value type.
    #[error("invalid value `{token}` at offset {offset}")]
    InvalidValue {
        /// Offset of the value
        offset: usize,
        /// The offending token
        token: String,
    },
    /// The leading count disagrees with the number of entries read.
    #[error("declared {declared} entries but read {found}")]
    CountMismatch {
        /// Count written before the list
        declared: usize,
        /// Number of entries in the list
        found: usize,
    },
    /// Tokens follow the closing parenthesis.
    #[error("trailing input `{token}` at offset {offset}")]
    TrailingInput {
        /// Offset of the first trailing token
        offset: usize,
        /// The first trailing token
        token: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind<'a> {
    Open,
    Close,
    Word(Cow<'a, str>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token<'a> {
    offset: usize,
    kind: TokenKind<'a>,
}

impl Token<'_> {
    fn text(&self) -> String {
        match &self.kind {
            TokenKind::Open => "(".to_string(),
            TokenKind::Close => ")".to_string(),
            TokenKind::Word(word) => word.to_string(),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken {
            offset: self.offset,
            token: self.text(),
            expected,
        }
    }
}

struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_blank(&mut self) {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else {
                return;
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token<'a>>, ParseError> {
        self.skip_blank();

        let offset = self.pos;
        let rest = self.rest();
        let Some(first) = rest.chars().next() else {
            return Ok(None);
        };

        let kind = match first {
            '(' => {
                self.pos += 1;
                TokenKind::Open
            }
            ')' => {
                self.pos += 1;
                TokenKind::Close
            }
            '"' => TokenKind::Word(Cow::Owned(self.quoted(offset)?)),
            _ => {
                let len = rest
                    .find(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '"'))
                    .unwrap_or(rest.len());
                self.pos += len;
                TokenKind::Word(Cow::Borrowed(&rest[..len]))
            }
        };

        Ok(Some(Token { offset, kind }))
    }

    /// Reads a double-quoted token starting at `offset`, resolving escapes.
    fn quoted(&mut self, offset: usize) -> Result<String, ParseError> {
        let input = self.input;
        let mut text = String::new();
        let mut chars = input[offset + 1..].char_indices();

        while let Some((index, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos = offset + 1 + index + 1;
                    return Ok(text);
                }
                '\\' => match chars.next() {
                    Some((_, escaped @ ('"' | '\\'))) => text.push(escaped),
                    Some((_, other)) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => break,
                },
                _ => text.push(c),
            }
        }

        Err(ParseError::UnterminatedString { offset })
    }

    fn expect_token(&mut self) -> Result<Token<'a>, ParseError> {
        match self.next_token()? {
            Some(token) => Ok(token),
            None => Err(ParseError::UnexpectedEnd {
                offset: self.input.len(),
            }),
        }
    }

    fn expect_word(&mut self, expected: &'static str) -> Result<(usize, Cow<'a, str>), ParseError> {
        let token = self.expect_token()?;
        match token.kind {
            TokenKind::Word(word) => Ok((token.offset, word)),
            _ => Err(token.unexpected(expected)),
        }
    }

    fn expect_close(&mut self) -> Result<(), ParseError> {
        let token = self.expect_token()?;
        match token.kind {
            TokenKind::Close => Ok(()),
            _ => Err(token.unexpected("`)`")),
        }
    }

    /// Reads an optional count and the opening parenthesis.
    fn open_list(&mut self) -> Result<Option<usize>, ParseError> {
        let token = self.expect_token()?;
        match token.kind {
            TokenKind::Open => Ok(None),
            TokenKind::Close => Err(token.unexpected("entry count or `(`")),
            TokenKind::Word(word) => {
                let count = word.parse::<usize>().map_err(|_| ParseError::InvalidCount {
                    offset: token.offset,
                    token: word.to_string(),
                })?;

                let open = self.expect_token()?;
                match open.kind {
                    TokenKind::Open => Ok(Some(count)),
                    _ => Err(open.unexpected("`(`")),
                }
            }
        }
    }

    fn finish(&mut self, declared: Option<usize>, found: usize) -> Result<(), ParseError> {
        if let Some(token) = self.next_token()? {
            return Err(ParseError::TrailingInput {
                offset: token.offset,
                token: token.text(),
            });
        }

        match declared {
            Some(declared) if declared != found => {
                Err(ParseError::CountMismatch { declared, found })
            }
            _ => Ok(()),
        }
    }
}

fn parse_word<T: FromStr>(
    (offset, word): (usize, Cow<'_, str>),
    invalid: fn(usize, String) -> ParseError,
) -> Result<T, ParseError> {
    word.parse::<T>()
        .map_err(|_| invalid(offset, word.into_owned()))
}

fn invalid_key(offset: usize, token: String) -> ParseError {
    ParseError::InvalidKey { offset, token }
}

fn invalid_value(offset: usize, token: String) -> ParseError {
    ParseError::InvalidValue { offset, token }
}

/// Parses the full pair list into memory so a malformed input leaves the
/// destination untouched.
fn parse_pairs<K, V>(input: &str) -> Result<Vec<(K, V)>, ParseError>
where
    K: FromStr,
    V: FromStr,
{
    let mut tokens = Tokenizer::new(input);
    let declared = tokens.open_list()?;
    let mut pairs = Vec::with_capacity(declared.unwrap_or(0).min(1024));

    loop {
        let token = tokens.expect_token()?;
        let (key, grouped) = match token.kind {
            TokenKind::Close => break,
            TokenKind::Open => (tokens.expect_word("key")?, true),
            TokenKind::Word(word) => ((token.offset, word), false),
        };

        let key = parse_word::<K>(key, invalid_key)?;
        let value = parse_word::<V>(tokens.expect_word("value")?, invalid_value)?;
        if grouped {
            tokens.expect_close()?;
        }
        pairs.push((key, value));
    }

    tokens.finish(declared, pairs.len())?;
    Ok(pairs)
}

fn parse_keys<K: FromStr>(input: &str) -> Result<Vec<K>, ParseError> {
    let mut tokens = Tokenizer::new(input);
    let declared = tokens.open_list()?;
    let mut keys = Vec::with_capacity(declared.unwrap_or(0).min(1024));

    loop {
        let token = tokens.expect_token()?;
        match token.kind {
            TokenKind::Close => break,
            TokenKind::Open => return Err(token.unexpected("key or `)`")),
            TokenKind::Word(word) => keys.push(parse_word::<K>((token.offset, word), invalid_key)?),
        }
    }

    tokens.finish(declared, keys.len())?;
    Ok(keys)
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.contains("//")
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | '\\'))
}

/// Writes the display form of `item` as a single token.
fn write_token<W: Write, T: Display + ?Sized>(out: &mut W, item: &T) -> core::fmt::Result {
    let text = item.to_string();
    if !needs_quotes(&text) {
        return out.write_str(&text);
    }

    out.write_char('"')?;
    for c in text.chars() {
        if matches!(c, '"' | '\\') {
            out.write_char('\\')?;
        }
        out.write_char(c)?;
    }
    out.write_char('"')
}

impl<K, V, S> Display for HashTable<K, V, S>
where
    K: Display,
    V: Display,
{
    /// Writes the table in its textual pair-list form.
    ///
    /// Entries appear in iteration order.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return f.write_str("0()");
        }

        writeln!(f, "{}", self.len())?;
        writeln!(f, "(")?;
        for (key, value) in self.iter() {
            write_token(f, key)?;
            f.write_char(' ')?;
            write_token(f, value)?;
            f.write_char('\n')?;
        }
        f.write_char(')')
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Hash + Eq + FromStr,
    V: FromStr,
    S: BuildHasher,
{
    /// Reads a textual pair list into this table with [`set`] semantics.
    ///
    /// Returns the number of pairs read. On error the table is unchanged.
    ///
    /// [`set`]: HashTable::set
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<String, i32> = HashTable::new();
    /// table.set("a".to_string(), 0);
    ///
    /// assert_eq!(table.read_into("(a 1 b 2)"), Ok(2));
    /// assert_eq!(table["a"], 1);
    /// assert_eq!(table["b"], 2);
    /// # }
    /// ```
    pub fn read_into(&mut self, input: &str) -> Result<usize, ParseError> {
        let pairs = parse_pairs::<K, V>(input)?;
        let count = pairs.len();
        self.extend(pairs);
        Ok(count)
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Hash + Eq + FromStr,
    V: FromStr,
    S: BuildHasher + Default,
{
    /// Builds a table from its textual pair-list form.
    ///
    /// The table is sized for the entries read. Repeated keys keep the last
    /// value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let table: HashTable<String, f64> = HashTable::read_from(
    ///     "2 // entries\n( \"inlet patch\" 1.5 (outlet 2) )",
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(table["inlet patch"], 1.5);
    /// assert_eq!(table["outlet"], 2.0);
    /// # }
    /// ```
    pub fn read_from(input: &str) -> Result<Self, ParseError> {
        let pairs = parse_pairs::<K, V>(input)?;
        let mut table = Self::with_capacity(pairs.len().saturating_mul(2).min(MAX_TABLE_SIZE));
        table.extend(pairs);
        Ok(table)
    }
}

impl<K, V, S> FromStr for HashTable<K, V, S>
where
    K: Hash + Eq + FromStr,
    V: FromStr,
    S: BuildHasher + Default,
{
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, ParseError> {
        Self::read_from(input)
    }
}

impl<K, S> Display for HashSet<K, S>
where
    K: Display,
{
    /// Writes the set as a count followed by a parenthesized key list.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return f.write_str("0()");
        }

        writeln!(f, "{}", self.len())?;
        writeln!(f, "(")?;
        for key in self.iter() {
            write_token(f, key)?;
            f.write_char('\n')?;
        }
        f.write_char(')')
    }
}

impl<K, S> FromStr for HashSet<K, S>
where
    K: Hash + Eq + FromStr,
    S: BuildHasher + Default,
{
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, ParseError> {
        let keys = parse_keys::<K>(input)?;
        let mut set = Self::with_capacity(keys.len().saturating_mul(2).min(MAX_TABLE_SIZE));
        set.extend(keys);
        Ok(set)
    }
}
