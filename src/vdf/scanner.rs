//! Byte-level lexer for the VDF key-value text format.

#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    BraceLeft,
    BraceRight,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub r#type: TokenType,
    pub lexeme: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected byte {0:#x}")]
    UnexpectedToken(u8),
    #[error("unterminated quoted string")]
    UnterminatedString,
}

#[derive(Debug, Clone, Copy)]
pub struct Scanner<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
}

impl<'a> Scanner<'a> {
    #[inline]
    pub const fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.source.get(self.current).copied();
        self.current += 1;
        c
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.current).copied()
    }

    fn token(&self, r#type: TokenType) -> Token<'a> {
        Token {
            r#type,
            lexeme: &self.source[self.start..self.current],
        }
    }

    fn skip_line_comment(&mut self) {
        while !matches!(self.peek(), None | Some(b'\n')) {
            self.current += 1;
        }
    }

    fn quoted_string(&mut self) -> Result<Token<'a>, Error> {
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.current += 1;
                    break Ok(self.token(TokenType::String));
                }
                Some(b'\\') => self.current += 2,
                Some(_) => self.current += 1,
                None => break Err(Error::UnterminatedString),
            }
        }
    }

    /// An unquoted run of bytes, terminated by whitespace or a brace.
    /// The client's own files always quote, but bare tokens are accepted
    /// defensively (observed in hand-edited configs in the wild).
    fn bare_string(&mut self) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || c == b'{' || c == b'}' {
                break;
            }
            self.current += 1;
        }
        self.token(TokenType::String)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.start = self.current;
            let head = self.advance()?;
            return Some(match head {
                c if c.is_ascii_whitespace() => continue,
                b'/' if self.peek() == Some(b'/') => {
                    self.skip_line_comment();
                    continue;
                }
                b'"' => self.quoted_string(),
                b'{' => Ok(self.token(TokenType::BraceLeft)),
                b'}' => Ok(self.token(TokenType::BraceRight)),
                _ => Ok(self.bare_string()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(src: &[u8]) -> Vec<Token<'_>> {
        Scanner::new(src).map(Result::unwrap).collect()
    }

    #[test]
    fn scans_quoted_pairs() {
        let toks = scan_all(br#""Key" "Value""#);
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].lexeme, b"\"Key\"");
        assert_eq!(toks[1].lexeme, b"\"Value\"");
    }

    #[test]
    fn scans_nested_braces() {
        let toks = scan_all(br#""A" { "B" "C" }"#);
        assert_eq!(
            toks.iter().map(|t| t.r#type).collect::<Vec<_>>(),
            vec![
                TokenType::String,
                TokenType::BraceLeft,
                TokenType::String,
                TokenType::String,
                TokenType::BraceRight,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        let toks = scan_all(b"\"A\" // trailing comment\n\"B\"");
        assert_eq!(toks.len(), 2);
    }

    #[test]
    fn unterminated_string_errors() {
        let mut s = Scanner::new(br#""oops"#);
        assert_eq!(s.next(), Some(Err(Error::UnterminatedString)));
    }
}
