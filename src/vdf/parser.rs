//! Recursive-descent VDF parser building a mutable, ordered key-value [`Tree`].
//!
//! Builds a real nested mapping rather than a flat, scan-once token list,
//! since this crate must mutate and write config trees back out, not just
//! read them.

use super::scanner::{Scanner, Token, TokenType};
use super::{Tree, Value};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lexing error: {0}")]
    Scan(#[from] super::scanner::Error),
    #[error("unexpected \"{{\" with no preceding key")]
    BraceWithNoKey,
    #[error("unmatched \"}}\"")]
    UnmatchedBraceRight,
    #[error("expected a value or \"{{\" after key \"{0}\"")]
    ExpectedValueAfterKey(String),
    #[error("trailing \"{{\" was never closed")]
    UnterminatedBlock,
    #[error("VDF text is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

fn unquote(lexeme: &[u8]) -> Result<String, Error> {
    let inner = if lexeme.first() == Some(&b'"') && lexeme.len() >= 2 {
        &lexeme[1..lexeme.len() - 1]
    } else {
        lexeme
    };
    let mut out = Vec::with_capacity(inner.len());
    let mut bytes = inner.iter().copied();
    while let Some(b) = bytes.next() {
        if b == b'\\' {
            match bytes.next() {
                Some(b'n') => out.push(b'\n'),
                Some(b't') => out.push(b'\t'),
                Some(other) => out.push(other),
                None => out.push(b'\\'),
            }
        } else {
            out.push(b);
        }
    }
    Ok(std::str::from_utf8(&out)?.to_owned())
}

fn parse_block<'a>(
    tokens: &mut impl Iterator<Item = Result<Token<'a>, super::scanner::Error>>,
    in_brace: bool,
) -> Result<Tree, Error> {
    let mut tree = Tree::new();
    loop {
        let Some(head) = tokens.next().transpose()? else {
            if in_brace {
                return Err(Error::UnterminatedBlock);
            }
            return Ok(tree);
        };
        match head.r#type {
            TokenType::BraceRight => {
                if in_brace {
                    return Ok(tree);
                }
                return Err(Error::UnmatchedBraceRight);
            }
            TokenType::BraceLeft => return Err(Error::BraceWithNoKey),
            TokenType::String => {
                let key = unquote(head.lexeme)?;
                let Some(value_tok) = tokens.next().transpose()? else {
                    return Err(Error::ExpectedValueAfterKey(key));
                };
                let value = match value_tok.r#type {
                    TokenType::String => Value::Str(unquote(value_tok.lexeme)?),
                    TokenType::BraceLeft => Value::Map(parse_block(tokens, true)?),
                    TokenType::BraceRight => return Err(Error::UnmatchedBraceRight),
                };
                // last-writer-wins on duplicate keys, matching the client's own tolerance
                tree.insert(key, value);
            }
        }
    }
}

pub fn parse(source: &[u8]) -> Result<Tree, Error> {
    let mut tokens = Scanner::new(source);
    parse_block(&mut tokens, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_pairs() {
        let tree = parse(br#""AutoLoginUser" "alice""#).unwrap();
        assert_eq!(tree.get("AutoLoginUser"), Some(&Value::Str("alice".into())));
    }

    #[test]
    fn parses_nested_maps() {
        let tree = parse(
            br#"
            "InstallConfigStore"
            {
                "Software"
                {
                    "Valve" { "Steam" { "AutoLoginUser" "bob" } }
                }
            }
            "#,
        )
        .unwrap();
        let Value::Map(a) = tree.get("InstallConfigStore").unwrap() else {
            panic!("expected map")
        };
        let Value::Map(b) = a.get("Software").unwrap() else {
            panic!("expected map")
        };
        let Value::Map(c) = b.get("Valve").unwrap() else {
            panic!("expected map")
        };
        let Value::Map(d) = c.get("Steam").unwrap() else {
            panic!("expected map")
        };
        assert_eq!(d.get("AutoLoginUser"), Some(&Value::Str("bob".into())));
    }

    #[test]
    fn rejects_unmatched_brace() {
        assert!(matches!(
            parse(br#""A" { "B" "C""#),
            Err(Error::UnterminatedBlock)
        ));
    }
}
