//! # SQL Lexer
//!
//! Single-pass tokenizer over the input string. Identifiers and keywords
//! share a scan; the keyword table decides which is which, case-insensitively.
//!
//! ## Literals
//!
//! - **Integers**: a digit run. Sign is not consumed here; unary minus is
//!   the parser's business, which is why the token carries an `i64`.
//! - **Strings**: single-quoted, with `''` as the escape for a literal
//!   quote. An unterminated string is a lex error.
//!
//! Errors carry the byte position of the offending character.

use eyre::{bail, Result};

use super::token::{Token, KEYWORDS};

pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let start = self.pos;
        let Some(b) = self.bump() else {
            return Ok(Token::Eof);
        };

        match b {
            b'(' => Ok(Token::LParen),
            b')' => Ok(Token::RParen),
            b',' => Ok(Token::Comma),
            b';' => Ok(Token::Semicolon),
            b'*' => Ok(Token::Star),
            b'-' => Ok(Token::Minus),
            b'=' => Ok(Token::Eq),
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Ok(Token::NotEq)
                } else {
                    bail!("unexpected character '!' at byte {start}");
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Ok(Token::LtEq)
                } else {
                    Ok(Token::Lt)
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Ok(Token::GtEq)
                } else {
                    Ok(Token::Gt)
                }
            }
            b'\'' => self.string_literal(start),
            b'0'..=b'9' => self.integer_literal(start),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => Ok(self.ident_or_keyword(start)),
            other => bail!(
                "unexpected character '{}' at byte {start}",
                other as char
            ),
        }
    }

    fn string_literal(&mut self, start: usize) -> Result<Token> {
        let mut bytes = Vec::new();
        loop {
            match self.bump() {
                None => bail!("unterminated string literal starting at byte {start}"),
                Some(b'\'') => {
                    // '' is an escaped quote; anything else ends the string.
                    if self.peek() == Some(b'\'') {
                        self.pos += 1;
                        bytes.push(b'\'');
                    } else {
                        let value = String::from_utf8(bytes).map_err(|_| {
                            eyre::eyre!("string literal at byte {start} is not valid UTF-8")
                        })?;
                        return Ok(Token::StringLiteral(value));
                    }
                }
                Some(b) => bytes.push(b),
            }
        }
    }

    fn integer_literal(&mut self, start: usize) -> Result<Token> {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos]).expect("digits are ascii");
        let value: i64 = text
            .parse()
            .map_err(|_| eyre::eyre!("integer literal '{text}' is out of range"))?;
        Ok(Token::IntegerLiteral(value))
    }

    fn ident_or_keyword(&mut self, start: usize) -> Token {
        while matches!(self.peek(), Some(b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.input[start..self.pos]).expect("ident bytes are ascii");
        match KEYWORDS.get(text.to_ascii_uppercase().as_str()) {
            Some(&keyword) => Token::Keyword(keyword),
            None => Token::Ident(text.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::token::Keyword;

    fn lex(sql: &str) -> Vec<Token> {
        Lexer::new(sql).tokenize().unwrap()
    }

    #[test]
    fn tokenizes_a_select() {
        let tokens = lex("SELECT * FROM users WHERE id = 2;");

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Star,
                Token::Keyword(Keyword::From),
                Token::Ident("users".into()),
                Token::Keyword(Keyword::Where),
                Token::Ident("id".into()),
                Token::Eq,
                Token::IntegerLiteral(2),
                Token::Semicolon,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_case_insensitive_identifiers_are_not() {
        let tokens = lex("select Name from Users");

        assert_eq!(tokens[0], Token::Keyword(Keyword::Select));
        assert_eq!(tokens[1], Token::Ident("Name".into()));
        assert_eq!(tokens[3], Token::Ident("Users".into()));
    }

    #[test]
    fn string_literal_with_escaped_quote() {
        let tokens = lex("'O''Brien'");
        assert_eq!(tokens[0], Token::StringLiteral("O'Brien".into()));
    }

    #[test]
    fn empty_string_literal() {
        let tokens = lex("''");
        assert_eq!(tokens[0], Token::StringLiteral(String::new()));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::new("'oops").tokenize().is_err());
    }

    #[test]
    fn comparison_operators() {
        let tokens = lex("= != < <= > >=");
        assert_eq!(
            tokens,
            vec![
                Token::Eq,
                Token::NotEq,
                Token::Lt,
                Token::LtEq,
                Token::Gt,
                Token::GtEq,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn bare_bang_is_an_error() {
        assert!(Lexer::new("a ! b").tokenize().is_err());
    }

    #[test]
    fn stray_character_is_an_error() {
        assert!(Lexer::new("SELECT @ FROM t").tokenize().is_err());
    }

    #[test]
    fn huge_integer_literal_is_an_error() {
        assert!(Lexer::new("99999999999999999999").tokenize().is_err());
    }

    #[test]
    fn empty_input_is_just_eof() {
        assert_eq!(lex("   "), vec![Token::Eof]);
    }
}
