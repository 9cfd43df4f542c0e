//! # SQL Tokens
//!
//! Token and keyword definitions for the lexer. Keyword lookup goes through
//! a compile-time perfect hash map (`phf`), keyed by the uppercased
//! identifier, so recognition is O(1) and case-insensitive.

use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Create,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Delete,
    Update,
    Set,
    And,
    Or,
    Not,
    Null,
    Integer,
    Varchar,
}

pub static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "CREATE" => Keyword::Create,
    "TABLE" => Keyword::Table,
    "INSERT" => Keyword::Insert,
    "INTO" => Keyword::Into,
    "VALUES" => Keyword::Values,
    "SELECT" => Keyword::Select,
    "FROM" => Keyword::From,
    "WHERE" => Keyword::Where,
    "DELETE" => Keyword::Delete,
    "UPDATE" => Keyword::Update,
    "SET" => Keyword::Set,
    "AND" => Keyword::And,
    "OR" => Keyword::Or,
    "NOT" => Keyword::Not,
    "NULL" => Keyword::Null,
    "INTEGER" => Keyword::Integer,
    "VARCHAR" => Keyword::Varchar,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Keyword(Keyword),
    /// Unquoted identifier, original casing preserved.
    Ident(String),
    /// Integer literal. Wider than i32 so the parser can apply unary minus
    /// before range-checking.
    IntegerLiteral(i64),
    /// Single-quoted string literal, quotes stripped, `''` unescaped.
    StringLiteral(String),
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Semicolon,
    Star,
    Minus,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Keyword(k) => write!(f, "{k:?}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::IntegerLiteral(v) => write!(f, "{v}"),
            Token::StringLiteral(s) => write!(f, "'{s}'"),
            Token::Eq => write!(f, "="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::GtEq => write!(f, ">="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Semicolon => write!(f, ";"),
            Token::Star => write!(f, "*"),
            Token::Minus => write!(f, "-"),
            Token::Eof => write!(f, "<eof>"),
        }
    }
}
