//! # SQL Parser
//!
//! Recursive descent over the token stream, one statement per parse. The
//! leading keyword selects the production; expressions use precedence
//! climbing (`OR` < `AND` < `NOT` < comparisons).
//!
//! ## Grammar
//!
//! ```text
//! statement    := create_table | insert | select | delete | update
//! create_table := CREATE TABLE ident '(' column_def (',' column_def)* ')'
//! column_def   := ident (INTEGER | VARCHAR '(' int ')') [NOT NULL]
//! insert       := INSERT INTO ident ['(' ident_list ')'] VALUES '(' expr_list ')'
//! select       := SELECT ('*' | ident_list) FROM ident [WHERE expr]
//! delete       := DELETE FROM ident [WHERE expr]
//! update       := UPDATE ident SET ident '=' expr (',' ident '=' expr)* [WHERE expr]
//! expr         := or_expr
//! or_expr      := and_expr (OR and_expr)*
//! and_expr     := not_expr (AND not_expr)*
//! not_expr     := NOT not_expr | comparison
//! comparison   := primary [('=' | '!=' | '<' | '<=' | '>' | '>=') primary]
//! primary      := int | '-' int | string | NULL | ident | '(' expr ')'
//! ```
//!
//! A trailing semicolon is accepted and ignored; trailing garbage is an
//! error.

use eyre::{bail, ensure, Result};

use crate::records::{ColumnType, Value};

use super::ast::{
    BinaryOp, ColumnSpec, CreateTableStmt, DeleteStmt, Expr, InsertStmt, Projection, SelectStmt,
    Statement, UpdateStmt,
};
use super::token::{Keyword, Token};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Statement> {
        let statement = match self.peek() {
            Token::Keyword(Keyword::Create) => self.parse_create_table()?,
            Token::Keyword(Keyword::Insert) => self.parse_insert()?,
            Token::Keyword(Keyword::Select) => self.parse_select()?,
            Token::Keyword(Keyword::Delete) => self.parse_delete()?,
            Token::Keyword(Keyword::Update) => self.parse_update()?,
            other => bail!("expected a statement, found {other}"),
        };

        if *self.peek() == Token::Semicolon {
            self.bump();
        }
        ensure!(
            *self.peek() == Token::Eof,
            "unexpected input after statement: {}",
            self.peek()
        );

        Ok(statement)
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        let token = self.bump();
        ensure!(token == expected, "expected {expected}, found {token}");
        Ok(())
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        self.expect(Token::Keyword(keyword))
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Token::Ident(name) => Ok(name),
            other => bail!("expected an identifier, found {other}"),
        }
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Create)?;
        self.expect_keyword(Keyword::Table)?;
        let table = self.expect_ident()?;
        self.expect(Token::LParen)?;

        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            match self.bump() {
                Token::Comma => continue,
                Token::RParen => break,
                other => bail!("expected ',' or ')' in column list, found {other}"),
            }
        }
        ensure!(!columns.is_empty(), "a table needs at least one column");

        Ok(Statement::CreateTable(CreateTableStmt { table, columns }))
    }

    fn parse_column_def(&mut self) -> Result<ColumnSpec> {
        let name = self.expect_ident()?;

        let (column_type, max_length) = match self.bump() {
            Token::Keyword(Keyword::Integer) => (ColumnType::Integer, 0),
            Token::Keyword(Keyword::Varchar) => {
                self.expect(Token::LParen)?;
                let len = match self.bump() {
                    Token::IntegerLiteral(v) if v > 0 && v <= u32::MAX as i64 => v as u32,
                    other => bail!("expected a positive VARCHAR length, found {other}"),
                };
                self.expect(Token::RParen)?;
                (ColumnType::Varchar, len)
            }
            other => bail!("expected a column type, found {other}"),
        };

        let not_null = if *self.peek() == Token::Keyword(Keyword::Not) {
            self.bump();
            self.expect_keyword(Keyword::Null)?;
            true
        } else {
            false
        };

        Ok(ColumnSpec {
            name,
            column_type,
            max_length,
            not_null,
        })
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Insert)?;
        self.expect_keyword(Keyword::Into)?;
        let table = self.expect_ident()?;

        let columns = if *self.peek() == Token::LParen {
            self.bump();
            let mut names = Vec::new();
            loop {
                names.push(self.expect_ident()?);
                match self.bump() {
                    Token::Comma => continue,
                    Token::RParen => break,
                    other => bail!("expected ',' or ')' in column list, found {other}"),
                }
            }
            Some(names)
        } else {
            None
        };

        self.expect_keyword(Keyword::Values)?;
        self.expect(Token::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_expr()?);
            match self.bump() {
                Token::Comma => continue,
                Token::RParen => break,
                other => bail!("expected ',' or ')' in value list, found {other}"),
            }
        }

        Ok(Statement::Insert(InsertStmt {
            table,
            columns,
            values,
        }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Select)?;

        let projection = if *self.peek() == Token::Star {
            self.bump();
            Projection::All
        } else {
            let mut names = vec![self.expect_ident()?];
            while *self.peek() == Token::Comma {
                self.bump();
                names.push(self.expect_ident()?);
            }
            Projection::Columns(names)
        };

        self.expect_keyword(Keyword::From)?;
        let table = self.expect_ident()?;
        let filter = self.parse_optional_where()?;

        Ok(Statement::Select(SelectStmt {
            table,
            projection,
            filter,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Delete)?;
        self.expect_keyword(Keyword::From)?;
        let table = self.expect_ident()?;
        let filter = self.parse_optional_where()?;

        Ok(Statement::Delete(DeleteStmt { table, filter }))
    }

    fn parse_update(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Update)?;
        let table = self.expect_ident()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = Vec::new();
        loop {
            let column = self.expect_ident()?;
            self.expect(Token::Eq)?;
            assignments.push((column, self.parse_expr()?));
            if *self.peek() == Token::Comma {
                self.bump();
                continue;
            }
            break;
        }

        let filter = self.parse_optional_where()?;

        Ok(Statement::Update(UpdateStmt {
            table,
            assignments,
            filter,
        }))
    }

    fn parse_optional_where(&mut self) -> Result<Option<Expr>> {
        if *self.peek() == Token::Keyword(Keyword::Where) {
            self.bump();
            Ok(Some(self.parse_expr()?))
        } else {
            Ok(None)
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while *self.peek() == Token::Keyword(Keyword::Or) {
            self.bump();
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while *self.peek() == Token::Keyword(Keyword::And) {
            self.bump();
            let right = self.parse_not()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if *self.peek() == Token::Keyword(Keyword::Not) {
            self.bump();
            return Ok(Expr::Not(Box::new(self.parse_not()?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_primary()?;

        let op = match self.peek() {
            Token::Eq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::LtEq => BinaryOp::LtEq,
            Token::Gt => BinaryOp::Gt,
            Token::GtEq => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.bump();

        let right = self.parse_primary()?;
        Ok(Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn integer_literal(&mut self, raw: i64, negative: bool) -> Result<Expr> {
        let value = if negative { -raw } else { raw };
        ensure!(
            i32::try_from(value).is_ok(),
            "integer literal {value} is out of INTEGER range"
        );
        Ok(Expr::Literal(Value::Integer(value as i32)))
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.bump() {
            Token::IntegerLiteral(v) => self.integer_literal(v, false),
            Token::Minus => match self.bump() {
                Token::IntegerLiteral(v) => self.integer_literal(v, true),
                other => bail!("expected an integer after '-', found {other}"),
            },
            Token::StringLiteral(s) => Ok(Expr::Literal(Value::Varchar(s))),
            Token::Keyword(Keyword::Null) => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => Ok(Expr::Column(name)),
            Token::LParen => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            other => bail!("expected an expression, found {other}"),
        }
    }
}
