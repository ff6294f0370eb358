use std::collections::BTreeMap;
use std::iter::Peekable;

use crate::error::{Error, Result};
use crate::sql::parser::ast::Condition;
use crate::sql::parser::lexer::{Keyword, Lexer, Token};
use crate::sql::types::Comparator;

pub mod ast;
mod lexer;

/// Statement parser - converts tokens into an AST
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser {
            lexer: Lexer::new(input).peekable(),
        }
    }

    /// Parses a single statement; the trailing semicolon is optional
    pub fn parse(&mut self) -> Result<ast::Statement> {
        let stmt = self.parse_statement()?;
        self.next_if_token(Token::Semicolon);
        // Nothing allowed after the statement
        if let Some(token) = self.peek()? {
            return Err(Error::Parse(format!("[Parser] Unexpected token {}", token)));
        }
        Ok(stmt)
    }

    fn parse_statement(&mut self) -> Result<ast::Statement> {
        match self.peek()? {
            Some(Token::Keyword(Keyword::Select)) => self.parse_select(),
            Some(Token::Keyword(Keyword::Update)) => self.parse_update(),
            Some(Token::Keyword(Keyword::Insert)) => self.parse_insert(),
            Some(Token::Keyword(Keyword::Delete)) => self.parse_delete(),
            Some(Token::Keyword(Keyword::Save)) => {
                self.next()?;
                Ok(ast::Statement::Save)
            }
            Some(t) => Err(Error::Parse(format!("[Parser] Unexpected token {}", t))),
            None => Err(Error::Parse("[Parser] Unexpected end of input".into())),
        }
    }

    /// SELECT <* | cols> [FROM source] [WHERE cond] [WAIT]
    fn parse_select(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Select))?;

        let columns = if self.next_if_token(Token::Asterisk).is_some() {
            vec!["*".to_string()]
        } else {
            let mut cols = vec![self.next_column()?];
            while self.next_if_token(Token::Comma).is_some() {
                cols.push(self.next_column()?);
            }
            cols
        };

        let source = match self.next_if_token(Token::Keyword(Keyword::From)) {
            Some(_) => self.next_source()?,
            None => String::new(),
        };
        let (where_clause, wait) = self.parse_tail()?;
        Ok(ast::Statement::Select {
            source,
            columns,
            where_clause,
            wait,
        })
    }

    /// UPDATE [source] SET col = value [, ...] [WHERE cond] [WAIT]
    fn parse_update(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Update))?;
        let source = match self.peek()? {
            Some(Token::Keyword(Keyword::Set)) => String::new(),
            _ => self.next_source()?,
        };
        self.next_expect(Token::Keyword(Keyword::Set))?;

        let mut columns = BTreeMap::new();
        loop {
            let col = self.next_column()?;
            self.next_expect(Token::Equal)?;
            let value = self.parse_value()?;
            // Setting the same column twice in one statement is ambiguous
            if columns.contains_key(&col) {
                return Err(Error::Parse(format!(
                    "[Parser] Duplicate column {} for update",
                    col
                )));
            }
            columns.insert(col, value);
            if self.next_if_token(Token::Comma).is_none() {
                break;
            }
        }
        let (where_clause, wait) = self.parse_tail()?;
        Ok(ast::Statement::Update {
            source,
            columns,
            where_clause,
            wait,
        })
    }

    /// INSERT INTO [source] [(cols)] VALUES (values) [WAIT]
    fn parse_insert(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Insert))?;
        self.next_expect(Token::Keyword(Keyword::Into))?;
        let source = match self.peek()? {
            Some(Token::OpenParen) | Some(Token::Keyword(Keyword::Values)) => String::new(),
            _ => self.next_source()?,
        };

        let columns = if self.next_if_token(Token::OpenParen).is_some() {
            let mut cols = vec![self.next_column()?];
            while self.next_if_token(Token::Comma).is_some() {
                cols.push(self.next_column()?);
            }
            self.next_expect(Token::CloseParen)?;
            Some(cols)
        } else {
            None
        };

        self.next_expect(Token::Keyword(Keyword::Values))?;
        self.next_expect(Token::OpenParen)?;
        let mut values = vec![self.parse_value()?];
        while self.next_if_token(Token::Comma).is_some() {
            values.push(self.parse_value()?);
        }
        self.next_expect(Token::CloseParen)?;

        Ok(ast::Statement::Insert {
            source,
            columns,
            values,
            wait: self.next_if_token(Token::Keyword(Keyword::Wait)).is_some(),
        })
    }

    /// DELETE [FROM source] [WHERE cond] [WAIT]
    fn parse_delete(&mut self) -> Result<ast::Statement> {
        self.next_expect(Token::Keyword(Keyword::Delete))?;
        let source = match self.next_if_token(Token::Keyword(Keyword::From)) {
            Some(_) => self.next_source()?,
            None => String::new(),
        };
        let (where_clause, wait) = self.parse_tail()?;
        Ok(ast::Statement::Delete {
            source,
            where_clause,
            wait,
        })
    }

    /// Optional WHERE clause and WAIT flag; WAIT may come before or after WHERE
    fn parse_tail(&mut self) -> Result<(Option<Condition>, bool)> {
        let mut wait = self.next_if_token(Token::Keyword(Keyword::Wait)).is_some();
        let where_clause = self.parse_where_clause()?;
        wait |= self.next_if_token(Token::Keyword(Keyword::Wait)).is_some();
        Ok((where_clause, wait))
    }

    fn parse_where_clause(&mut self) -> Result<Option<Condition>> {
        if self.next_if_token(Token::Keyword(Keyword::Where)).is_none() {
            return Ok(None);
        }
        let column = self.next_column()?;
        let comparator = match self.next()? {
            Token::Equal => Comparator::Equal,
            Token::NotEqual => Comparator::NotEqual,
            Token::LessThan => Comparator::LessThan,
            Token::LessThanOrEqual => Comparator::LessThanOrEqual,
            Token::GreaterThan => Comparator::GreaterThan,
            Token::GreaterThanOrEqual => Comparator::GreaterThanOrEqual,
            Token::Keyword(Keyword::Like) => Comparator::Like,
            token => {
                return Err(Error::Parse(format!(
                    "[Parser] Expected comparison operator, got {}",
                    token
                )));
            }
        };
        let value = self.parse_value()?;
        Ok(Some(Condition {
            column,
            comparator,
            value,
        }))
    }

    /// Parses a literal; every value is text, numbers keep their spelling
    fn parse_value(&mut self) -> Result<String> {
        Ok(match self.next()? {
            Token::String(s) | Token::Ident(s) | Token::Number(s) => s,
            Token::Minus => match self.next()? {
                Token::Number(n) => format!("-{}", n),
                t => {
                    return Err(Error::Parse(format!(
                        "[Parser] Expected number after -, got {}",
                        t
                    )));
                }
            },
            t => {
                return Err(Error::Parse(format!(
                    "[Parser] Unexpected value token {}",
                    t
                )));
            }
        })
    }

    /// Column names are bare words or quoted strings
    fn next_column(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) | Token::String(ident) => Ok(ident),
            token => Err(Error::Parse(format!(
                "[Parser] Expected column name, got token {}",
                token
            ))),
        }
    }

    /// Sources are bare paths/URLs or quoted strings
    fn next_source(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) | Token::String(ident) => Ok(ident),
            token => Err(Error::Parse(format!(
                "[Parser] Expected file or URL, got token {}",
                token
            ))),
        }
    }

    fn peek(&mut self) -> Result<Option<Token>> {
        self.lexer.peek().cloned().transpose()
    }

    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .unwrap_or_else(|| Err(Error::Parse("[Parser] Unexpected end of input".into())))
    }

    /// Expects a specific token, returns error if different
    fn next_expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Parse(format!(
                "[Parser] Expected token {}, got {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes next token if it satisfies the predicate
    fn next_if<F: Fn(&Token) -> bool>(&mut self, predicate: F) -> Option<Token> {
        self.peek().unwrap_or(None).filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes next token if it matches the given token
    fn next_if_token(&mut self, token: Token) -> Option<Token> {
        self.next_if(|t| t == &token)
    }
}
