//! Statement lexer - tokenizes query text into a stream of tokens

use std::{fmt::Display, iter::Peekable, str::Chars};

use crate::error::{Error, Result};

/// Represents a single lexical token in the query text
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Reserved keyword
    Keyword(Keyword),
    /// Bare word: column name, file path, URL or unquoted value
    Ident(String),
    /// Quoted string literal (single or double quotes)
    String(String),
    /// Numeric literal, kept as written
    Number(String),
    OpenParen,
    CloseParen,
    Comma,
    Semicolon,
    Asterisk,
    Minus,
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Token::Keyword(keyword) => keyword.to_str(),
            Token::Ident(ident) => ident,
            Token::String(v) => v,
            Token::Number(n) => n,
            Token::OpenParen => "(",
            Token::CloseParen => ")",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Asterisk => "*",
            Token::Minus => "-",
            Token::Equal => "=",
            Token::NotEqual => "!=",
            Token::LessThan => "<",
            Token::LessThanOrEqual => "<=",
            Token::GreaterThan => ">",
            Token::GreaterThanOrEqual => ">=",
        })
    }
}

/// Reserved keywords
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    Select,
    From,
    Where,
    Wait,
    Update,
    Set,
    Insert,
    Into,
    Values,
    Delete,
    Save,
    Like,
}

impl Keyword {
    /// Attempts to parse a string as a keyword (case-insensitive)
    pub fn from_str(ident: &str) -> Option<Keyword> {
        Some(match ident.to_uppercase().as_ref() {
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "WAIT" => Keyword::Wait,
            "UPDATE" => Keyword::Update,
            "SET" => Keyword::Set,
            "INSERT" => Keyword::Insert,
            "INTO" => Keyword::Into,
            "VALUES" => Keyword::Values,
            "DELETE" => Keyword::Delete,
            "SAVE" => Keyword::Save,
            "LIKE" => Keyword::Like,
            _ => return None,
        })
    }

    /// Returns the uppercase string representation of the keyword
    pub fn to_str(&self) -> &str {
        match self {
            Keyword::Select => "SELECT",
            Keyword::From => "FROM",
            Keyword::Where => "WHERE",
            Keyword::Wait => "WAIT",
            Keyword::Update => "UPDATE",
            Keyword::Set => "SET",
            Keyword::Insert => "INSERT",
            Keyword::Into => "INTO",
            Keyword::Values => "VALUES",
            Keyword::Delete => "DELETE",
            Keyword::Save => "SAVE",
            Keyword::Like => "LIKE",
        }
    }
}

impl Display for Keyword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Characters allowed inside a bare word (paths and URLs included)
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | ':' | '-' | '~')
}

/// Query lexical analyzer
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .iter
                .peek()
                .map(|c| Err(Error::Parse(format!("[Lexer] Unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            iter: text.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<char> {
        self.iter.peek().filter(|&c| predicate(*c))?;
        self.iter.next()
    }

    /// Consumes consecutive characters while they satisfy the predicate
    fn next_while<F: Fn(char) -> bool>(&mut self, predicate: F) -> Option<String> {
        let mut value = String::new();
        while let Some(c) = self.next_if(&predicate) {
            value.push(c);
        }
        Some(value).filter(|v| !v.is_empty())
    }

    fn erase_whitespace(&mut self) {
        self.next_while(|c| c.is_whitespace());
    }

    /// Scans and returns the next token
    fn scan(&mut self) -> Result<Option<Token>> {
        self.erase_whitespace();
        match self.iter.peek() {
            Some(&q) if q == '\'' || q == '"' => self.scan_string(q),
            Some(&c) if is_word_char(c) && c != '-' && c != ':' => Ok(self.scan_word()),
            Some(_) => self.scan_symbol(),
            None => Ok(None),
        }
    }

    /// Scans a quoted string; a doubled quote inside stands for itself
    fn scan_string(&mut self, quote: char) -> Result<Option<Token>> {
        self.iter.next();
        let mut val = String::new();
        loop {
            match self.iter.next() {
                Some(c) if c == quote && self.next_if(|n| n == quote).is_some() => val.push(c),
                Some(c) if c == quote => break,
                Some(c) => val.push(c),
                None => return Err(Error::Parse("[Lexer] Unexpected end of string".into())),
            }
        }
        Ok(Some(Token::String(val)))
    }

    /// Scans a number, keyword or bare word
    fn scan_word(&mut self) -> Option<Token> {
        let val = self.next_while(is_word_char)?;
        if val.starts_with(|c: char| c.is_ascii_digit())
            && val.chars().all(|c| c.is_ascii_digit() || c == '.')
            && val.matches('.').count() <= 1
        {
            return Some(Token::Number(val));
        }
        // Identifiers keep their case: column names are case-sensitive
        Some(Keyword::from_str(&val).map_or(Token::Ident(val), Token::Keyword))
    }

    fn scan_symbol(&mut self) -> Result<Option<Token>> {
        let token = match self.iter.peek() {
            Some('*') => Token::Asterisk,
            Some('(') => Token::OpenParen,
            Some(')') => Token::CloseParen,
            Some(',') => Token::Comma,
            Some(';') => Token::Semicolon,
            Some('-') => Token::Minus,
            Some('=') => Token::Equal,
            Some('!') => {
                self.iter.next();
                return match self.next_if(|c| c == '=') {
                    Some(_) => Ok(Some(Token::NotEqual)),
                    None => Err(Error::Parse("[Lexer] Expected = after !".into())),
                };
            }
            Some('<') => {
                self.iter.next();
                return Ok(Some(if self.next_if(|c| c == '=').is_some() {
                    Token::LessThanOrEqual
                } else if self.next_if(|c| c == '>').is_some() {
                    Token::NotEqual
                } else {
                    Token::LessThan
                }));
            }
            Some('>') => {
                self.iter.next();
                return Ok(Some(if self.next_if(|c| c == '=').is_some() {
                    Token::GreaterThanOrEqual
                } else {
                    Token::GreaterThan
                }));
            }
            _ => return Ok(None),
        };
        self.iter.next();
        Ok(Some(token))
    }
}

#[cfg(test)]
mod tests {
    use super::Lexer;
    use crate::{
        error::Result,
        sql::parser::lexer::{Keyword, Token},
    };

    #[test]
    fn test_lexer_select() -> Result<()> {
        let tokens = Lexer::new("select ID, Name from ./data/people.csv where age >= 21 wait;")
            .peekable()
            .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Select),
                Token::Ident("ID".to_string()),
                Token::Comma,
                Token::Ident("Name".to_string()),
                Token::Keyword(Keyword::From),
                Token::Ident("./data/people.csv".to_string()),
                Token::Keyword(Keyword::Where),
                Token::Ident("age".to_string()),
                Token::GreaterThanOrEqual,
                Token::Number("21".to_string()),
                Token::Keyword(Keyword::Wait),
                Token::Semicolon,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_strings_and_operators() -> Result<()> {
        let tokens = Lexer::new(
            r#"UPDATE "http://host:8080/a.csv" SET s = 'it''s' WHERE n <> -4.5 and d != 2023-01-01 < <="#,
        )
        .collect::<Result<Vec<_>>>()?;

        assert_eq!(
            tokens,
            vec![
                Token::Keyword(Keyword::Update),
                Token::String("http://host:8080/a.csv".to_string()),
                Token::Keyword(Keyword::Set),
                Token::Ident("s".to_string()),
                Token::Equal,
                Token::String("it's".to_string()),
                Token::Keyword(Keyword::Where),
                Token::Ident("n".to_string()),
                Token::NotEqual,
                Token::Minus,
                Token::Number("4.5".to_string()),
                Token::Ident("and".to_string()),
                Token::Ident("d".to_string()),
                Token::NotEqual,
                Token::Ident("2023-01-01".to_string()),
                Token::LessThan,
                Token::LessThanOrEqual,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_lexer_errors() {
        assert!(Lexer::new("select 'abc").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a ! b").collect::<Result<Vec<_>>>().is_err());
        assert!(Lexer::new("a # b").collect::<Result<Vec<_>>>().is_err());
    }
}
