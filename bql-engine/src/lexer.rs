//! Tokenizer for BQL query text (§4.1). Keywords are case-insensitive;
//! identifiers, type labels, and string literals are case-sensitive.
//! Whitespace and `--` line comments are ignored.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Keywords
    Match,
    Create,
    Merge,
    Set,
    Delete,
    Detach,
    Return,
    Where,
    On,
    And,
    Or,
    Not,
    Xor,
    Is,
    Null,
    Contains,
    Starts,
    Ends,
    With,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Colon,
    Comma,
    Dot,
    Equals,
    TildeEquals,
    Pipe,

    // Relation syntax
    Arrow,     // -->
    RelOpen,   // -[
    RelClose,  // ]->
    Asterisk,  // *
    RangeDots, // ..

    // Literals
    Integer(u32),
    String(String),
    Identifier(String),

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token {
            token_type: TokenType::Eof,
            line: self.line,
            column: self.column,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, String> {
        self.skip_whitespace_and_comments();

        if self.chars.peek().is_none() {
            return Ok(None);
        }

        let start_line = self.line;
        let start_column = self.column;
        let c = self.advance().unwrap();

        if c == '"' {
            return Ok(Some(self.read_string(start_line, start_column)?));
        }
        if c.is_ascii_digit() {
            return Ok(Some(self.read_integer(c, start_line, start_column)?));
        }
        if c.is_alphabetic() || c == '_' {
            return Ok(Some(self.read_identifier(c, start_line, start_column)));
        }

        let token_type = match c {
            '(' => TokenType::LeftParen,
            ')' => TokenType::RightParen,
            '{' => TokenType::LeftBrace,
            '}' => TokenType::RightBrace,
            ':' => TokenType::Colon,
            ',' => TokenType::Comma,
            '.' => {
                if self.chars.peek() == Some(&'.') {
                    self.advance();
                    TokenType::RangeDots
                } else {
                    TokenType::Dot
                }
            }
            '|' => TokenType::Pipe,
            '*' => TokenType::Asterisk,
            '=' => {
                if self.chars.peek() == Some(&'~') {
                    self.advance();
                    TokenType::TildeEquals
                } else {
                    TokenType::Equals
                }
            }
            ']' => {
                if self.chars.peek() == Some(&'-') {
                    self.advance();
                    if self.chars.peek() == Some(&'>') {
                        self.advance();
                        TokenType::RelClose
                    } else {
                        return Err(format!("expected ']->' at line {start_line}"));
                    }
                } else {
                    return Err(format!("expected ']->' at line {start_line}"));
                }
            }
            '-' => {
                if self.chars.peek() == Some(&'[') {
                    self.advance();
                    TokenType::RelOpen
                } else if self.chars.peek() == Some(&'-') {
                    self.advance();
                    if self.chars.peek() == Some(&'>') {
                        self.advance();
                        TokenType::Arrow
                    } else {
                        return Err(format!("expected '-->' at line {start_line}"));
                    }
                } else {
                    return Err("unexpected character: -".to_string());
                }
            }
            other => return Err(format!("unexpected character: {other}")),
        };

        Ok(Some(Token {
            token_type,
            line: start_line,
            column: start_column,
        }))
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(c) = c {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while let Some(&c) = self.chars.peek() {
                if c.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.chars.peek() == Some(&'-') {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if lookahead.peek() == Some(&'-') {
                    self.advance();
                    self.advance();
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    continue;
                }
            }
            break;
        }
    }

    fn read_string(&mut self, line: usize, column: usize) -> Result<Token, String> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(format!("unterminated string at line {line}")),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => return Err(format!("unterminated string at line {line}")),
                },
                Some(c) => value.push(c),
            }
        }
        Ok(Token {
            token_type: TokenType::String(value),
            line,
            column,
        })
    }

    fn read_integer(&mut self, first: char, line: usize, column: usize) -> Result<Token, String> {
        let mut value = String::new();
        value.push(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let n = value
            .parse::<u32>()
            .map_err(|_| format!("invalid integer: {value}"))?;
        Ok(Token {
            token_type: TokenType::Integer(n),
            line,
            column,
        })
    }

    fn read_identifier(&mut self, first: char, line: usize, column: usize) -> Token {
        let mut value = String::new();
        value.push(first);
        while let Some(&c) = self.chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let token_type = match value.to_uppercase().as_str() {
            "MATCH" => TokenType::Match,
            "CREATE" => TokenType::Create,
            "MERGE" => TokenType::Merge,
            "SET" => TokenType::Set,
            "DELETE" => TokenType::Delete,
            "DETACH" => TokenType::Detach,
            "RETURN" => TokenType::Return,
            "WHERE" => TokenType::Where,
            "ON" => TokenType::On,
            "AND" => TokenType::And,
            "OR" => TokenType::Or,
            "NOT" => TokenType::Not,
            "XOR" => TokenType::Xor,
            "IS" => TokenType::Is,
            "NULL" => TokenType::Null,
            "CONTAINS" => TokenType::Contains,
            "STARTS" => TokenType::Starts,
            "ENDS" => TokenType::Ends,
            "WITH" => TokenType::With,
            _ => TokenType::Identifier(value),
        };

        Token {
            token_type,
            line,
            column,
        }
    }
}
