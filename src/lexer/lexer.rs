use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    errors::errors::{Error, ErrorImpl},
    Position, Span, MK_DEFAULT_HANDLER, MK_TOKEN,
};

use super::tokens::{Token, TokenKind, RESERVED_LOOKUP};

pub type RegexHandler = fn(&mut Lexer, &Regex);

pub struct RegexPattern {
    regex: Regex,
    handler: RegexHandler,
}

impl RegexPattern {
    fn new(pattern: &str, handler: RegexHandler) -> Self {
        // Every pattern is anchored so a match always starts at the cursor.
        RegexPattern {
            regex: Regex::new(&format!("^(?:{})", pattern)).unwrap(),
            handler,
        }
    }
}

lazy_static! {
    static ref PATTERNS: Vec<RegexPattern> = vec![
        RegexPattern::new("[a-zA-Z_][a-zA-Z0-9_]*", symbol_handler),
        RegexPattern::new("[0-9]+", number_handler),
        RegexPattern::new("\\s+", skip_handler),
        RegexPattern::new("//[^\\n]*", skip_handler),
        RegexPattern::new("\\[", MK_DEFAULT_HANDLER!(TokenKind::OpenBracket, "[")),
        RegexPattern::new("\\]", MK_DEFAULT_HANDLER!(TokenKind::CloseBracket, "]")),
        RegexPattern::new("\\(", MK_DEFAULT_HANDLER!(TokenKind::OpenParen, "(")),
        RegexPattern::new("\\)", MK_DEFAULT_HANDLER!(TokenKind::CloseParen, ")")),
        RegexPattern::new("==", MK_DEFAULT_HANDLER!(TokenKind::Equals, "==")),
        RegexPattern::new("!=", MK_DEFAULT_HANDLER!(TokenKind::NotEquals, "!=")),
        RegexPattern::new("=", MK_DEFAULT_HANDLER!(TokenKind::Assignment, "=")),
        RegexPattern::new("<", MK_DEFAULT_HANDLER!(TokenKind::Less, "<")),
        RegexPattern::new(">", MK_DEFAULT_HANDLER!(TokenKind::Greater, ">")),
        RegexPattern::new("\\.\\.", MK_DEFAULT_HANDLER!(TokenKind::DotDot, "..")),
        RegexPattern::new(";", MK_DEFAULT_HANDLER!(TokenKind::Semicolon, ";")),
        RegexPattern::new("\\|", MK_DEFAULT_HANDLER!(TokenKind::Pipe, "|")),
        RegexPattern::new("&", MK_DEFAULT_HANDLER!(TokenKind::Ampersand, "&")),
        RegexPattern::new("\\+", MK_DEFAULT_HANDLER!(TokenKind::Plus, "+")),
        RegexPattern::new("-", MK_DEFAULT_HANDLER!(TokenKind::Dash, "-")),
        RegexPattern::new("/", MK_DEFAULT_HANDLER!(TokenKind::Slash, "/")),
        RegexPattern::new("\\*", MK_DEFAULT_HANDLER!(TokenKind::Star, "*")),
    ];
}

pub struct Lexer {
    tokens: Vec<Token>,
    source: String,
    pos: usize,
    file: Rc<String>,
}

impl Lexer {
    pub fn new(source: String, file: Option<String>) -> Lexer {
        let file_name = if let Some(file) = file {
            Rc::new(file)
        } else {
            Rc::new(String::from("shell"))
        };

        Lexer {
            pos: 0,
            tokens: vec![],
            source,
            file: file_name,
        }
    }

    pub fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    pub fn push(&mut self, token: Token) {
        self.tokens.push(token);
    }

    pub fn at(&self) -> char {
        self.remainder().chars().next().unwrap_or('\0')
    }

    pub fn remainder(&self) -> &str {
        &self.source[self.pos..]
    }

    pub fn at_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn span_of(&self, len: usize) -> Span {
        Span {
            start: Position(self.pos as u32, Rc::clone(&self.file)),
            end: Position((self.pos + len) as u32, Rc::clone(&self.file)),
        }
    }

    fn matched(&self, regex: &Regex) -> String {
        regex
            .find(self.remainder())
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

fn number_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);

    lexer.push(MK_TOKEN!(
        TokenKind::Number,
        matched.clone(),
        lexer.span_of(matched.len())
    ));
    lexer.advance_n(matched.len());
}

fn skip_handler(lexer: &mut Lexer, regex: &Regex) {
    let matched = lexer.matched(regex);
    lexer.advance_n(matched.len());
}

fn symbol_handler(lexer: &mut Lexer, regex: &Regex) {
    let value = lexer.matched(regex);
    let kind = RESERVED_LOOKUP
        .get(value.as_str())
        .copied()
        .unwrap_or(TokenKind::Identifier);

    lexer.push(MK_TOKEN!(kind, value.clone(), lexer.span_of(value.len())));
    lexer.advance_n(value.len());
}

pub fn tokenize(source: String, file: Option<String>) -> Result<Vec<Token>, Error> {
    let mut lex = Lexer::new(source, file);

    while !lex.at_eof() {
        let pattern = PATTERNS
            .iter()
            .find(|pattern| pattern.regex.is_match(lex.remainder()));

        match pattern {
            Some(pattern) => (pattern.handler)(&mut lex, &pattern.regex),
            None => {
                return Err(Error::new(
                    ErrorImpl::UnrecognisedToken {
                        token: lex.at().to_string(),
                    },
                    Position(lex.pos as u32, Rc::clone(&lex.file)),
                ))
            }
        }
    }

    let eof_span = lex.span_of(0);
    lex.push(MK_TOKEN!(TokenKind::EOF, String::from("EOF"), eof_span));
    Ok(lex.tokens)
}
