//! Markup parsing for template sources
//!
//! A small two-phase pipeline in the classic shape: a character lexer that
//! produces a token stream, and a recursive-descent tree builder that turns
//! the tokens into a [`dom`](crate::dom) fragment. Only the HTML subset that
//! templates actually use is supported; anything beyond it is a fatal markup
//! error rather than a silent recovery.

use crate::dom::{Node, VOID_ELEMENTS};
use crate::error::{Result, TemplatingError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    /// `<name` — start tag opened
    StartTagOpen(String),
    /// attribute inside a start tag; value is `None` for bare attributes
    Attribute(String, Option<String>),
    /// `>` or `/>` closing a start tag
    StartTagEnd { self_closing: bool },
    /// `</name>`
    EndTag(String),
    Text(String),
    Comment(String),
    Eof,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::StartTagOpen(name) => write!(f, "<{}", name),
            TokenType::Attribute(name, Some(value)) => write!(f, "{}=\"{}\"", name, value),
            TokenType::Attribute(name, None) => write!(f, "{}", name),
            TokenType::StartTagEnd { self_closing: true } => write!(f, "/>"),
            TokenType::StartTagEnd { self_closing: false } => write!(f, ">"),
            TokenType::EndTag(name) => write!(f, "</{}>", name),
            TokenType::Text(text) => write!(f, "text({:?})", text),
            TokenType::Comment(text) => write!(f, "comment({:?})", text),
            TokenType::Eof => write!(f, "EOF"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub line: usize,
    pub column: usize,
}

pub struct MarkupLexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    filename: String,
}

impl MarkupLexer {
    pub fn new(input: &str, filename: String) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            filename,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            if self.peek() == '<' {
                self.lex_tag(&mut tokens)?;
            } else {
                self.lex_text(&mut tokens);
            }
        }
        tokens.push(self.token(TokenType::Eof));
        Ok(tokens)
    }

    fn lex_text(&mut self, tokens: &mut Vec<Token>) {
        let line = self.line;
        let column = self.column;
        let mut text = String::new();
        while !self.is_at_end() && self.peek() != '<' {
            text.push(self.advance());
        }
        tokens.push(Token {
            token_type: TokenType::Text(text),
            line,
            column,
        });
    }

    fn lex_tag(&mut self, tokens: &mut Vec<Token>) -> Result<()> {
        let line = self.line;
        let column = self.column;
        self.advance(); // consume '<'

        if self.peek() == '!' {
            return self.lex_declaration(tokens, line, column);
        }

        if self.peek() == '/' {
            self.advance();
            let name = self.lex_name();
            if name.is_empty() {
                return Err(self.error(line, "Expected tag name after '</'"));
            }
            self.skip_whitespace();
            if self.peek() != '>' {
                return Err(self.error(line, format!("Unterminated end tag '</{}'", name)));
            }
            self.advance();
            tokens.push(Token {
                token_type: TokenType::EndTag(name.to_ascii_lowercase()),
                line,
                column,
            });
            return Ok(());
        }

        let name = self.lex_name();
        if name.is_empty() {
            return Err(self.error(line, "Expected tag name after '<'"));
        }
        tokens.push(Token {
            token_type: TokenType::StartTagOpen(name.to_ascii_lowercase()),
            line,
            column,
        });

        // attributes until '>' or '/>'
        loop {
            self.skip_whitespace();
            if self.is_at_end() {
                return Err(self.error(line, format!("Unterminated start tag '<{}'", name)));
            }
            match self.peek() {
                '>' => {
                    self.advance();
                    tokens.push(self.token(TokenType::StartTagEnd { self_closing: false }));
                    return Ok(());
                }
                '/' => {
                    self.advance();
                    if self.peek() != '>' {
                        return Err(self.error(self.line, "Expected '>' after '/'"));
                    }
                    self.advance();
                    tokens.push(self.token(TokenType::StartTagEnd { self_closing: true }));
                    return Ok(());
                }
                _ => {
                    let attr = self.lex_attribute()?;
                    tokens.push(attr);
                }
            }
        }
    }

    fn lex_attribute(&mut self) -> Result<Token> {
        let line = self.line;
        let column = self.column;
        let name = self.lex_attr_name();
        if name.is_empty() {
            return Err(self.error(line, format!("Unexpected character '{}' in tag", self.peek())));
        }
        self.skip_whitespace();
        if self.peek() != '=' {
            return Ok(Token {
                token_type: TokenType::Attribute(name.to_ascii_lowercase(), None),
                line,
                column,
            });
        }
        self.advance(); // '='
        self.skip_whitespace();
        let value = match self.peek() {
            '"' | '\'' => {
                let quote = self.advance();
                let mut value = String::new();
                while !self.is_at_end() && self.peek() != quote {
                    value.push(self.advance());
                }
                if self.is_at_end() {
                    return Err(self.error(line, format!("Unterminated attribute value for '{}'", name)));
                }
                self.advance(); // closing quote
                value
            }
            _ => {
                let mut value = String::new();
                while !self.is_at_end() && !self.peek().is_whitespace() && self.peek() != '>' {
                    value.push(self.advance());
                }
                value
            }
        };
        Ok(Token {
            token_type: TokenType::Attribute(name.to_ascii_lowercase(), Some(value)),
            line,
            column,
        })
    }

    fn lex_declaration(&mut self, tokens: &mut Vec<Token>, line: usize, column: usize) -> Result<()> {
        self.advance(); // '!'
        if self.peek() == '-' && self.peek_ahead(1) == '-' {
            self.advance();
            self.advance();
            let mut text = String::new();
            loop {
                if self.is_at_end() {
                    return Err(self.error(line, "Unterminated comment"));
                }
                if self.peek() == '-' && self.peek_ahead(1) == '-' && self.peek_ahead(2) == '>' {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
                text.push(self.advance());
            }
            tokens.push(Token {
                token_type: TokenType::Comment(text),
                line,
                column,
            });
            return Ok(());
        }
        // doctype or other declaration: consumed and dropped
        while !self.is_at_end() && self.peek() != '>' {
            self.advance();
        }
        if !self.is_at_end() {
            self.advance();
        }
        Ok(())
    }

    fn lex_name(&mut self) -> String {
        let mut name = String::new();
        while !self.is_at_end() {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                name.push(self.advance());
            } else {
                break;
            }
        }
        name
    }

    /// Attribute names also admit '.' (binding commands) and ':' / '$'.
    fn lex_attr_name(&mut self) -> String {
        let mut name = String::new();
        while !self.is_at_end() {
            let c = self.peek();
            if c.is_whitespace() || c == '=' || c == '>' || c == '/' {
                break;
            }
            name.push(self.advance());
        }
        name
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.peek().is_whitespace() {
            self.advance();
        }
    }

    fn peek(&self) -> char {
        self.input.get(self.position).copied().unwrap_or('\0')
    }

    fn peek_ahead(&self, offset: usize) -> char {
        self.input.get(self.position + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.input.get(self.position).copied().unwrap_or('\0');
        self.position += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn token(&self, token_type: TokenType) -> Token {
        Token {
            token_type,
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> TemplatingError {
        TemplatingError::markup(self.filename.clone(), line, message)
    }
}

pub struct MarkupParser {
    tokens: Vec<Token>,
    current: usize,
    filename: String,
}

impl MarkupParser {
    pub fn new(tokens: Vec<Token>, filename: String) -> Self {
        Self {
            tokens,
            current: 0,
            filename,
        }
    }

    /// Build a fragment holding the parsed top-level nodes.
    pub fn parse(&mut self) -> Result<Node> {
        let fragment = Node::fragment();
        while !self.is_at_end() {
            if let Some(node) = self.parse_node()? {
                fragment.append_child(&node);
            }
        }
        Ok(fragment)
    }

    fn parse_node(&mut self) -> Result<Option<Node>> {
        let token = self.advance();
        match token.token_type.clone() {
            TokenType::Text(text) => Ok(Some(Node::text(&text))),
            TokenType::Comment(text) => Ok(Some(Node::comment(&text))),
            TokenType::StartTagOpen(name) => self.parse_element(name, token.line).map(Some),
            TokenType::EndTag(name) => Err(TemplatingError::markup(
                self.filename.clone(),
                token.line,
                format!("Unexpected closing tag '</{}>'", name),
            )),
            TokenType::Eof => Ok(None),
            other => Err(TemplatingError::markup(
                self.filename.clone(),
                token.line,
                format!("Unexpected token: {}", other),
            )),
        }
    }

    fn parse_element(&mut self, name: String, line: usize) -> Result<Node> {
        let element = Node::element(&name);

        // attributes, then the start-tag terminator
        let self_closing = loop {
            let token = self.advance();
            match token.token_type.clone() {
                TokenType::Attribute(attr_name, value) => {
                    element.set_attribute(&attr_name, value.as_deref().unwrap_or(""));
                }
                TokenType::StartTagEnd { self_closing } => break self_closing,
                other => {
                    return Err(TemplatingError::markup(
                        self.filename.clone(),
                        token.line,
                        format!("Unexpected token in <{}>: {}", name, other),
                    ))
                }
            }
        };

        if self_closing || VOID_ELEMENTS.contains(&name.as_str()) {
            return Ok(element);
        }

        // children until the matching end tag
        loop {
            if self.is_at_end() {
                return Err(TemplatingError::markup(
                    self.filename.clone(),
                    line,
                    format!("Missing closing tag for <{}>", name),
                ));
            }
            if let TokenType::EndTag(end_name) = &self.peek().token_type {
                let end_name = end_name.clone();
                let end_line = self.peek().line;
                self.advance();
                if end_name != name {
                    return Err(TemplatingError::markup(
                        self.filename.clone(),
                        end_line,
                        format!("Mismatched closing tag: expected </{}>, found </{}>", name, end_name),
                    ));
                }
                return Ok(element);
            }
            if let Some(child) = self.parse_node()? {
                element.append_child(&child);
            }
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.current.min(self.tokens.len() - 1)].clone();
        if self.current < self.tokens.len() {
            self.current += 1;
        }
        token
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::Eof)
    }
}

/// Parse markup into a document fragment.
pub fn parse_fragment(markup: &str, filename: &str) -> Result<Node> {
    let mut lexer = MarkupLexer::new(markup, filename.to_string());
    let tokens = lexer.tokenize()?;
    let mut parser = MarkupParser::new(tokens, filename.to_string());
    parser.parse()
}

/// Parse markup into a `<template>` element. A lone template root is used
/// as-is; anything else is wrapped so the compiler always sees one.
pub fn parse_template(markup: &str, filename: &str) -> Result<Node> {
    let fragment = parse_fragment(markup, filename)?;

    let significant: Vec<Node> = fragment
        .children()
        .into_iter()
        .filter(|n| !n.is_whitespace_text())
        .collect();
    if significant.len() == 1 && significant[0].node_name() == "template" {
        let template = significant[0].clone();
        template.remove();
        return Ok(template);
    }

    let template = Node::element("template");
    template.append_fragment(&fragment);
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_element() {
        let fragment = parse_fragment("<div class=\"box\">hi</div>", "test.html").unwrap();
        let div = fragment.first_child().unwrap();
        assert_eq!(div.node_name(), "div");
        assert_eq!(div.get_attribute("class").as_deref(), Some("box"));
        assert_eq!(div.text_content(), "hi");
    }

    #[test]
    fn test_parse_binding_command_attributes() {
        let fragment =
            parse_fragment("<input value.bind=\"firstName\" disabled>", "test.html").unwrap();
        let input = fragment.first_child().unwrap();
        assert_eq!(input.get_attribute("value.bind").as_deref(), Some("firstName"));
        assert!(input.has_attribute("disabled"));
    }

    #[test]
    fn test_void_and_self_closing() {
        let fragment = parse_fragment("<br><img src=\"x.png\"><my-tag/>", "test.html").unwrap();
        assert_eq!(fragment.child_count(), 3);
        assert_eq!(fragment.children()[2].node_name(), "my-tag");
    }

    #[test]
    fn test_nested_and_comment() {
        let fragment =
            parse_fragment("<ul><!-- items --><li>a</li><li>b</li></ul>", "t.html").unwrap();
        let ul = fragment.first_child().unwrap();
        assert_eq!(ul.child_count(), 3);
        assert!(ul.first_child().unwrap().is_comment());
    }

    #[test]
    fn test_mismatched_close_is_fatal() {
        let err = parse_fragment("<div><span></div>", "bad.html").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Mismatched closing tag"), "{}", message);
        assert!(message.contains("bad.html"));
    }

    #[test]
    fn test_parse_template_wraps_content() {
        let template = parse_template("<div></div><span></span>", "t.html").unwrap();
        assert_eq!(template.node_name(), "template");
        assert_eq!(template.child_count(), 2);

        let template = parse_template("<template><p>x</p></template>", "t.html").unwrap();
        assert_eq!(template.node_name(), "template");
        assert_eq!(template.first_child().unwrap().node_name(), "p");
    }
}
