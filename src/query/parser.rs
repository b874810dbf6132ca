// src/query/parser.rs
//! Lexer and recursive-descent parser for the GraphQL subset served by `/graphql`

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Syntax Error: {message} ({}:{})", pos.line, pos.column)]
pub struct ParseError {
    pub message: String,
    pub pos: Pos,
}

impl ParseError {
    fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub selection: Vec<Field>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub var_type: TypeRef,
    pub default: Option<Value>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: Vec<(String, Value)>,
    pub directives: Vec<Directive>,
    pub selection: Option<Vec<Field>>,
    pub pos: Pos,
}

impl Field {
    /// Key under which this field appears in the response object.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments
            .iter()
            .find(|(arg, _)| arg == name)
            .map(|(_, value)| value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: Vec<(String, Value)>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Variable(String),
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Null,
    Enum(String),
    List(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Variable(name) => write!(f, "${}", name),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Enum(name) => write!(f, "{}", name),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Punct(char),
    Spread,
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Eof,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::Punct(c) => write!(f, "\"{}\"", c),
            Tok::Spread => write!(f, "\"...\""),
            Tok::Name(name) => write!(f, "Name \"{}\"", name),
            Tok::Int(n) => write!(f, "Int \"{}\"", n),
            Tok::Float(n) => write!(f, "Float \"{}\"", n),
            Tok::Str(s) => write!(f, "String {:?}", s),
            Tok::Eof => write!(f, "<EOF>"),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: Pos,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.tok == Tok::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn skip_ignored(&mut self) {
        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' | ',' | '\u{feff}' => {
                    self.bump();
                }
                '#' => {
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_ignored();
        let pos = self.pos();
        let Some(&c) = self.chars.peek() else {
            return Ok(Token { tok: Tok::Eof, pos });
        };

        let tok = match c {
            '!' | '$' | '(' | ')' | ':' | '=' | '@' | '[' | ']' | '{' | '}' | '|' | '&' => {
                self.bump();
                Tok::Punct(c)
            }
            '.' => {
                for _ in 0..3 {
                    if self.bump() != Some('.') {
                        return Err(ParseError::new("Unexpected \".\"", pos));
                    }
                }
                Tok::Spread
            }
            '"' => self.read_string(pos)?,
            '-' | '0'..='9' => self.read_number(pos)?,
            c if c == '_' || c.is_ascii_alphabetic() => {
                let mut name = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c == '_' || c.is_ascii_alphanumeric() {
                        name.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Tok::Name(name)
            }
            other => {
                return Err(ParseError::new(
                    format!("Cannot parse the unexpected character {:?}.", other),
                    pos,
                ))
            }
        };

        Ok(Token { tok, pos })
    }

    fn read_number(&mut self, pos: Pos) -> Result<Tok, ParseError> {
        let mut text = String::new();
        let mut is_float = false;

        if self.chars.peek() == Some(&'-') {
            text.push('-');
            self.bump();
        }
        self.read_digits(&mut text, pos)?;

        if self.chars.peek() == Some(&'.') {
            is_float = true;
            text.push('.');
            self.bump();
            self.read_digits(&mut text, pos)?;
        }
        if matches!(self.chars.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push('e');
            self.bump();
            if let Some(&sign) = self.chars.peek() {
                if sign == '+' || sign == '-' {
                    text.push(sign);
                    self.bump();
                }
            }
            self.read_digits(&mut text, pos)?;
        }

        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| ParseError::new(format!("Invalid number \"{}\".", text), pos))
        } else {
            text.parse::<i64>()
                .map(Tok::Int)
                .map_err(|_| ParseError::new(format!("Invalid number \"{}\".", text), pos))
        }
    }

    fn read_digits(&mut self, text: &mut String, pos: Pos) -> Result<(), ParseError> {
        let start = text.len();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if text.len() == start {
            return Err(ParseError::new(
                format!("Invalid number, expected digit after \"{}\".", text),
                pos,
            ));
        }
        Ok(())
    }

    fn read_string(&mut self, pos: Pos) -> Result<Tok, ParseError> {
        self.bump();
        let mut value = String::new();

        if self.chars.peek() == Some(&'"') {
            self.bump();
            if self.chars.peek() == Some(&'"') {
                self.bump();
                return self.read_block_string(pos);
            }
            return Ok(Tok::Str(value));
        }

        loop {
            match self.bump() {
                None | Some('\n') | Some('\r') => {
                    return Err(ParseError::new("Unterminated string.", pos))
                }
                Some('"') => return Ok(Tok::Str(value)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some('/') => '/',
                        Some('b') => '\u{8}',
                        Some('f') => '\u{c}',
                        Some('n') => '\n',
                        Some('r') => '\r',
                        Some('t') => '\t',
                        Some('u') => {
                            let mut hex = String::new();
                            for _ in 0..4 {
                                match self.bump() {
                                    Some(h) if h.is_ascii_hexdigit() => hex.push(h),
                                    _ => {
                                        return Err(ParseError::new(
                                            "Invalid Unicode escape sequence.",
                                            pos,
                                        ))
                                    }
                                }
                            }
                            u32::from_str_radix(&hex, 16)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| {
                                    ParseError::new("Invalid Unicode escape sequence.", pos)
                                })?
                        }
                        _ => return Err(ParseError::new("Invalid character escape sequence.", pos)),
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn read_block_string(&mut self, pos: Pos) -> Result<Tok, ParseError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::new("Unterminated string.", pos)),
                Some('"') if self.chars.peek() == Some(&'"') => {
                    self.bump();
                    if self.chars.peek() == Some(&'"') {
                        self.bump();
                        return Ok(Tok::Str(value.trim().to_string()));
                    }
                    value.push_str("\"\"");
                }
                Some(c) => value.push(c),
            }
        }
    }
}

/// Parse a query document.
pub fn parse_document(source: &str) -> Result<Document, ParseError> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    parser.document()
}

/// Deepest nesting of selection sets, list/object literals and list types.
const MAX_DEPTH: usize = 64;

struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, and the parser never advances past it.
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.tok != Tok::Eof {
            self.index += 1;
        }
        token
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(ParseError::new(
                "Query nesting exceeds maximum depth",
                self.peek().pos,
            ));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn unexpected(&self) -> ParseError {
        let token = self.peek();
        ParseError::new(format!("Unexpected {}", token.tok), token.pos)
    }

    fn is_punct(&self, c: char) -> bool {
        self.peek().tok == Tok::Punct(c)
    }

    fn skip_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<Pos, ParseError> {
        if self.is_punct(c) {
            Ok(self.advance().pos)
        } else {
            let token = self.peek();
            Err(ParseError::new(
                format!("Expected \"{}\", found {}", c, token.tok),
                token.pos,
            ))
        }
    }

    fn expect_name(&mut self) -> Result<(String, Pos), ParseError> {
        match &self.peek().tok {
            Tok::Name(name) => {
                let name = name.clone();
                let pos = self.advance().pos;
                Ok((name, pos))
            }
            other => Err(ParseError::new(
                format!("Expected Name, found {}", other),
                self.peek().pos,
            )),
        }
    }

    fn document(&mut self) -> Result<Document, ParseError> {
        let mut operations = Vec::new();
        loop {
            let token = self.peek().clone();
            match &token.tok {
                Tok::Eof if !operations.is_empty() => break,
                Tok::Punct('{') => {
                    let selection = self.selection_set()?;
                    operations.push(Operation {
                        kind: OperationKind::Query,
                        name: None,
                        variables: Vec::new(),
                        selection,
                        pos: token.pos,
                    });
                }
                Tok::Name(keyword) if keyword == "fragment" => {
                    return Err(ParseError::new("Fragments are not supported", token.pos));
                }
                Tok::Name(keyword) => {
                    let kind = match keyword.as_str() {
                        "query" => OperationKind::Query,
                        "mutation" => OperationKind::Mutation,
                        "subscription" => OperationKind::Subscription,
                        _ => return Err(self.unexpected()),
                    };
                    self.advance();
                    operations.push(self.operation(kind, token.pos)?);
                }
                _ => return Err(self.unexpected()),
            }
        }
        Ok(Document { operations })
    }

    fn operation(&mut self, kind: OperationKind, pos: Pos) -> Result<Operation, ParseError> {
        let name = match self.peek().tok {
            Tok::Name(_) => Some(self.expect_name()?.0),
            _ => None,
        };
        let variables = if self.is_punct('(') {
            self.variable_definitions()?
        } else {
            Vec::new()
        };
        // Operation-level directives carry no meaning for this schema.
        self.directives()?;
        let selection = self.selection_set()?;

        Ok(Operation {
            kind,
            name,
            variables,
            selection,
            pos,
        })
    }

    fn variable_definitions(&mut self) -> Result<Vec<VariableDefinition>, ParseError> {
        self.expect_punct('(')?;
        let mut definitions = Vec::new();
        loop {
            let pos = self.expect_punct('$')?;
            let (name, _) = self.expect_name()?;
            self.expect_punct(':')?;
            let var_type = self.type_ref()?;
            let default = if self.skip_punct('=') {
                Some(self.value(true)?)
            } else {
                None
            };
            definitions.push(VariableDefinition {
                name,
                var_type,
                default,
                pos,
            });
            if self.skip_punct(')') {
                return Ok(definitions);
            }
        }
    }

    fn type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let base = if self.skip_punct('[') {
            let inner = self.nested(Self::type_ref)?;
            self.expect_punct(']')?;
            TypeRef::List(Box::new(inner))
        } else {
            TypeRef::Named(self.expect_name()?.0)
        };
        if self.skip_punct('!') {
            Ok(TypeRef::NonNull(Box::new(base)))
        } else {
            Ok(base)
        }
    }

    fn selection_set(&mut self) -> Result<Vec<Field>, ParseError> {
        self.expect_punct('{')?;
        let mut fields = Vec::new();
        loop {
            if self.peek().tok == Tok::Spread {
                return Err(ParseError::new(
                    "Fragments are not supported",
                    self.peek().pos,
                ));
            }
            fields.push(self.field()?);
            if self.skip_punct('}') {
                return Ok(fields);
            }
        }
    }

    fn field(&mut self) -> Result<Field, ParseError> {
        let (first, pos) = self.expect_name()?;
        let (alias, name) = if self.skip_punct(':') {
            (Some(first), self.expect_name()?.0)
        } else {
            (None, first)
        };
        let arguments = self.arguments(false)?;
        let directives = self.directives()?;
        let selection = if self.is_punct('{') {
            Some(self.nested(Self::selection_set)?)
        } else {
            None
        };

        Ok(Field {
            alias,
            name,
            arguments,
            directives,
            selection,
            pos,
        })
    }

    fn arguments(&mut self, constant: bool) -> Result<Vec<(String, Value)>, ParseError> {
        let mut arguments = Vec::new();
        if !self.skip_punct('(') {
            return Ok(arguments);
        }
        loop {
            let (name, _) = self.expect_name()?;
            self.expect_punct(':')?;
            arguments.push((name, self.value(constant)?));
            if self.skip_punct(')') {
                return Ok(arguments);
            }
        }
    }

    fn directives(&mut self) -> Result<Vec<Directive>, ParseError> {
        let mut directives = Vec::new();
        while self.is_punct('@') {
            let pos = self.advance().pos;
            let (name, _) = self.expect_name()?;
            let arguments = self.arguments(false)?;
            directives.push(Directive {
                name,
                arguments,
                pos,
            });
        }
        Ok(directives)
    }

    fn value(&mut self, constant: bool) -> Result<Value, ParseError> {
        let token = self.peek().clone();
        let value = match token.tok {
            Tok::Punct('$') if !constant => {
                self.advance();
                Value::Variable(self.expect_name()?.0)
            }
            Tok::Punct('[') => {
                self.advance();
                let mut items = Vec::new();
                while !self.skip_punct(']') {
                    items.push(self.nested(|parser| parser.value(constant))?);
                }
                return Ok(Value::List(items));
            }
            Tok::Punct('{') => {
                self.advance();
                let mut fields = Vec::new();
                while !self.skip_punct('}') {
                    let (name, _) = self.expect_name()?;
                    self.expect_punct(':')?;
                    fields.push((name, self.nested(|parser| parser.value(constant))?));
                }
                return Ok(Value::Object(fields));
            }
            Tok::Int(n) => {
                self.advance();
                Value::Int(n)
            }
            Tok::Float(n) => {
                self.advance();
                Value::Float(n)
            }
            Tok::Str(s) => {
                self.advance();
                Value::String(s)
            }
            Tok::Name(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    _ => Value::Enum(name),
                }
            }
            _ => return Err(self.unexpected()),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand_query() {
        let doc = parse_document("{ job(id: 2) { position } }").unwrap();
        assert_eq!(doc.operations.len(), 1);
        let op = &doc.operations[0];
        assert_eq!(op.kind, OperationKind::Query);
        assert_eq!(op.selection[0].name, "job");
        assert_eq!(op.selection[0].argument("id"), Some(&Value::Int(2)));
        let sub = op.selection[0].selection.as_ref().unwrap();
        assert_eq!(sub[0].name, "position");
    }

    #[test]
    fn test_parse_named_operation_with_variables() {
        let doc = parse_document(
            "query Lookup($id: Int! = 4) {\n  first: job(id: $id) { id, company }\n}",
        )
        .unwrap();
        let op = &doc.operations[0];
        assert_eq!(op.name.as_deref(), Some("Lookup"));
        assert_eq!(op.variables[0].name, "id");
        assert_eq!(op.variables[0].var_type.to_string(), "Int!");
        assert_eq!(op.variables[0].default, Some(Value::Int(4)));

        let field = &op.selection[0];
        assert_eq!(field.response_key(), "first");
        assert_eq!(field.argument("id"), Some(&Value::Variable("id".into())));
        assert_eq!(field.pos, Pos { line: 2, column: 3 });
    }

    #[test]
    fn test_parse_literals_and_directives() {
        let doc = parse_document(
            r#"{ jobs @skip(if: false) { id } job(id: "7\n", x: [1, 2.5, RED, {a: null}]) { id } }"#,
        )
        .unwrap();
        let fields = &doc.operations[0].selection;
        assert_eq!(fields[0].directives[0].name, "skip");
        assert_eq!(
            fields[1].argument("id"),
            Some(&Value::String("7\n".to_string()))
        );
        assert_eq!(
            fields[1].argument("x"),
            Some(&Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::Enum("RED".into()),
                Value::Object(vec![("a".into(), Value::Null)]),
            ]))
        );
    }

    #[test]
    fn test_comments_and_commas_are_ignored() {
        let doc = parse_document("# all jobs\n{ jobs { id, position, } }").unwrap();
        let jobs = &doc.operations[0].selection[0];
        assert_eq!(jobs.selection.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_unclosed_selection_reports_position() {
        let err = parse_document("{ jobs { id }").unwrap_err();
        assert_eq!(err.message, "Expected Name, found <EOF>");
        assert_eq!(err.pos, Pos { line: 1, column: 14 });
    }

    #[test]
    fn test_empty_document_is_error() {
        let err = parse_document("   ").unwrap_err();
        assert_eq!(err.message, "Unexpected <EOF>");
    }

    #[test]
    fn test_fragments_are_rejected() {
        assert!(parse_document("{ jobs { ...JobParts } }").is_err());
        assert!(parse_document("fragment JobParts on Job { id }").is_err());
    }

    #[test]
    fn test_variables_rejected_in_defaults() {
        assert!(parse_document("query ($a: Int = $b) { jobs { id } }").is_err());
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse_document("{ job(id: \"2) { id } }").unwrap_err();
        assert_eq!(err.message, "Unterminated string.");
    }

    #[test]
    fn test_deep_selection_is_rejected() {
        let source = format!("{}{}", "{ a ".repeat(10_000), "}".repeat(10_000));
        let err = parse_document(&source).unwrap_err();
        assert_eq!(err.message, "Query nesting exceeds maximum depth");
    }

    #[test]
    fn test_deep_literals_and_types_are_rejected() {
        let list = format!(
            "{{ job(id: 1, x: {}{}) {{ id }} }}",
            "[".repeat(10_000),
            "]".repeat(10_000)
        );
        assert!(parse_document(&list).is_err());

        let object = format!(
            "{{ job(id: 1, x: {}1{}) {{ id }} }}",
            "{ k: ".repeat(10_000),
            "}".repeat(10_000)
        );
        assert!(parse_document(&object).is_err());

        let list_type = format!(
            "query ($v: {}Int{}) {{ jobs {{ id }} }}",
            "[".repeat(10_000),
            "]".repeat(10_000)
        );
        assert!(parse_document(&list_type).is_err());
    }

    #[test]
    fn test_moderate_nesting_still_parses() {
        let source = format!(
            "{{ job(id: 1, x: {}1{}) {{ id }} }}",
            "[".repeat(20),
            "]".repeat(20)
        );
        assert!(parse_document(&source).is_ok());
    }
}
