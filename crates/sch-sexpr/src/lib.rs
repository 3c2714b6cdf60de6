//! A small S-expression parser and formatter.
//!
//! This is the wire format used by schematic library elements and clipboard
//! payloads. Trees are built programmatically with [`ListBuilder`] and
//! rendered with [`formatter::format_tree`], which produces deterministic
//! output (stable field order in, stable text out) so that serialized
//! payloads are diff-stable and parse-stable.

pub mod formatter;

use std::fmt;

/// Find a direct child list `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    for item in items {
        if let Some(list_items) = item.as_list() {
            if list_items.first().and_then(Sexpr::as_sym) == Some(name) {
                return Some(list_items);
            }
        }
    }
    None
}

/// Find all direct child lists `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_all_child_lists<'a>(items: &'a [Sexpr], name: &str) -> Vec<&'a [Sexpr]> {
    let mut result = Vec::new();
    for item in items {
        if let Some(list_items) = item.as_list() {
            if list_items.first().and_then(Sexpr::as_sym) == Some(name) {
                result.push(list_items);
            }
        }
    }
    result
}

/// An S-expression value.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    /// A symbol - unquoted identifier
    Symbol(String),
    /// A string - quoted text
    String(String),
    /// An integer value
    Int(i64),
    /// A floating-point value
    F64(f64),
    /// A list of S-expressions
    List(Vec<Sexpr>),
}

impl Sexpr {
    /// Create a symbol (unquoted atom)
    pub fn symbol(s: impl Into<String>) -> Self {
        Sexpr::Symbol(s.into())
    }

    /// Create a string (quoted atom)
    pub fn string(s: impl Into<String>) -> Self {
        Sexpr::String(s.into())
    }

    /// Create an integer
    pub fn int(n: i64) -> Self {
        Sexpr::Int(n)
    }

    /// Create a float
    pub fn float(f: f64) -> Self {
        Sexpr::F64(f)
    }

    /// Create a list from a vector of S-expressions
    pub fn list(items: Vec<Sexpr>) -> Self {
        Sexpr::List(items)
    }

    /// Check if this is a list
    pub fn is_list(&self) -> bool {
        matches!(self, Sexpr::List(_))
    }

    /// Get the atom value if this is an atom (symbol or string)
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(s) | Sexpr::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the symbol name if this is a symbol
    pub fn as_sym(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Get the string content if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexpr::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Sexpr::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the float value if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Sexpr::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Coerce a number atom into f64.
    ///
    /// Whole numbers may be written as ints by the formatter, so numeric
    /// fields must accept both forms when reading back.
    pub fn as_number(&self) -> Option<f64> {
        self.as_float().or_else(|| self.as_int().map(|v| v as f64))
    }

    /// Get the list items if this is a list
    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get mutable access to list items if this is a list
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        match self {
            Sexpr::List(items) => Some(items),
            _ => None,
        }
    }

    /// Find a child list with the given name (first element)
    pub fn find_list(&self, name: &str) -> Option<&[Sexpr]> {
        find_child_list(self.as_list()?, name)
    }

    /// Find all child lists with the given name
    pub fn find_all_lists(&self, name: &str) -> Vec<&[Sexpr]> {
        self.as_list()
            .map(|items| find_all_child_lists(items, name))
            .unwrap_or_default()
    }

    /// Get the tag (first element symbol) if this is a tagged list
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }
}

/// Create a key-value pair list
pub fn kv<K: Into<String>, V: Into<Sexpr>>(k: K, v: V) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(k), v.into()])
}

/// A builder for constructing lists incrementally
#[derive(Debug, Default)]
pub struct ListBuilder {
    items: Vec<Sexpr>,
}

impl ListBuilder {
    /// Create a new builder with a node name
    pub fn node<N: Into<Sexpr>>(name: N) -> Self {
        Self {
            items: vec![name.into()],
        }
    }

    /// Create an empty builder
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Push a value to the list
    pub fn push<V: Into<Sexpr>>(&mut self, v: V) -> &mut Self {
        self.items.push(v.into());
        self
    }

    /// Conditionally push a value to the list
    pub fn push_if<V: Into<Sexpr>>(&mut self, cond: bool, v: V) -> &mut Self {
        if cond {
            self.items.push(v.into());
        }
        self
    }

    /// Extend the list with an iterator of values
    pub fn extend<I, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Sexpr>,
    {
        self.items.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Build the final list
    pub fn build(self) -> Sexpr {
        Sexpr::list(self.items)
    }
}

/// From implementations for automatic conversion
impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Self::symbol(s)
    }
}

impl From<String> for Sexpr {
    fn from(s: String) -> Self {
        Self::symbol(s)
    }
}

impl From<i64> for Sexpr {
    fn from(n: i64) -> Self {
        Sexpr::int(n)
    }
}

impl From<u32> for Sexpr {
    fn from(n: u32) -> Self {
        Sexpr::int(n as i64)
    }
}

impl From<f64> for Sexpr {
    fn from(n: f64) -> Self {
        Sexpr::float(n)
    }
}

impl From<bool> for Sexpr {
    fn from(b: bool) -> Self {
        Self::symbol(if b { "yes" } else { "no" })
    }
}

/// Parser for S-expressions
pub struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Parser {
            input,
            chars: input.char_indices().peekable(),
            current_pos: 0,
        }
    }

    /// Parse the input and return the S-expression
    pub fn parse(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_whitespace();
        if self.is_at_end() {
            return Err(ParseError::UnexpectedEof);
        }

        if self.peek_char() == Some('(') {
            self.parse_list()
        } else {
            self.parse_atom()
        }
    }

    fn parse_list(&mut self) -> Result<Sexpr, ParseError> {
        self.expect('(')?;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();

            if self.is_at_end() {
                return Err(ParseError::UnclosedList);
            }

            if self.peek_char() == Some(')') {
                self.advance();
                break;
            }

            items.push(self.parse()?);
        }

        Ok(Sexpr::List(items))
    }

    fn parse_atom(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_whitespace();

        if self.peek_char() == Some('"') {
            return self.parse_string();
        }

        let start = self.current_pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            self.advance();
        }

        if self.current_pos == start {
            return Err(ParseError::EmptyAtom);
        }

        let atom_str = &self.input[start..self.current_pos];

        // Numbers first, everything else is a symbol
        if let Ok(int_val) = atom_str.parse::<i64>() {
            Ok(Sexpr::Int(int_val))
        } else if let Ok(float_val) = atom_str.parse::<f64>() {
            Ok(Sexpr::F64(float_val))
        } else {
            Ok(Sexpr::Symbol(atom_str.to_string()))
        }
    }

    fn parse_string(&mut self) -> Result<Sexpr, ParseError> {
        self.expect('"')?;
        let mut result = String::new();

        loop {
            match self.peek_char() {
                None => return Err(ParseError::UnterminatedString),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            result.push('\n');
                            self.advance();
                        }
                        Some('r') => {
                            result.push('\r');
                            self.advance();
                        }
                        Some('t') => {
                            result.push('\t');
                            self.advance();
                        }
                        Some('\\') => {
                            result.push('\\');
                            self.advance();
                        }
                        Some('"') => {
                            result.push('"');
                            self.advance();
                        }
                        Some(ch) => {
                            result.push(ch);
                            self.advance();
                        }
                        None => return Err(ParseError::UnterminatedString),
                    }
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Ok(Sexpr::String(result))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                // Skip comment until end of line
                self.advance();
                while let Some(ch) = self.peek_char() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn advance(&mut self) {
        if let Some((pos, ch)) = self.chars.next() {
            self.current_pos = pos + ch.len_utf8();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.peek_char() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            Some(ch) => Err(ParseError::UnexpectedChar(ch, expected)),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }
}

/// Parse a string into an S-expression
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("Parsing S-expression from {} bytes of input", input.len());
    let result = Parser::new(input).parse();
    if let Err(e) = &result {
        log::trace!("Failed to parse S-expression: {e:?}");
    }
    result
}

/// Errors that can occur during parsing
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedEof,
    UnexpectedChar(char, char),
    UnclosedList,
    UnterminatedString,
    EmptyAtom,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof => write!(f, "Unexpected end of input"),
            ParseError::UnexpectedChar(found, expected) => {
                write!(f, "Expected '{expected}', found '{found}'")
            }
            ParseError::UnclosedList => write!(f, "Unclosed list"),
            ParseError::UnterminatedString => write!(f, "Unterminated string"),
            ParseError::EmptyAtom => write!(f, "Empty atom"),
        }
    }
}

impl std::error::Error for ParseError {}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = formatter::format_tree(self);
        write!(f, "{}", formatted.trim_end_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_atom() {
        assert_eq!(parse("hello").unwrap(), Sexpr::Symbol("hello".to_string()));
        assert_eq!(parse("123").unwrap(), Sexpr::Int(123));
        assert_eq!(parse("3.15").unwrap(), Sexpr::F64(3.15));
        assert_eq!(
            parse("symbol-with-dashes").unwrap(),
            Sexpr::Symbol("symbol-with-dashes".to_string())
        );
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(
            parse("\"hello world\"").unwrap(),
            Sexpr::String("hello world".to_string())
        );
        assert_eq!(
            parse("\"with\\\"quotes\\\"\"").unwrap(),
            Sexpr::String("with\"quotes\"".to_string())
        );
        assert_eq!(
            parse("\"line\\nbreak\"").unwrap(),
            Sexpr::String("line\nbreak".to_string())
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse("()").unwrap(), Sexpr::List(vec![]));
        let parsed = parse("(a b c)").unwrap();
        if let Sexpr::List(items) = &parsed {
            assert_eq!(items.len(), 3);
            assert_eq!(items[0], Sexpr::Symbol("a".to_string()));
            assert_eq!(items[1], Sexpr::Symbol("b".to_string()));
            assert_eq!(items[2], Sexpr::Symbol("c".to_string()));
        } else {
            panic!("Expected a list");
        }
    }

    #[test]
    fn test_parse_nested() {
        let input = "(component (uuid \"x\") (name \"R1\"))";
        let result = parse(input).unwrap();
        assert_eq!(result.tag(), Some("component"));
        let name = result.find_list("name").unwrap();
        assert_eq!(name[1].as_str(), Some("R1"));
    }

    #[test]
    fn test_parse_comment() {
        let input = "(a ; trailing comment\n b)";
        let result = parse(input).unwrap();
        assert_eq!(result.as_list().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse(""), Err(ParseError::UnexpectedEof));
        assert_eq!(parse("(a b"), Err(ParseError::UnclosedList));
        assert_eq!(parse("\"abc"), Err(ParseError::UnterminatedString));
    }

    #[test]
    fn test_non_ascii_strings() {
        let parsed = parse("(name \"Widerstand Ω µ\")").unwrap();
        let name = parsed.find_list("name").unwrap();
        assert_eq!(name[1].as_str(), Some("Widerstand Ω µ"));
    }

    #[test]
    fn test_list_builder() {
        let mut b = ListBuilder::node("position");
        b.push(1i64).push(2i64).push_if(false, "never");
        assert_eq!(
            b.build(),
            Sexpr::list(vec![Sexpr::symbol("position"), Sexpr::int(1), Sexpr::int(2)])
        );
    }

    #[test]
    fn test_find_all_lists() {
        let parsed = parse("(root (item 1) (other 2) (item 3))").unwrap();
        let items = parsed.find_all_lists("item");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0][1].as_int(), Some(1));
        assert_eq!(items[1][1].as_int(), Some(3));
    }
}
