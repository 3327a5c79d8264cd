//! Recursive-descent parser for the filter language.

use super::{Comparator, Filter, FilterError, FilterLeaf, FilterNode};

/// Parse a complete filter expression.
pub(crate) fn parse(text: &str) -> Result<Filter, FilterError> {
    let mut parser = Parser::new(text);
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(FilterError::Empty);
    }
    let root = parser.parse_filter()?;
    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(FilterError::Trailing { pos: parser.pos });
    }
    Ok(Filter::from_parts(text.trim().to_string(), root))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(text: &str) -> Parser {
        Parser {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), FilterError> {
        match self.peek() {
            Some(ch) if ch == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(ch) => Err(FilterError::Unexpected { ch, pos: self.pos }),
            None => Err(FilterError::Unterminated),
        }
    }

    /// `filter := '(' ( '&' filter* | '|' filter* | '!' filter | comparison ) ')'`
    fn parse_filter(&mut self) -> Result<FilterNode, FilterError> {
        self.expect('(')?;
        self.skip_whitespace();
        let node = match self.peek() {
            Some('&') => {
                self.pos += 1;
                FilterNode::And(self.parse_filter_list()?)
            }
            Some('|') => {
                self.pos += 1;
                FilterNode::Or(self.parse_filter_list()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_whitespace();
                FilterNode::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => FilterNode::Leaf(self.parse_comparison()?),
            None => return Err(FilterError::Unterminated),
        };
        self.skip_whitespace();
        self.expect(')')?;
        Ok(node)
    }

    fn parse_filter_list(&mut self) -> Result<Vec<FilterNode>, FilterError> {
        let mut kids = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('(') => kids.push(self.parse_filter()?),
                _ => return Ok(kids),
            }
        }
    }

    /// `comparison := attribute ( '=' | '>=' | '<=' ) operand`
    fn parse_comparison(&mut self) -> Result<FilterLeaf, FilterError> {
        let attr_start = self.pos;
        let mut attribute = String::new();
        loop {
            match self.peek() {
                Some('=') | Some('<') | Some('>') => break,
                Some(ch @ ('(' | ')')) => {
                    return Err(FilterError::Unexpected { ch, pos: self.pos });
                }
                Some(ch) => {
                    attribute.push(ch);
                    self.pos += 1;
                }
                None => return Err(FilterError::Unterminated),
            }
        }
        let attribute = attribute.trim_end().to_string();
        if attribute.is_empty() {
            return Err(FilterError::EmptyAttribute { pos: attr_start });
        }

        let comparator = match self.advance() {
            Some('=') => None,
            Some('>') => {
                self.expect('=')?;
                Some(Comparator::GreaterEq)
            }
            Some('<') => {
                self.expect('=')?;
                Some(Comparator::LessEq)
            }
            _ => return Err(FilterError::Unterminated),
        };

        self.parse_operand(comparator)
            .map(|(comparator, value)| FilterLeaf {
                attribute,
                comparator,
                value,
            })
    }

    /// Consume the operand up to the closing parenthesis. Backslash escapes
    /// the next character; an unescaped `*` is a wildcard, which is only
    /// legal with `=`.
    fn parse_operand(
        &mut self,
        ordering: Option<Comparator>,
    ) -> Result<(Comparator, String), FilterError> {
        let raw_start = self.pos;
        let mut segments: Vec<String> = vec![String::new()];
        let mut wildcards = 0usize;
        loop {
            match self.peek() {
                Some(')') => break,
                Some('(') => {
                    return Err(FilterError::Unexpected { ch: '(', pos: self.pos });
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.advance() {
                        Some(escaped) => segments.last_mut().unwrap().push(escaped),
                        None => return Err(FilterError::Unterminated),
                    }
                }
                Some('*') => {
                    if ordering.is_some() {
                        return Err(FilterError::Unexpected { ch: '*', pos: self.pos });
                    }
                    wildcards += 1;
                    segments.push(String::new());
                    self.pos += 1;
                }
                Some(ch) => {
                    segments.last_mut().unwrap().push(ch);
                    self.pos += 1;
                }
                None => return Err(FilterError::Unterminated),
            }
        }
        let raw: String = self.chars[raw_start..self.pos].iter().collect();

        if let Some(comparator) = ordering {
            return Ok((comparator, segments.remove(0)));
        }
        if wildcards == 0 {
            return Ok((Comparator::Equal, segments.remove(0)));
        }
        if wildcards == 1 && segments.iter().all(String::is_empty) {
            return Ok((Comparator::Present, "*".to_string()));
        }
        Ok((Comparator::Substring(segments), raw))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
