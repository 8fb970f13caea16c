use std::ops::Range;

use crate::code::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Form tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Number(f64),
    Text(String),
    Symbol(String),
}

/// One node of the raw parenthesised tree, before any keyword is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Atom(Atom, Range<usize>),
    List(Vec<Form>, Range<usize>),
}

impl Form {
    pub fn span(&self) -> Range<usize> {
        match self {
            Form::Atom(_, span) | Form::List(_, span) => span.clone(),
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Form::Atom(Atom::Symbol(s), _) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Form::Atom(Atom::Text(s), _) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Form]> {
        match self {
            Form::List(items, _) => Some(items),
            _ => None,
        }
    }

    /// Head symbol of a list form: `(head ...)`.
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read every top-level form of `source`.
pub fn read_forms(source: &str, file_id: usize) -> Result<Vec<Form>, ParseError> {
    let mut reader = Reader {
        source,
        pos: 0,
        file_id,
    };
    let mut forms = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.at_end() {
            return Ok(forms);
        }
        forms.push(reader.form()?);
    }
}

struct Reader<'a> {
    source: &'a str,
    pos: usize,
    file_id: usize,
}

impl Reader<'_> {
    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>, span: Range<usize>) -> ParseError {
        ParseError::new(self.file_id, span, message)
    }

    fn form(&mut self) -> Result<Form, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some('(') => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.peek() {
                        Some(')') => {
                            self.bump();
                            return Ok(Form::List(items, start..self.pos));
                        }
                        Some(_) => items.push(self.form()?),
                        None => {
                            return Err(self
                                .error("unclosed list", start..start + 1)
                                .with_note("every `(` needs a matching `)`"));
                        }
                    }
                }
            }
            Some(')') => Err(self.error("unexpected `)`", start..start + 1)),
            Some('"') => self.string(),
            Some(_) => Ok(self.word()),
            None => Err(self.error("unexpected end of input", start..start)),
        }
    }

    fn string(&mut self) -> Result<Form, ParseError> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Form::Atom(Atom::Text(text), start..self.pos)),
                Some('\\') => {
                    let escape_start = self.pos - 1;
                    match self.bump() {
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('r') => text.push('\r'),
                        Some(other) => {
                            return Err(self.error(
                                format!("unknown escape `\\{other}`"),
                                escape_start..self.pos,
                            ));
                        }
                        None => break,
                    }
                }
                Some(c) => text.push(c),
                None => break,
            }
        }
        Err(self.error("unterminated string", start..self.pos))
    }

    fn word(&mut self) -> Form {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                break;
            }
            self.bump();
        }
        let span = start..self.pos;
        let word = &self.source[span.clone()];
        match parse_number(word) {
            Some(n) => Form::Atom(Atom::Number(n), span),
            None => Form::Atom(Atom::Symbol(word.to_string()), span),
        }
    }
}

/// Numbers start with a digit, or with a sign or dot followed by a digit.
/// Bare `-`, `+` and friends stay symbols.
fn parse_number(word: &str) -> Option<f64> {
    let mut chars = word.chars();
    let first = chars.next()?;
    let numeric_start = first.is_ascii_digit()
        || (matches!(first, '-' | '+' | '.') && chars.next().is_some_and(|c| c.is_ascii_digit() || c == '.'));
    if !numeric_start {
        return None;
    }
    word.parse::<f64>().ok()
}
