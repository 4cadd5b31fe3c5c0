//! Scanner for the sectioned plan-config language.
//!
//! The grammar, ported rule-for-rule from the original PEG:
//!
//! ```text
//! Grammar        <- RootSection? (SpaceComment / Section)+
//! RootSection    <- SpaceComment* ValueLine+
//! Section        <- Space* '[' Space* Identifier (Space+ '"' QuotedIdentifier '"')? Space* ']'
//!                   SpaceComment? (ValueLine / ValueMultiLine)*
//! ValueLine      <- Space* Identifier Space* '=' Space* Value SpaceComment
//! Value          <- Word (Space+ Word)*
//! ValueMultiLine <- Space* Identifier Space* '=' Space* '"' (!'"' .)+ '"' SpaceComment
//! Identifier     <- [A-Za-z0-9_.@-]+
//! Word           <- (![ \t\r\n#"] .)+
//! ```
//!
//! Comments run from `#` to end of line. A section with no quoted id uses
//! its type as its id. Repeated keys accumulate in order.

use super::ConfigError;

/// One `[type "id"]` block (or the headerless root block) with its ordered
/// key/value pairs.
#[derive(Debug, PartialEq, Eq)]
pub struct Section {
    pub stype: String,
    pub id: String,
    pub values: Vec<(String, String)>,
}

impl Section {
    fn new(stype: impl Into<String>) -> Self {
        let stype = stype.into();
        Self {
            stype: stype.clone(),
            id: stype,
            values: Vec::new(),
        }
    }
}

pub fn parse(data: &str) -> Result<Vec<Section>, ConfigError> {
    Scanner {
        data: data.as_bytes(),
        pos: 0,
        line: 1,
    }
    .sections()
}

struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn sections(mut self) -> Result<Vec<Section>, ConfigError> {
        let mut sections = vec![Section::new("")];

        loop {
            self.skip_space_and_comments();
            match self.peek() {
                None => break,
                Some(b'[') => sections.push(self.section_header()?),
                Some(_) => {
                    let (key, value) = self.value_line()?;
                    sections
                        .last_mut()
                        .expect("root section always present")
                        .values
                        .push((key, value));
                }
            }
        }
        Ok(sections)
    }

    fn section_header(&mut self) -> Result<Section, ConfigError> {
        self.expect(b'[')?;
        self.skip_spaces();
        let stype = self.identifier()?;
        self.skip_spaces();

        let mut section = Section::new(stype);
        if self.peek() == Some(b'"') {
            self.expect(b'"')?;
            section.id = self.quoted_identifier()?;
            self.expect(b'"')?;
            self.skip_spaces();
        }
        self.expect(b']')?;
        Ok(section)
    }

    fn value_line(&mut self) -> Result<(String, String), ConfigError> {
        let key = self.identifier()?;
        self.skip_spaces();
        self.expect(b'=')?;
        self.skip_spaces();

        let value = if self.peek() == Some(b'"') {
            self.quoted_value()?
        } else {
            self.word_value()?
        };
        Ok((key, value))
    }

    /// `Word (Space+ Word)*`, captured as the trimmed source span.
    fn word_value(&mut self) -> Result<String, ConfigError> {
        let start = self.pos;
        let mut end = self.pos;
        loop {
            match self.peek() {
                Some(b'\n') | Some(b'\r') | Some(b'#') | Some(b'"') | None => break,
                Some(b' ') | Some(b'\t') => {
                    self.pos += 1;
                }
                Some(_) => {
                    self.pos += 1;
                    end = self.pos;
                }
            }
        }
        if end == start {
            return Err(self.error("expected a value"));
        }
        Ok(self.span(start, end))
    }

    /// `'"' (!'"' .)+ '"'`, newlines included.
    fn quoted_value(&mut self) -> Result<String, ConfigError> {
        self.expect(b'"')?;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated quoted value")),
                Some(b'"') => break,
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
        let end = self.pos;
        self.expect(b'"')?;
        if end == start {
            return Err(self.error("empty quoted value"));
        }
        Ok(self.span(start, end))
    }

    fn identifier(&mut self) -> Result<String, ConfigError> {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_byte) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.span(start, self.pos))
    }

    fn quoted_identifier(&mut self) -> Result<String, ConfigError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| is_identifier_byte(b) || b == b' ')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.span(start, self.pos))
    }

    fn skip_space_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => self.pos += 1,
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(b'#') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                _ => return,
            }
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), ConfigError> {
        if self.peek() != Some(byte) {
            return Err(self.error(&format!("expected {:?}", byte as char)));
        }
        self.pos += 1;
        Ok(())
    }

    fn span(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.data[start..end]).into_owned()
    }

    fn error(&self, msg: &str) -> ConfigError {
        ConfigError::Parse {
            line: self.line,
            msg: msg.to_string(),
        }
    }
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'@' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DIAMOND_PLAN_CONFIG;

    fn values(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn diamond_config_parses_into_sections() {
        let sections = parse(DIAMOND_PLAN_CONFIG).unwrap();

        assert_eq!(sections[0].stype, "");
        assert_eq!(
            sections[0].values,
            values(&[("comment", "Diamond shaped plan"), ("root", "top")])
        );

        let top = &sections[1];
        assert_eq!(top.stype, "secretbox");
        assert_eq!(top.id, "top");
        assert_eq!(
            top.values,
            values(&[("comment", "step 3"), ("edge", "top password"), ("edge", "mux")])
        );

        // an id-less section takes its type as id
        let mux = &sections[2];
        assert_eq!((mux.stype.as_str(), mux.id.as_str()), ("mux", "mux"));

        let material = sections.last().unwrap();
        assert_eq!(material.stype, "material");
        assert_eq!(material.id, "bottom material");
        assert!(material.values.is_empty());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let sections = parse(
            "# leading comment\nroot = x # trailing comment\n\n[secretbox \"x\"] # section comment\nedge = y\n",
        )
        .unwrap();
        assert_eq!(sections[0].values, values(&[("root", "x")]));
        assert_eq!(sections[1].values, values(&[("edge", "y")]));
    }

    #[test]
    fn quoted_values_may_span_lines() {
        let sections = parse("root = k\n[rsa \"k\"]\npkix-key = \"line one\nline two\"\n").unwrap();
        assert_eq!(
            sections[1].values,
            values(&[("pkix-key", "line one\nline two")])
        );
    }

    #[test]
    fn multi_word_values_keep_interior_spacing() {
        let sections = parse("root = op 1 key\n[secretbox \"op 1 key\"]\n").unwrap();
        assert_eq!(sections[0].values, values(&[("root", "op 1 key")]));
    }

    #[test]
    fn parse_errors_carry_line_numbers() {
        let err = parse("root = x\n[secretbox \"unterminated\n").unwrap_err();
        let ConfigError::Parse { line, .. } = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert_eq!(line, 2);
    }

    #[test]
    fn missing_value_is_an_error() {
        assert!(parse("root =\n").is_err());
        assert!(parse("= x\n").is_err());
    }
}
