//! Monotone span program cryptex: an arbitrary monotone access structure
//! over named roles.
//!
//! The predicate is a Boolean expression over role names with `&`, `|`, and
//! parentheses. Sharing is the monotone-formula realization of a span
//! program: AND gates XOR-split the incoming value, OR gates replicate it,
//! and each leaf occurrence deposits one part with its role. A role's input
//! slot packs its parts as a framed chunk list. Any authorized subset of
//! role inputs recovers the secret; unauthorized subsets learn nothing
//! beyond part lengths.

use super::CryptexError;
use crate::crypto::{random_vec, xor_in_place};
use crate::wire::{pack_chunks, unpack_chunks};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Msp {
    pub comment: String,
    pub predicate: String,
    pub input_table: Vec<String>,
}

impl Msp {
    pub fn new(
        predicate: impl Into<String>,
        input_table: Vec<String>,
        comment: impl Into<String>,
    ) -> Result<Self, CryptexError> {
        let msp = Self {
            comment: comment.into(),
            predicate: predicate.into(),
            input_table,
        };
        let formula = msp.formula()?;
        for role in formula.roles() {
            if !msp.input_table.iter().any(|r| r == role) {
                return Err(CryptexError::InvalidState(format!(
                    "predicate role {role:?} missing from input table"
                )));
            }
        }
        Ok(msp)
    }

    fn formula(&self) -> Result<Formula, CryptexError> {
        parse_predicate(&self.predicate)
    }

    pub fn close(
        &self,
        inputs: &mut [Option<Vec<u8>>],
        secrets: &[Vec<u8>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != self.input_table.len() {
            return Err(CryptexError::Arity("one input per role required"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("MSP supports only a single secret"));
        }
        let formula = self.formula()?;

        let mut parts: HashMap<&str, Vec<Vec<u8>>> = self
            .input_table
            .iter()
            .map(|role| (role.as_str(), Vec::new()))
            .collect();
        distribute(&formula, &secrets[0], &mut parts);

        for (slot, role) in inputs.iter_mut().zip(&self.input_table) {
            *slot = Some(pack_chunks(&parts[role.as_str()]));
        }
        Ok(())
    }

    pub fn open(
        &self,
        secrets: &mut [Vec<u8>],
        inputs: &[Option<Vec<u8>>],
    ) -> Result<(), CryptexError> {
        if inputs.len() != self.input_table.len() {
            return Err(CryptexError::Arity("one input per role required"));
        }
        if secrets.len() != 1 {
            return Err(CryptexError::Arity("MSP supports only a single secret"));
        }
        let formula = self.formula()?;

        let mut available: HashMap<&str, Vec<Vec<u8>>> = HashMap::new();
        for (input, role) in inputs.iter().zip(&self.input_table) {
            let Some(data) = input else { continue };
            if data.is_empty() {
                continue;
            }
            available.insert(role.as_str(), unpack_chunks(data)?);
        }

        let mut counters: HashMap<&str, usize> = HashMap::new();
        let secret = recover(&formula, &available, &mut counters)
            .ok_or(CryptexError::Unsatisfied("inputs do not satisfy the predicate"))?;

        secrets[0] = secret;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Formula {
    Role(String),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    fn roles(&self) -> Vec<&str> {
        match self {
            Self::Role(name) => vec![name.as_str()],
            Self::And(children) | Self::Or(children) => {
                children.iter().flat_map(Formula::roles).collect()
            }
        }
    }
}

/// Deposit `secret` (or a fresh split of it) at every leaf in traversal
/// order.
fn distribute(formula: &Formula, secret: &[u8], parts: &mut HashMap<&str, Vec<Vec<u8>>>) {
    match formula {
        Formula::Role(name) => {
            parts
                .get_mut(name.as_str())
                .expect("roles validated against input table")
                .push(secret.to_vec());
        }
        Formula::And(children) => {
            let mut last = secret.to_vec();
            for child in &children[..children.len() - 1] {
                let pad = random_vec(secret.len());
                xor_in_place(&mut last, &pad);
                distribute(child, &pad, parts);
            }
            distribute(children.last().expect("and gate has children"), &last, parts);
        }
        Formula::Or(children) => {
            for child in children {
                distribute(child, secret, parts);
            }
        }
    }
}

/// Walk the whole formula (no short-circuiting, so part indices stay in
/// lock-step with distribution) and reassemble the secret where possible.
fn recover<'a>(
    formula: &'a Formula,
    available: &HashMap<&str, Vec<Vec<u8>>>,
    counters: &mut HashMap<&'a str, usize>,
) -> Option<Vec<u8>> {
    match formula {
        Formula::Role(name) => {
            let index = counters.entry(name.as_str()).or_insert(0);
            let part = available
                .get(name.as_str())
                .and_then(|parts| parts.get(*index))
                .cloned();
            *index += 1;
            part
        }
        Formula::And(children) => {
            let recovered: Vec<Option<Vec<u8>>> = children
                .iter()
                .map(|child| recover(child, available, counters))
                .collect();

            let mut out: Option<Vec<u8>> = None;
            for part in recovered {
                let part = part?;
                match &mut out {
                    None => out = Some(part),
                    Some(acc) => {
                        if acc.len() != part.len() {
                            return None;
                        }
                        xor_in_place(acc, &part);
                    }
                }
            }
            out
        }
        Formula::Or(children) => {
            let recovered: Vec<Option<Vec<u8>>> = children
                .iter()
                .map(|child| recover(child, available, counters))
                .collect();
            recovered.into_iter().flatten().next()
        }
    }
}

fn parse_predicate(predicate: &str) -> Result<Formula, CryptexError> {
    let tokens = tokenize(predicate)?;
    let mut parser = PredicateParser { tokens, pos: 0 };
    let formula = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(CryptexError::InvalidState(format!(
            "unexpected trailing input in predicate {predicate:?}"
        )));
    }
    Ok(formula)
}

#[derive(Debug, PartialEq)]
enum Token {
    Name(String),
    And,
    Or,
    Open,
    Close,
}

fn tokenize(predicate: &str) -> Result<Vec<Token>, CryptexError> {
    let mut tokens = Vec::new();
    let mut chars = predicate.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '&' => {
                chars.next();
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Or);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            c if is_role_char(c) => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !is_role_char(c) {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Name(predicate[start..end].to_string()));
            }
            c => {
                return Err(CryptexError::InvalidState(format!(
                    "invalid character {c:?} in predicate"
                )));
            }
        }
    }
    Ok(tokens)
}

fn is_role_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-')
}

struct PredicateParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl PredicateParser {
    fn expr(&mut self) -> Result<Formula, CryptexError> {
        let mut terms = vec![self.term()?];
        while self.eat(&Token::Or) {
            terms.push(self.term()?);
        }
        Ok(if terms.len() == 1 {
            terms.pop().expect("one term")
        } else {
            Formula::Or(terms)
        })
    }

    fn term(&mut self) -> Result<Formula, CryptexError> {
        let mut factors = vec![self.factor()?];
        while self.eat(&Token::And) {
            factors.push(self.factor()?);
        }
        Ok(if factors.len() == 1 {
            factors.pop().expect("one factor")
        } else {
            Formula::And(factors)
        })
    }

    fn factor(&mut self) -> Result<Formula, CryptexError> {
        match self.tokens.get(self.pos) {
            Some(Token::Name(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(Formula::Role(name))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.expr()?;
                if !self.eat(&Token::Close) {
                    return Err(CryptexError::InvalidState(
                        "unbalanced parenthesis in predicate".into(),
                    ));
                }
                Ok(inner)
            }
            _ => Err(CryptexError::InvalidState("malformed predicate".into())),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}
