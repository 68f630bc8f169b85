//! Training examples.
//!
//! An example file holds blocks of ground facts separated by lines starting with
//! `---`. Each block is one example:
//!
//! ```text
//! evidence(rain, true).
//! observe(\+umbrella).
//! utility(-10).
//! ---
//! evidence(rain, false).
//! utility(0).
//! ```
//!
//! Observations are written as `evidence(a, true)`, `evidence(a, false)`,
//! `evidence(a)`, `evidence(\+a)`, `observe(a)` or `observe(\+a)`. The target
//! expected utility is `utility(N)`; when several are present the first one counts.
//! Other clauses are ignored. Blocks without observations are dropped, and a block
//! with observations but no utility is an error.

use std::fs;
use std::path::Path;

use log::debug;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::key::Key;
use crate::report::{Diagnostic, Reporter};

/// An example over symbolic atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub observations: Vec<(String, bool)>,
    pub utility: f64,
}

impl Example {
    pub fn new(observations: Vec<(String, bool)>, utility: f64) -> Self {
        Self { observations, utility }
    }

    /// Translates the observations into circuit keys.
    ///
    /// Observed atoms that do not occur in `circuit` are reported and skipped.
    pub fn translate<C: Circuit>(&self, circuit: &C, reporter: &dyn Reporter) -> ProcessedExample {
        let mut evidence = Vec::with_capacity(self.observations.len());
        for (name, value) in &self.observations {
            match circuit.get_node_by_name(name) {
                Some(key) => evidence.push((key, *value)),
                None => reporter.report(Diagnostic::UnresolvedAtom { name: name.clone() }),
            }
        }
        ProcessedExample {
            evidence,
            utility: self.utility,
        }
    }
}

/// An example over circuit keys.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedExample {
    pub evidence: Vec<(Key, bool)>,
    pub utility: f64,
}

/// A ground clause `head(args).` with the line it starts on.
#[derive(Debug, Clone, PartialEq)]
struct Fact<'t> {
    line: usize,
    head: &'t str,
    args: Vec<&'t str>,
}

/// Splits `text` into clauses terminated by a `.` outside parentheses that is
/// followed by whitespace or the end of the text. `%` starts a line comment.
fn facts(text: &str, first_line: usize) -> Result<Vec<Fact<'_>>> {
    let mut result = Vec::new();
    let mut line = first_line;
    let mut start: Option<(usize, usize)> = None;
    let mut depth = 0usize;
    let mut in_comment = false;
    let mut chars = text.char_indices().peekable();

    while let Some((i, ch)) = chars.next() {
        if ch == '\n' {
            line += 1;
            in_comment = false;
            continue;
        }
        if in_comment {
            continue;
        }
        match ch {
            '%' if depth == 0 => in_comment = true,
            c if c.is_whitespace() => {}
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| Error::Parse {
                    line,
                    message: "unbalanced ')'".into(),
                })?;
            }
            '.' if depth == 0 && chars.peek().map_or(true, |&(_, c)| c.is_whitespace()) => {
                if let Some((from, from_line)) = start.take() {
                    if let Some(fact) = fact(&text[from..i], from_line)? {
                        result.push(fact);
                    }
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() && !ch.is_whitespace() && !in_comment {
            start = Some((i, line));
        }
    }

    if let Some((from, from_line)) = start {
        let rest = text[from..].trim();
        if !rest.is_empty() && !rest.starts_with('%') {
            return Err(Error::Parse {
                line: from_line,
                message: format!("clause is not terminated by '.': {}", rest),
            });
        }
    }
    Ok(result)
}

fn fact(clause: &str, line: usize) -> Result<Option<Fact<'_>>> {
    let clause = clause.trim();
    let Some(open) = clause.find('(') else {
        return Ok(None);
    };
    if !clause.ends_with(')') {
        // A rule or a compound we do not interpret.
        return Ok(None);
    }
    let head = clause[..open].trim();
    let inner = &clause[open + 1..clause.len() - 1];

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut from = 0;
    for (i, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                args.push(inner[from..i].trim());
                from = i + 1;
            }
            _ => {}
        }
    }
    args.push(inner[from..].trim());
    if args.iter().any(|a| a.is_empty()) {
        return Err(Error::Parse {
            line,
            message: format!("empty argument in {}", clause),
        });
    }
    Ok(Some(Fact { line, head, args }))
}

/// `\+atom` or `atom`, returning the atom and whether it is asserted true.
fn signed_atom(arg: &str) -> (String, bool) {
    match arg.strip_prefix("\\+") {
        Some(rest) => (rest.trim().to_string(), false),
        None => (arg.to_string(), true),
    }
}

fn evidence_of(facts: &[Fact<'_>]) -> Result<Vec<(String, bool)>> {
    let mut observations = Vec::new();
    for fact in facts {
        match (fact.head, fact.args.as_slice()) {
            ("evidence", [atom, value]) => {
                let value = match *value {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(Error::Parse {
                            line: fact.line,
                            message: format!("evidence value must be true or false, found {}", other),
                        })
                    }
                };
                observations.push((atom.to_string(), value));
            }
            ("evidence", [atom]) | ("observe", [atom]) => observations.push(signed_atom(atom)),
            _ => {}
        }
    }
    Ok(observations)
}

fn utility_of(facts: &[Fact<'_>]) -> Result<Option<f64>> {
    let Some(fact) = facts.iter().find(|f| f.head == "utility" && f.args.len() == 1) else {
        return Ok(None);
    };
    let value = fact.args[0].parse().map_err(|_| Error::Parse {
        line: fact.line,
        message: format!("utility must be a number, found {}", fact.args[0]),
    })?;
    Ok(Some(value))
}

/// All observations of a block of facts, in order.
pub fn extract_evidence(block: &str) -> Result<Vec<(String, bool)>> {
    evidence_of(&facts(block, 1)?)
}

/// The first `utility(N)` of a block of facts, if any.
pub fn extract_utility(block: &str) -> Result<Option<f64>> {
    utility_of(&facts(block, 1)?)
}

/// Parses every example block of `text`.
pub fn parse_examples(text: &str) -> Result<Vec<Example>> {
    let mut examples = Vec::new();
    let mut block = String::new();
    let mut block_line = 1;
    let mut index = 0;

    let mut flush = |block: &str, first_line: usize, index: usize| -> Result<()> {
        let facts = facts(block, first_line)?;
        let observations = evidence_of(&facts)?;
        if observations.is_empty() {
            debug!("example block {} has no observations, dropped", index);
            return Ok(());
        }
        let utility = utility_of(&facts)?.ok_or(Error::MissingUtility { block: index })?;
        examples.push(Example::new(observations, utility));
        Ok(())
    };

    for (i, line) in text.lines().enumerate() {
        if line.trim().starts_with("---") {
            flush(&block, block_line, index)?;
            block.clear();
            block_line = i + 2;
            index += 1;
        } else {
            block.push_str(line);
            block.push('\n');
        }
    }
    if !block.trim().is_empty() {
        flush(&block, block_line, index)?;
    }
    Ok(examples)
}

/// Reads and concatenates the examples of every file.
pub fn read_examples<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Example>> {
    let mut examples = Vec::new();
    for path in paths {
        let text = fs::read_to_string(path)?;
        examples.extend(parse_examples(&text)?);
    }
    Ok(examples)
}
