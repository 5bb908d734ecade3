use std::collections::HashMap;
use std::ops::Range;

use regex::Regex;
use thiserror::Error;

use super::grammars;

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("unknown language `{0}`")]
    UnknownLanguage(String),
    #[error("invalid pattern for `{class}`: {source}")]
    Pattern {
        class: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// A styled run of code, in character offsets from the start of the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub range: Range<usize>,
    pub class: &'static str,
}

/// An ordered list of patterns, each mapped to a style class. At any
/// position the earliest-listed pattern that matches wins.
#[derive(Debug, Clone)]
pub struct Grammar {
    name: &'static str,
    aliases: &'static [&'static str],
    combined: Regex,
    /// Style class and capture group of each rule in `combined`.
    groups: Vec<(&'static str, usize)>,
}

impl Grammar {
    pub fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        rules: &[(&'static str, &str)],
    ) -> Result<Grammar, HighlightError> {
        let mut groups = Vec::with_capacity(rules.len());
        let mut alternatives = Vec::with_capacity(rules.len());
        let mut next_group = 1;
        for &(class, pattern) in rules {
            let own = Regex::new(pattern).map_err(|source| HighlightError::Pattern { class, source })?;
            groups.push((class, next_group));
            // the wrapping group takes the place of the rule's implicit group 0
            next_group += own.captures_len();
            alternatives.push(format!("({pattern})"));
        }
        let combined = Regex::new(&alternatives.join("|")).map_err(|source| HighlightError::Pattern {
            class: "combined",
            source,
        })?;
        Ok(Grammar {
            name,
            aliases,
            combined,
            groups,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    /// Splits `code` into styled spans. Unmatched text gets no span.
    pub fn tokenize(&self, code: &str) -> Vec<Span> {
        let mut spans = Vec::new();
        let (mut byte, mut char_pos) = (0, 0);
        for caps in self.combined.captures_iter(code) {
            let Some(whole) = caps.get(0).filter(|m| !m.is_empty()) else {
                continue;
            };
            let Some(&(class, _)) = self.groups.iter().find(|(_, g)| caps.get(*g).is_some()) else {
                continue;
            };
            char_pos += code[byte..whole.start()].chars().count();
            let len = whole.as_str().chars().count();
            spans.push(Span {
                range: char_pos..char_pos + len,
                class,
            });
            char_pos += len;
            byte = whole.end();
        }
        spans
    }
}

/// Grammars by name and alias, passed explicitly to whatever highlights.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    grammars: Vec<Grammar>,
    by_name: HashMap<String, usize>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in grammar.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for grammar in grammars::builtins() {
            registry.register(grammar.clone());
        }
        registry
    }

    /// The named built-in grammars only. An empty list means all of them.
    pub fn builtin(names: &[impl AsRef<str>]) -> Result<Self, HighlightError> {
        if names.is_empty() {
            return Ok(Self::with_builtins());
        }
        let all = Self::with_builtins();
        let mut registry = Self::new();
        for name in names {
            let grammar = all
                .get(name.as_ref())
                .ok_or_else(|| HighlightError::UnknownLanguage(name.as_ref().to_string()))?;
            registry.register(grammar.clone());
        }
        Ok(registry)
    }

    /// Adds a grammar; a later grammar takes over names it shares with an
    /// earlier one.
    pub fn register(&mut self, grammar: Grammar) {
        let index = self.grammars.len();
        self.by_name.insert(grammar.name.to_ascii_lowercase(), index);
        for alias in grammar.aliases {
            self.by_name.insert(alias.to_ascii_lowercase(), index);
        }
        self.grammars.push(grammar);
    }

    /// Looks up a grammar by name or alias, ignoring case.
    pub fn get(&self, name: &str) -> Option<&Grammar> {
        self.by_name
            .get(&name.trim().to_ascii_lowercase())
            .map(|&i| &self.grammars[i])
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.grammars.iter().map(Grammar::name)
    }

    pub fn is_empty(&self) -> bool {
        self.grammars.is_empty()
    }
}
