use std::sync::Arc;

use super::language::LanguageRegistry;
use crate::decoration::{Decoration, DecorationSet};
use crate::model::{Node, ResolvedPos};
use crate::schema::CODE_BLOCK;
use crate::transform::{Applied, Selection};

/// Handle for a deferred highlight pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

/// Generation counter for deferred work. Scheduling supersedes every earlier
/// ticket; running a superseded ticket does nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Scheduler {
    generation: u64,
}

impl Scheduler {
    #[must_use]
    pub fn schedule(&mut self) -> Ticket {
        self.generation += 1;
        Ticket {
            generation: self.generation,
        }
    }

    /// Invalidates outstanding tickets without issuing a new one.
    pub fn supersede(&mut self) {
        self.generation += 1;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.generation == self.generation
    }
}

/// Syntax highlighting for every code block, kept as decorations.
#[derive(Debug, Clone)]
pub struct HighlightDecorator {
    registry: Arc<LanguageRegistry>,
    decorations: DecorationSet,
    scheduler: Scheduler,
    initialized: bool,
    passes: u64,
}

impl HighlightDecorator {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self {
            registry,
            decorations: DecorationSet::empty(),
            scheduler: Scheduler::default(),
            initialized: false,
            passes: 0,
        }
    }

    pub fn decorations(&self) -> &DecorationSet {
        &self.decorations
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Number of full highlight passes run so far.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Defers the first pass. Run the ticket with [`HighlightDecorator::run`].
    pub fn schedule_initial(&self) -> (HighlightDecorator, Ticket) {
        let mut next = self.clone();
        let ticket = next.scheduler.schedule();
        (next, ticket)
    }

    /// Runs a deferred pass, unless a later pass superseded it.
    pub fn run(&self, ticket: Ticket, doc: &Node) -> HighlightDecorator {
        if !self.scheduler.is_current(ticket) {
            log::warn!(
                "discarding stale highlight pass (generation {} of {})",
                ticket.generation,
                self.scheduler.generation
            );
            return self.clone();
        }
        self.highlighted(doc)
    }

    /// Highlights `doc` now.
    pub fn highlighted(&self, doc: &Node) -> HighlightDecorator {
        let mut decorations = Vec::new();
        for (pos, block) in code_blocks(doc) {
            let Some(grammar) = block
                .attrs()
                .str("language")
                .and_then(|lang| self.registry.get(lang))
            else {
                continue;
            };
            let start = pos + 1;
            decorations.extend(grammar.tokenize(&block.text_content()).into_iter().map(|span| {
                Decoration::inline(start + span.range.start, start + span.range.end, span.class)
            }));
        }
        let mut scheduler = self.scheduler;
        scheduler.supersede();
        HighlightDecorator {
            registry: Arc::clone(&self.registry),
            decorations: DecorationSet::new(decorations),
            scheduler,
            initialized: true,
            passes: self.passes + 1,
        }
    }

    /// Follows a transaction. `before` is the document the transaction was
    /// applied to; the selections are the ones before and after it.
    pub fn apply(
        &self,
        before: &Node,
        applied: &Applied,
        selection_before: Selection,
        selection_after: Selection,
    ) -> HighlightDecorator {
        if let Some(reason) = self.rehighlight_reason(before, applied, selection_before, selection_after) {
            log::debug!("re-highlighting code blocks: {reason}");
            return self.highlighted(&applied.doc);
        }
        HighlightDecorator {
            decorations: self.decorations.map(applied.mapping()),
            ..self.clone()
        }
    }

    fn rehighlight_reason(
        &self,
        before: &Node,
        applied: &Applied,
        selection_before: Selection,
        selection_after: Selection,
    ) -> Option<&'static str> {
        if !self.initialized {
            return Some("first pass");
        }
        if applied.is_remote() {
            return Some("remote change");
        }
        if !applied.doc_changed() {
            return None;
        }
        let old_blocks = code_blocks(before);
        if old_blocks.len() != code_blocks(&applied.doc).len() {
            return Some("code block count changed");
        }
        if in_code_block(before, selection_before.head)
            || in_code_block(&applied.doc, selection_after.head)
        {
            return Some("edit inside a code block");
        }
        let enclosed = applied.steps().iter().any(|step| {
            let range = step.range();
            range.start < range.end
                && old_blocks
                    .iter()
                    .any(|(pos, block)| range.start <= *pos && pos + block.node_size() <= range.end)
        });
        enclosed.then_some("bulk replace over a code block")
    }
}

fn code_blocks(doc: &Node) -> Vec<(usize, &Node)> {
    let mut blocks = Vec::new();
    doc.descendants(&mut |node, pos| {
        if node.kind() == CODE_BLOCK {
            blocks.push((pos, node));
            return false;
        }
        node.is_element()
    });
    blocks
}

fn in_code_block(doc: &Node, pos: usize) -> bool {
    ResolvedPos::resolve(doc, pos)
        .is_ok_and(|rp| rp.find_ancestor(|n| n.kind() == CODE_BLOCK).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attrs;
    use crate::schema::{Schema, Surface};
    use crate::transform::Transaction;
    use pretty_assertions::assert_eq;

    fn schema() -> Schema {
        Surface::Markdown.schema().unwrap()
    }

    fn code(schema: &Schema, language: &str, text: &str) -> Node {
        schema
            .node(
                CODE_BLOCK,
                Attrs::new().with("language", language),
                vec![Node::text(text, vec![])],
            )
            .unwrap()
    }

    // paragraph "a" at 0..3, code block at 3 with content from 4
    fn sample(schema: &Schema) -> Node {
        schema.doc(vec![
            schema.paragraph(vec![Node::text("a", vec![])]),
            code(schema, "rust", "let x = 1;"),
        ])
    }

    fn ranges(decorator: &HighlightDecorator) -> Vec<(usize, usize, String)> {
        decorator
            .decorations()
            .iter()
            .map(|d| (d.from, d.to, d.class.clone()))
            .collect()
    }

    fn decorator() -> HighlightDecorator {
        HighlightDecorator::new(Arc::new(LanguageRegistry::with_builtins()))
    }

    #[test]
    fn highlights_code_blocks_at_document_positions() {
        let schema = schema();
        let highlighted = decorator().highlighted(&sample(&schema));
        assert_eq!(
            ranges(&highlighted),
            vec![
                (4, 7, "hl-keyword".to_string()),
                (12, 13, "hl-number".to_string()),
            ]
        );
    }

    #[test]
    fn unknown_language_is_left_plain() {
        let schema = schema();
        let doc = schema.doc(vec![code(&schema, "brainfuck", "+++")]);
        assert!(decorator().highlighted(&doc).decorations().is_empty());
    }

    #[test]
    fn typing_outside_code_maps_decorations() {
        let schema = schema();
        let doc = sample(&schema);
        let highlighted = decorator().highlighted(&doc);
        let applied = Transaction::new().insert_text(2, "zz", vec![]).apply(&doc).unwrap();
        let next = highlighted.apply(&doc, &applied, Selection::cursor(2), Selection::cursor(4));
        assert_eq!(next.passes(), 1);
        assert_eq!(
            ranges(&next),
            vec![
                (6, 9, "hl-keyword".to_string()),
                (14, 15, "hl-number".to_string()),
            ]
        );
    }

    #[test]
    fn typing_inside_code_rehighlights() {
        let schema = schema();
        let doc = sample(&schema);
        let highlighted = decorator().highlighted(&doc);
        // "let x = 1;" becomes "let x = 1; 2"
        let applied = Transaction::new().insert_text(14, " 2", vec![]).apply(&doc).unwrap();
        let next = highlighted.apply(&doc, &applied, Selection::cursor(14), Selection::cursor(16));
        assert_eq!(next.passes(), 2);
        assert!(ranges(&next).contains(&(15, 16, "hl-number".to_string())));
    }

    #[test]
    fn remote_change_rehighlights() {
        let schema = schema();
        let doc = sample(&schema);
        let highlighted = decorator().highlighted(&doc);
        let snapshot = schema.doc(vec![
            schema.paragraph(vec![Node::text("ab", vec![])]),
            code(&schema, "rust", "let x = 1;"),
        ]);
        let applied = Transaction::remote(snapshot).apply(&doc).unwrap();
        let next = highlighted.apply(&doc, &applied, Selection::cursor(1), Selection::cursor(1));
        assert_eq!(next.passes(), 2);
    }

    #[test]
    fn replacing_a_whole_code_block_rehighlights() {
        let schema = schema();
        let doc = sample(&schema);
        let highlighted = decorator().highlighted(&doc);
        let applied = Transaction::new()
            .replace(3, 15, vec![code(&schema, "python", "pass")])
            .apply(&doc)
            .unwrap();
        let next = highlighted.apply(&doc, &applied, Selection::cursor(1), Selection::cursor(1));
        assert_eq!(next.passes(), 2);
        assert_eq!(ranges(&next), vec![(4, 8, "hl-keyword".to_string())]);
    }

    #[test]
    fn stale_initial_pass_is_discarded() {
        let schema = schema();
        let doc = sample(&schema);
        let (pending, ticket) = decorator().schedule_initial();
        let applied = Transaction::new().insert_text(2, "b", vec![]).apply(&doc).unwrap();
        let next = pending.apply(&doc, &applied, Selection::cursor(2), Selection::cursor(3));
        assert!(next.is_initialized());
        assert_eq!(next.passes(), 1);
        let after = next.run(ticket, &applied.doc);
        assert_eq!(after.passes(), 1);
    }

    #[test]
    fn current_initial_pass_runs() {
        let schema = schema();
        let (pending, ticket) = decorator().schedule_initial();
        let ran = pending.run(ticket, &sample(&schema));
        assert!(ran.is_initialized());
        assert_eq!(ran.decorations().len(), 2);
    }
}
