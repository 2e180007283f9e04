//! Dependency graph checks over the field table.
//!
//! Fields refer to each other by name. Before a field is evaluated its
//! dependency graph is walked iteratively: nodes are interned into an arena
//! and coloured white, grey (on the current path) or black (finished). A
//! grey node reached again is a cycle; a path longer than
//! [`MAX_RECURSION`] fails instead of nesting deeper.

use std::collections::HashMap;

use crate::{
    entry::{Entry, EntryKind, EntryParams, Scalar},
    error::{
        CycleSnafu, DanglingAliasSnafu, DirfileError, FieldNotFoundSnafu, IndexOutOfBoundsSnafu,
        RecursionLimitSnafu, Result, WrongKindSnafu,
    },
    namespace::FieldTable,
};

use super::MAX_RECURSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    White,
    Grey,
    Black,
}

/// What to do with references to fields that do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missing {
    /// Fail with a lookup error.
    Fail,
    /// Skip them; used while a schema is still being assembled.
    Ignore,
}

struct Arena<'a> {
    index: HashMap<&'a str, usize>,
    nodes: Vec<(&'a str, Colour)>,
}

impl<'a> Arena<'a> {
    fn intern(&mut self, name: &'a str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push((name, Colour::White));
        self.index.insert(name, i);
        i
    }
}

/// Walk every field reachable from `root`, failing on cycles and on chains
/// deeper than [`MAX_RECURSION`].
pub(crate) fn check(fields: &FieldTable, root: &str, missing: Missing) -> Result<()> {
    let mut arena = Arena {
        index: HashMap::new(),
        nodes: Vec::new(),
    };
    let start = arena.intern(root);
    // (node, its references, next reference to visit)
    let mut stack: Vec<(usize, Vec<&str>, usize)> = Vec::new();
    match fields.get(root) {
        Some(entry) => stack.push((start, entry.references(), 0)),
        None if missing == Missing::Ignore => return Ok(()),
        None => return FieldNotFoundSnafu { name: root }.fail(),
    }
    arena.nodes[start].1 = Colour::Grey;

    while let Some((node, refs, next)) = stack.last_mut() {
        let Some(&child) = refs.get(*next) else {
            arena.nodes[*node].1 = Colour::Black;
            stack.pop();
            continue;
        };
        *next += 1;
        let parent = arena.nodes[*node].0;
        let Some(entry) = fields.get(child) else {
            match (missing, fields.get(parent).map(|e| &e.params)) {
                (Missing::Ignore, _) => continue,
                (Missing::Fail, Some(EntryParams::Alias { .. })) => {
                    return DanglingAliasSnafu {
                        name: parent,
                        target: child,
                    }
                    .fail();
                }
                (Missing::Fail, _) => return FieldNotFoundSnafu { name: child }.fail(),
            }
        };
        let i = arena.intern(child);
        match arena.nodes[i].1 {
            Colour::Grey => return CycleSnafu { name: child }.fail(),
            Colour::Black => continue,
            Colour::White => {}
        }
        if stack.len() >= MAX_RECURSION {
            return RecursionLimitSnafu {
                name: root,
                limit: MAX_RECURSION,
            }
            .fail();
        }
        arena.nodes[i].1 = Colour::Grey;
        stack.push((i, entry.references(), 0));
    }
    Ok(())
}

/// Full consistency check of `name`: the graph check plus the kind rules
/// of every reference along the way.
pub(crate) fn validate(fields: &FieldTable, name: &str) -> Result<()> {
    check(fields, name, Missing::Fail)?;
    let mut seen = Vec::new();
    let mut todo = vec![name];
    while let Some(current) = todo.pop() {
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        let entry = fields.resolve(current)?;
        validate_references(fields, entry)?;
        todo.extend(entry.references());
    }
    Ok(())
}

fn validate_references(fields: &FieldTable, entry: &Entry) -> Result<()> {
    match &entry.params {
        EntryParams::Indir { index, array } => {
            expect_vector(fields, index)?;
            expect_kind(fields, array, EntryKind::Carray, "CARRAY")?;
        }
        EntryParams::Sindir { index, array } => {
            expect_vector(fields, index)?;
            expect_kind(fields, array, EntryKind::Sarray, "SARRAY")?;
        }
        _ => {
            for input in entry.inputs() {
                if !matches!(entry.params, EntryParams::Alias { .. }) {
                    expect_vector(fields, input)?;
                }
            }
        }
    }
    for scalar in entry.scalars() {
        if let Scalar::Field { name, index } = scalar {
            let target = fields.resolve(name)?;
            match (&target.params, index) {
                (EntryParams::Const { .. }, None) => {}
                (EntryParams::Carray { values }, Some(i)) if *i < values.len() => {}
                (EntryParams::Carray { values }, Some(i)) => {
                    return IndexOutOfBoundsSnafu {
                        name: name.clone(),
                        index: *i as i64,
                        len: values.len(),
                    }
                    .fail();
                }
                (EntryParams::Carray { .. }, None) => {}
                _ => {
                    return WrongKindSnafu {
                        name: name.clone(),
                        kind: target.kind(),
                        expected: "CONST or CARRAY",
                    }
                    .fail();
                }
            }
        }
    }
    Ok(())
}

fn expect_vector(fields: &FieldTable, name: &str) -> Result<()> {
    let target = fields.resolve(name)?;
    if target.kind().is_vector() {
        return Ok(());
    }
    Err(wrong_kind(target, "a vector field"))
}

fn expect_kind(fields: &FieldTable, name: &str, kind: EntryKind, expected: &'static str) -> Result<()> {
    let target = fields.resolve(name)?;
    if target.kind() == kind {
        return Ok(());
    }
    Err(wrong_kind(target, expected))
}

fn wrong_kind(entry: &Entry, expected: &'static str) -> DirfileError {
    DirfileError::WrongKind {
        name: entry.name.clone(),
        kind: entry.kind(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        entry::Scalar,
        types::{ElementType, Samples},
    };

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn table(entries: Vec<Entry>) -> Result<FieldTable> {
        let mut table = FieldTable::default();
        for entry in entries {
            table.insert(entry, false)?;
        }
        Ok(table)
    }

    #[test]
    fn two_field_cycles_are_rejected() -> TestResult {
        let fields = table(vec![
            Entry::multiply("a", "b", "INDEX")?,
            Entry::phase("b", "a", 1)?,
        ])?;
        assert!(matches!(
            check(&fields, "a", Missing::Fail),
            Err(DirfileError::Cycle { .. })
        ));
        Ok(())
    }

    #[test]
    fn diamonds_are_not_cycles() -> TestResult {
        let fields = table(vec![
            Entry::raw("data", ElementType::Int8, 8)?,
            Entry::phase("p", "data", 1)?,
            Entry::multiply("m", "p", "data")?,
            Entry::divide("d", "m", "p")?,
        ])?;
        check(&fields, "d", Missing::Fail)?;
        validate(&fields, "d")?;
        Ok(())
    }

    #[test]
    fn missing_inputs_fail_only_when_asked() -> TestResult {
        let fields = table(vec![Entry::phase("p", "nowhere", 1)?, Entry::alias("a", "gone")?])?;
        assert!(matches!(
            check(&fields, "p", Missing::Fail),
            Err(DirfileError::FieldNotFound { .. })
        ));
        check(&fields, "p", Missing::Ignore)?;
        assert!(matches!(
            check(&fields, "a", Missing::Fail),
            Err(DirfileError::DanglingAlias { .. })
        ));
        Ok(())
    }

    #[test]
    fn long_chains_hit_the_recursion_limit() -> TestResult {
        let mut entries = vec![Entry::raw("f0", ElementType::Int8, 1)?];
        for i in 1..=MAX_RECURSION + 1 {
            entries.push(Entry::phase(format!("f{i}"), format!("f{}", i - 1), 0)?);
        }
        let fields = table(entries)?;
        assert!(matches!(
            check(&fields, &format!("f{}", MAX_RECURSION + 1), Missing::Fail),
            Err(DirfileError::RecursionLimit { .. })
        ));
        check(&fields, "f5", Missing::Fail)?;
        Ok(())
    }

    #[test]
    fn validate_checks_reference_kinds() -> TestResult {
        let fields = table(vec![
            Entry::raw("data", ElementType::Uint8, 1)?,
            Entry::carray("arr", Samples::Float64(vec![1.0, 2.0]))?,
            Entry::sarray("names", vec!["x".into()])?,
            Entry::indir("good", "data", "arr")?,
            Entry::indir("bad", "data", "names")?,
            Entry::recip("r1", "data", Scalar::element("arr", 5))?,
            Entry::recip("r2", "data", Scalar::field("names"))?,
            Entry::phase("p", "arr", 1)?,
        ])?;
        validate(&fields, "good")?;
        for name in ["bad", "r2", "p"] {
            assert!(matches!(
                validate(&fields, name),
                Err(DirfileError::WrongKind { .. })
            ));
        }
        assert!(matches!(
            validate(&fields, "r1"),
            Err(DirfileError::IndexOutOfBounds { .. })
        ));
        Ok(())
    }
}
