//! Type-checking compiler from [`Expression`] to an executable filter.

use std::fmt;

use rustc_hash::FxHashSet;

use super::{AtomProperty, Expression};

/// Expression that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// A node was used where a different value type was required.
    TypeMismatch {
        /// What the context required.
        expected: &'static str,
        /// The offending node, rendered.
        found: String,
    },
    /// Atom groups nested inside a test.
    NestedGenerator,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::NestedGenerator => {
                f.write_str("atom-groups cannot be used inside a test")
            }
        }
    }
}

impl std::error::Error for SelectionError {}

/// Anything that exposes the string properties a selection reads.
pub trait AtomProperties {
    /// Value of `property`; missing values read as the empty string.
    fn property(&self, property: AtomProperty) -> &str;
}

#[derive(Debug, Clone)]
enum Test {
    All,
    SetHas(FxHashSet<String>, AtomProperty),
}

/// A compiled selection, evaluated atom by atom.
///
/// The chain test only reads properties that are constant across a chain,
/// so evaluating it on each atom selects whole chains.
#[derive(Debug, Clone)]
pub struct CompiledSelection {
    test: Test,
}

impl CompiledSelection {
    /// Whether `atom` is selected.
    pub fn matches<A: AtomProperties>(&self, atom: &A) -> bool {
        match &self.test {
            Test::All => true,
            Test::SetHas(set, property) => {
                set.contains(atom.property(*property))
            }
        }
    }

    /// Whether the selection can never match, i.e. membership in an empty
    /// set.
    #[must_use]
    pub fn is_trivially_empty(&self) -> bool {
        matches!(&self.test, Test::SetHas(set, _) if set.is_empty())
    }
}

fn mismatch(expected: &'static str, found: &Expression) -> SelectionError {
    SelectionError::TypeMismatch {
        expected,
        found: found.to_string(),
    }
}

fn compile_test(expr: &Expression) -> Result<Test, SelectionError> {
    match expr {
        Expression::AtomGroups { .. } => Err(SelectionError::NestedGenerator),
        Expression::SetHas { set, value } => {
            let Expression::Set(items) = set.as_ref() else {
                return Err(mismatch("a set", set));
            };
            let Expression::Property(property) = value.as_ref() else {
                return Err(mismatch("an atom property", value));
            };
            Ok(Test::SetHas(items.iter().cloned().collect(), *property))
        }
        other @ (Expression::Set(_) | Expression::Property(_)) => {
            Err(mismatch("a boolean test", other))
        }
    }
}

/// Compile a top-level expression, which must be an atom-groups generator.
pub fn compile(expr: &Expression) -> Result<CompiledSelection, SelectionError> {
    let Expression::AtomGroups { chain_test } = expr else {
        return Err(mismatch("atom-groups", expr));
    };
    let test = match chain_test {
        Some(test) => compile_test(test)?,
        None => Test::All,
    };
    Ok(CompiledSelection { test })
}
