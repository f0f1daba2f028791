//! Symbolic atom-selection expressions.
//!
//! An [`Expression`] is a small tree in the vocabulary of a structure query
//! language: an atom-groups generator whose chain test checks a chain
//! property against a literal set. Trees are built with
//! [`label_asym_id_in`], handed to an engine unevaluated, and turned into an
//! executable filter by [`compile`].

mod compile;

use std::fmt;

pub use compile::{compile, AtomProperties, CompiledSelection, SelectionError};

/// Per-atom string properties an expression may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomProperty {
    /// Label (mmCIF-internal) chain identifier.
    LabelAsymId,
}

impl AtomProperty {
    /// mmCIF `_atom_site` field name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::LabelAsymId => "label_asym_id",
        }
    }
}

/// A symbolic selection expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// Select the atoms of every chain passing `chain_test`. An absent test
    /// passes.
    AtomGroups {
        /// Test applied per chain.
        chain_test: Option<Box<Expression>>,
    },
    /// Membership of `value` in `set`.
    SetHas {
        /// Must evaluate to a set.
        set: Box<Expression>,
        /// Must evaluate to a string.
        value: Box<Expression>,
    },
    /// Literal set of strings.
    Set(Vec<String>),
    /// Property of the atom under test.
    Property(AtomProperty),
}

/// Atoms whose chain's `label_asym_id` is one of `ids`.
///
/// An empty iterator yields an expression that selects nothing.
pub fn label_asym_id_in<I, S>(ids: I) -> Expression
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let ids = ids.into_iter().map(Into::into).collect();
    Expression::AtomGroups {
        chain_test: Some(Box::new(Expression::SetHas {
            set: Box::new(Expression::Set(ids)),
            value: Box::new(Expression::Property(AtomProperty::LabelAsymId)),
        })),
    }
}

fn write_str_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

/// S-expression rendering, e.g.
/// `(struct.generator.atom-groups :chain-test (core.set.has (set "A")
/// (struct.atom-property.macromolecular.label_asym_id)))`.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtomGroups { chain_test } => {
                write!(f, "(struct.generator.atom-groups")?;
                if let Some(test) = chain_test {
                    write!(f, " :chain-test {test}")?;
                }
                write!(f, ")")
            }
            Self::SetHas { set, value } => {
                write!(f, "(core.set.has {set} {value})")
            }
            Self::Set(items) => {
                write!(f, "(set")?;
                for item in items {
                    write!(f, " ")?;
                    write_str_literal(f, item)?;
                }
                write!(f, ")")
            }
            Self::Property(p) => {
                write!(f, "(struct.atom-property.macromolecular.{})", p.name())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_asym_id_in_shape() {
        let expr = label_asym_id_in(["A", "B"]);
        let Expression::AtomGroups {
            chain_test: Some(test),
        } = &expr
        else {
            panic!("unexpected shape: {expr:?}");
        };
        assert_eq!(
            **test,
            Expression::SetHas {
                set: Box::new(Expression::Set(vec!["A".into(), "B".into()])),
                value: Box::new(Expression::Property(
                    AtomProperty::LabelAsymId
                )),
            }
        );
    }

    #[test]
    fn renders_as_s_expression() {
        assert_eq!(
            label_asym_id_in(["A"]).to_string(),
            "(struct.generator.atom-groups :chain-test \
             (core.set.has (set \"A\") \
             (struct.atom-property.macromolecular.label_asym_id)))"
        );
        assert_eq!(
            label_asym_id_in(Vec::<String>::new()).to_string(),
            "(struct.generator.atom-groups :chain-test (core.set.has (set) \
             (struct.atom-property.macromolecular.label_asym_id)))"
        );
    }

    #[test]
    fn set_members_are_escaped() {
        assert_eq!(
            Expression::Set(vec!["a\"b".into()]).to_string(),
            "(set \"a\\\"b\")"
        );
    }
}
