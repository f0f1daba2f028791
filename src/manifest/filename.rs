use std::fmt;

use super::ChainRef;

/// A reference whose basename cannot be used as an output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceError {
    /// The row named no entry.
    EmptyEntry,
    /// The basename holds a path separator, `..` or whitespace.
    UnsafeBasename(String),
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyEntry => f.write_str("reference has an empty entry id"),
            Self::UnsafeBasename(name) => {
                write!(f, "basename {name:?} is not a plain file name")
            }
        }
    }
}

impl std::error::Error for ReferenceError {}

/// Output basename for a reference (no extension).
///
/// `entry`, then `_assembly` when present, then `-chain` when present.
#[must_use]
pub fn filename_for(chain_ref: &ChainRef) -> String {
    let mut out = chain_ref.entry_id.clone();
    if let Some(assembly) = &chain_ref.assembly_id {
        out.push('_');
        out.push_str(assembly);
    }
    if let Some(chain) = &chain_ref.chain_id {
        out.push('-');
        out.push_str(chain);
    }
    out
}

/// [`filename_for`], refusing basenames that would escape the output
/// directory or break whitespace-separated tooling.
pub fn checked_filename_for(
    chain_ref: &ChainRef,
) -> Result<String, ReferenceError> {
    if chain_ref.entry_id.is_empty() {
        return Err(ReferenceError::EmptyEntry);
    }
    let name = filename_for(chain_ref);
    let unsafe_name = name.contains(['/', '\\'])
        || name.contains(char::is_whitespace)
        || name.contains("..");
    if unsafe_name {
        return Err(ReferenceError::UnsafeBasename(name));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_basenames() {
        let cases = [
            (ChainRef::entry("1abc"), "1abc"),
            (ChainRef::entry("1abc").with_assembly("1"), "1abc_1"),
            (ChainRef::entry("1abc").with_chain("A"), "1abc-A"),
            (
                ChainRef::entry("1abc").with_assembly("2").with_chain("B"),
                "1abc_2-B",
            ),
        ];
        for (chain_ref, expected) in cases {
            assert_eq!(filename_for(&chain_ref), expected);
        }
    }

    #[test]
    fn deterministic_and_path_safe() {
        let chain_ref = ChainRef::entry("7xyz").with_assembly("3").with_chain("b");
        let first = filename_for(&chain_ref);
        assert_eq!(first, filename_for(&chain_ref.clone()));
        assert!(!first.contains(char::is_whitespace));
        assert!(!first.contains(['/', '\\']));
    }

    #[test]
    fn unsafe_basenames_are_refused() {
        assert_eq!(
            checked_filename_for(&ChainRef::entry("1abc").with_chain("A")),
            Ok("1abc-A".to_owned())
        );
        assert_eq!(
            checked_filename_for(&ChainRef::entry("").with_chain("A")),
            Err(ReferenceError::EmptyEntry)
        );
        for entry in ["../escaped", "1abc A", "a/b", "a\\b", "x..y", "tab\there"] {
            assert!(
                matches!(
                    checked_filename_for(&ChainRef::entry(entry)),
                    Err(ReferenceError::UnsafeBasename(_))
                ),
                "{entry}"
            );
        }
        let spaced = ChainRef::entry("1abc").with_chain("A B");
        assert!(checked_filename_for(&spaced).is_err());
    }

    #[test]
    fn matches_display_form() {
        let chain_ref = ChainRef::entry("1tqn").with_assembly("1").with_chain("A");
        assert_eq!(filename_for(&chain_ref), chain_ref.to_string());
    }
}
