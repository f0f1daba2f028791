//! Batch manifest parsing.
//!
//! A manifest is a plain UTF-8 text file with one structure reference per
//! line. Blank lines and `#` comments are skipped. Two row dialects exist:
//!
//! - [`ManifestDialect::Assembly`]: `entry[_assembly][(-|,)chain]`
//! - [`ManifestDialect::Flat`]: `entry,chain`
//!
//! Parsing is permissive. A malformed row never fails; fragments that do not
//! fit the grammar are dropped and empty fragments become absent fields.

mod filename;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use filename::{checked_filename_for, filename_for, ReferenceError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One manifest row: an entry, optionally narrowed to an assembly and an
/// author chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainRef {
    /// PDB entry identifier or equivalent. Empty only for rows that start
    /// with a separator.
    pub entry_id: String,
    /// Assembly to process, or `None` for the deposited model.
    pub assembly_id: Option<String>,
    /// `auth_asym_id` of the selected chain, or `None` for all polymer
    /// chains.
    pub chain_id: Option<String>,
}

impl ChainRef {
    /// Reference to a whole entry (deposited model, all chains).
    pub fn entry(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: entry_id.into(),
            assembly_id: None,
            chain_id: None,
        }
    }

    /// Narrow to an assembly.
    #[must_use]
    pub fn with_assembly(mut self, assembly_id: impl Into<String>) -> Self {
        self.assembly_id = Some(assembly_id.into());
        self
    }

    /// Narrow to an author chain.
    #[must_use]
    pub fn with_chain(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }
}

/// Canonical assembly-dialect form, `entry[_assembly][-chain]`.
impl fmt::Display for ChainRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry_id)?;
        if let Some(assembly) = &self.assembly_id {
            write!(f, "_{assembly}")?;
        }
        if let Some(chain) = &self.chain_id {
            write!(f, "-{chain}")?;
        }
        Ok(())
    }
}

/// Row grammar of a manifest file.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Default,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ManifestDialect {
    /// `entry[_assembly][(-|,)chain]`.
    #[default]
    Assembly,
    /// `entry,chain`; the assembly is always absent.
    Flat,
}

impl ManifestDialect {
    /// Parse a single, already trimmed, non-comment row.
    #[must_use]
    pub fn parse_row(self, line: &str) -> ChainRef {
        match self {
            Self::Assembly => parse_assembly_row(line),
            Self::Flat => parse_flat_row(line),
        }
    }
}

impl fmt::Display for ManifestDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assembly => f.write_str("assembly"),
            Self::Flat => f.write_str("flat"),
        }
    }
}

impl FromStr for ManifestDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "assembly" | "a" => Ok(Self::Assembly),
            "flat" | "b" => Ok(Self::Flat),
            other => Err(format!(
                "unknown manifest dialect '{other}' (expected 'assembly' or \
                 'flat')"
            )),
        }
    }
}

/// The manifest file could not be read.
#[derive(Debug)]
pub struct ManifestError {
    /// Path that was being read.
    pub path: PathBuf,
    /// Underlying I/O failure.
    pub source: std::io::Error,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot read manifest {}: {}",
            self.path.display(),
            self.source
        )
    }
}

impl std::error::Error for ManifestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Read and parse a manifest file.
pub fn load_manifest(
    path: &Path,
    dialect: ManifestDialect,
) -> Result<Vec<ChainRef>, ManifestError> {
    let text =
        std::fs::read_to_string(path).map_err(|source| ManifestError {
            path: path.to_path_buf(),
            source,
        })?;
    let refs = parse_manifest(&text, dialect);
    log::debug!(
        "manifest {}: {} reference(s) ({dialect} dialect)",
        path.display(),
        refs.len()
    );
    Ok(refs)
}

/// Parse manifest text. Kept-line order is preserved.
#[must_use]
pub fn parse_manifest(text: &str, dialect: ManifestDialect) -> Vec<ChainRef> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| dialect.parse_row(line))
        .collect()
}

/// Trimmed fragment, or `None` when nothing is left.
fn fragment(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn parse_assembly_row(line: &str) -> ChainRef {
    let mut parts = line.split(['-', ',']);
    let structure = parts.next().unwrap_or_default();
    let chain_id = fragment(parts.next());

    let mut parts = structure.split('_');
    let entry_id = parts.next().unwrap_or_default().trim().to_owned();
    let assembly_id = fragment(parts.next());

    ChainRef {
        entry_id,
        assembly_id,
        chain_id,
    }
}

fn parse_flat_row(line: &str) -> ChainRef {
    let mut parts = line.split(',');
    ChainRef {
        entry_id: parts.next().unwrap_or_default().trim().to_owned(),
        assembly_id: None,
        chain_id: fragment(parts.next()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_a(text: &str) -> Vec<ChainRef> {
        parse_manifest(text, ManifestDialect::Assembly)
    }

    #[test]
    fn assembly_dialect_rows() {
        let refs = parse_a("1abc\n1abc_1\n1abc-A\n1abc_1-A\n1abc_2,B\n");
        assert_eq!(
            refs,
            vec![
                ChainRef::entry("1abc"),
                ChainRef::entry("1abc").with_assembly("1"),
                ChainRef::entry("1abc").with_chain("A"),
                ChainRef::entry("1abc").with_assembly("1").with_chain("A"),
                ChainRef::entry("1abc").with_assembly("2").with_chain("B"),
            ]
        );
    }

    #[test]
    fn chain_separator_is_first_dash_or_comma() {
        let refs = parse_a("1abc_1,A-B\n2def-C,D");
        assert_eq!(refs[0].chain_id.as_deref(), Some("A"));
        assert_eq!(refs[0].assembly_id.as_deref(), Some("1"));
        assert_eq!(refs[1].chain_id.as_deref(), Some("C"));
    }

    #[test]
    fn permissive_rows_drop_extra_fragments() {
        let refs = parse_a("1abc_1_2-A-B\n1abc-\n1abc_,\n");
        assert_eq!(
            refs[0],
            ChainRef::entry("1abc").with_assembly("1").with_chain("A")
        );
        // Empty fragments are absent, not empty strings.
        assert_eq!(refs[1], ChainRef::entry("1abc"));
        assert_eq!(refs[2], ChainRef::entry("1abc"));
    }

    #[test]
    fn comments_and_blanks_are_ignored() {
        let plain = parse_a("1tqn_1-A\n1tqn_1-B\n");
        let noisy =
            parse_a("# header\n\n1tqn_1-A\n   \n  # note\n1tqn_1-B\n\n#\n");
        assert_eq!(plain, noisy);
    }

    #[test]
    fn order_is_preserved() {
        let refs = parse_a("3ccc\n1aaa\n2bbb\n");
        let ids: Vec<&str> = refs.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, ["3ccc", "1aaa", "2bbb"]);
    }

    #[test]
    fn flat_dialect_trims_fields() {
        let refs = parse_manifest(
            "# header\n\n1abc,A\n  2def , B  ",
            ManifestDialect::Flat,
        );
        assert_eq!(
            refs,
            vec![
                ChainRef::entry("1abc").with_chain("A"),
                ChainRef::entry("2def").with_chain("B"),
            ]
        );
        assert_eq!(filename_for(&refs[0]), "1abc-A");
        assert_eq!(filename_for(&refs[1]), "2def-B");
    }

    #[test]
    fn flat_dialect_never_reads_assembly() {
        let refs = parse_manifest("1abc_1,A\n1xyz", ManifestDialect::Flat);
        assert_eq!(refs[0].entry_id, "1abc_1");
        assert_eq!(refs[0].assembly_id, None);
        assert_eq!(refs[1], ChainRef::entry("1xyz"));
    }

    #[test]
    fn canonical_form_round_trips() {
        let samples = [
            ChainRef::entry("1tqn"),
            ChainRef::entry("1tqn").with_assembly("1"),
            ChainRef::entry("1tqn").with_chain("A"),
            ChainRef::entry("4hhb").with_assembly("12").with_chain("AA"),
        ];
        for sample in samples {
            let line = sample.to_string();
            assert_eq!(parse_a(&line), vec![sample]);
        }
    }

    #[test]
    fn dialect_from_str() {
        assert_eq!(
            "flat".parse::<ManifestDialect>(),
            Ok(ManifestDialect::Flat)
        );
        assert_eq!(
            "Assembly".parse::<ManifestDialect>(),
            Ok(ManifestDialect::Assembly)
        );
        assert!("csv".parse::<ManifestDialect>().is_err());
    }

    #[test]
    fn unreadable_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.txt");
        let err =
            load_manifest(&missing, ManifestDialect::Assembly).unwrap_err();
        assert_eq!(err.path, missing);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.txt");
        std::fs::write(&path, "1tqn\n# skip\n1tqn_1-B\n").unwrap();
        let refs = load_manifest(&path, ManifestDialect::Assembly).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(filename_for(&refs[1]), "1tqn_1-B");
    }
}
