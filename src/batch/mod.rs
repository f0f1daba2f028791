//! Batch runner: one OBJ file per manifest row.
//!
//! Fatal problems (unreadable manifest, engine that will not start, output
//! directory that cannot be created) abort the run. Anything that goes wrong
//! for a single reference is logged and recorded, and the run moves on.

mod resolve;

use std::fmt;
use std::path::{Path, PathBuf};

pub use resolve::UrlResolver;

use crate::engine::{Engine, EngineError, GeometryFormat};
use crate::export::write_obj;
use crate::manifest::{
    checked_filename_for, filename_for, load_manifest, ChainRef,
    ManifestDialect, ManifestError,
};
use crate::options::SurfaceOptions;
use crate::pipeline::{run_one, PipelineError};

/// Errors that stop a batch.
#[derive(Debug)]
pub enum BatchError {
    /// The manifest could not be read.
    BadManifest(ManifestError),
    /// The engine factory failed.
    EngineInit(EngineError),
    /// The output directory could not be created.
    OutputDir {
        /// Requested directory.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadManifest(e) => write!(f, "bad manifest: {e}"),
            Self::EngineInit(e) => {
                write!(f, "engine initialization failed: {e}")
            }
            Self::OutputDir { path, source } => write!(
                f,
                "cannot create output directory {}: {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BadManifest(e) => Some(e),
            Self::EngineInit(e) => Some(e),
            Self::OutputDir { source, .. } => Some(source),
        }
    }
}

/// Settings of one batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    /// Manifest row grammar.
    pub dialect: ManifestDialect,
    /// Surface parameters applied to every reference.
    pub surface: SurfaceOptions,
}

/// A reference that produced no output.
#[derive(Debug)]
pub struct Failure {
    /// Output basename of the reference.
    pub basename: String,
    /// What went wrong.
    pub error: PipelineError,
}

/// Outcome of a completed batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Written files, in manifest order.
    pub written: Vec<PathBuf>,
    /// References that failed, in manifest order.
    pub failures: Vec<Failure>,
    /// Basenames whose chain selection was empty. Their files are written.
    pub empty_selections: Vec<String>,
}

impl BatchReport {
    /// Number of references processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.written.len() + self.failures.len()
    }
}

fn write_output<E: Engine>(
    engine: &mut E,
    representation: Option<&E::Representation>,
    path: &Path,
) -> Result<(), PipelineError> {
    let bytes = match representation {
        Some(repr) => engine
            .export_geometry(repr, GeometryFormat::Obj)
            .map_err(PipelineError::Export)?,
        None => {
            let mut out = Vec::new();
            write_obj(&mut out, &[])
                .map_err(|e| PipelineError::Export(e.into()))?;
            out
        }
    };
    std::fs::write(path, bytes).map_err(|e| PipelineError::Export(e.into()))
}

/// Run one row and write its file. Returns the written path and whether the
/// chain selection was empty.
fn process<E, R>(
    engine: &mut E,
    chain_ref: &ChainRef,
    resolver: &R,
    output_dir: &Path,
    surface: &SurfaceOptions,
) -> Result<(PathBuf, bool), PipelineError>
where
    E: Engine,
    R: UrlResolver + ?Sized,
{
    let basename =
        checked_filename_for(chain_ref).map_err(PipelineError::Reference)?;
    let structure_ref = resolver.resolve(chain_ref);
    log::info!("{basename}: {}", structure_ref.url);

    let computed = run_one(engine, &structure_ref, surface)?;
    let path = output_dir.join(format!("{basename}.obj"));
    write_output(engine, computed.representation.as_ref(), &path)?;
    Ok((path, computed.empty_selection))
}

/// Process every row of `manifest_path`, writing `<basename>.obj` files into
/// `output_dir`.
///
/// `init_engine` is called once, after the manifest has been read. The
/// engine is dropped when the last row is done. Rows whose basename is empty
/// or not a plain file name are recorded as failures and never fetched.
pub fn run_batch<E, F, R>(
    manifest_path: &Path,
    output_dir: &Path,
    options: &BatchOptions,
    init_engine: F,
    resolver: &R,
) -> Result<BatchReport, BatchError>
where
    E: Engine,
    F: FnOnce() -> Result<E, EngineError>,
    R: UrlResolver + ?Sized,
{
    let refs = load_manifest(manifest_path, options.dialect)
        .map_err(BatchError::BadManifest)?;
    let mut engine = init_engine().map_err(BatchError::EngineInit)?;
    std::fs::create_dir_all(output_dir).map_err(|source| {
        BatchError::OutputDir {
            path: output_dir.to_path_buf(),
            source,
        }
    })?;
    log::info!(
        "processing {} reference(s) from {}",
        refs.len(),
        manifest_path.display()
    );

    let mut report = BatchReport::default();
    for chain_ref in &refs {
        let basename = filename_for(chain_ref);
        let outcome = process(
            &mut engine,
            chain_ref,
            resolver,
            output_dir,
            &options.surface,
        );
        match outcome {
            Ok((path, empty_selection)) => {
                log::info!("{basename}: wrote {}", path.display());
                if empty_selection {
                    report.empty_selections.push(basename);
                }
                report.written.push(path);
            }
            Err(error) => {
                log::error!("{basename}: {} failed: {error}", error.stage());
                report.failures.push(Failure { basename, error });
            }
        }
    }
    drop(engine);

    log::info!(
        "done: {} written, {} failed, {} empty",
        report.written.len(),
        report.failures.len(),
        report.empty_selections.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::engine::native::NativeEngine;
    use crate::export::OBJ_HEADER;
    use crate::options::{EngineOptions, SourceOptions};
    use crate::pipeline::StructureRef;
    use crate::structure::fixtures::TWO_CHAINS;

    fn mock() -> Result<MockEngine, EngineError> {
        Ok(MockEngine::default())
    }

    fn manifest(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("manifest.txt");
        std::fs::write(&path, text).unwrap();
        path
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn single_entry_writes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let report = run_batch(
            &manifest(dir.path(), "1tqn\n"),
            &out,
            &BatchOptions::default(),
            mock,
            &SourceOptions::default(),
        )
        .unwrap();
        assert_eq!(report.written, [out.join("1tqn.obj")]);
        assert!(report.failures.is_empty());
        assert_eq!(read(&out, "1tqn.obj"), "# mock model\no A,B\n");
    }

    #[test]
    fn assembly_rows_select_author_chains() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let report = run_batch(
            &manifest(dir.path(), "1tqn_1-A\n1tqn_1-B\n"),
            &out,
            &BatchOptions::default(),
            mock,
            &SourceOptions::default(),
        )
        .unwrap();
        assert_eq!(report.written.len(), 2);
        assert_eq!(read(&out, "1tqn_1-A.obj"), "# mock assembly 1\no A\n");
        assert_eq!(read(&out, "1tqn_1-B.obj"), "# mock assembly 1\no B\n");
    }

    #[test]
    fn flat_dialect_trims_rows() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let options = BatchOptions {
            dialect: ManifestDialect::Flat,
            ..BatchOptions::default()
        };
        let report = run_batch(
            &manifest(dir.path(), "# header\n\n1abc,A\n  2def , B  \n"),
            &out,
            &options,
            mock,
            &SourceOptions::default(),
        )
        .unwrap();
        assert_eq!(
            report.written,
            [out.join("1abc-A.obj"), out.join("2def-B.obj")]
        );
    }

    #[test]
    fn empty_selection_still_writes_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let report = run_batch(
            &manifest(dir.path(), "1xyz-Q\n1abc-A\n"),
            &out,
            &BatchOptions::default(),
            mock,
            &SourceOptions::default(),
        )
        .unwrap();
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.empty_selections, ["1xyz-Q"]);
        assert_eq!(read(&out, "1xyz-Q.obj"), "# mock model\no \n");
        assert_eq!(read(&out, "1abc-A.obj"), "# mock model\no A\n");
    }

    #[test]
    fn fetch_failure_skips_only_that_row() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let resolver = |r: &ChainRef| {
            StructureRef::new(format!("https://h/{}.cif", r.entry_id))
        };
        let report = run_batch(
            &manifest(dir.path(), "1aaa\n404x\n1bbb\n"),
            &out,
            &BatchOptions::default(),
            mock,
            &resolver,
        )
        .unwrap();
        assert_eq!(
            report.written,
            [out.join("1aaa.obj"), out.join("1bbb.obj")]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].basename, "404x");
        assert_eq!(report.failures[0].error.stage(), "fetch");
        assert!(!out.join("404x.obj").exists());
        assert_eq!(report.processed(), 3);
    }

    #[test]
    fn rows_that_are_not_plain_file_names_fail_alone() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let report = run_batch(
            &manifest(dir.path(), "../escaped\n1abc A\n,A\n1tqn\n"),
            &out,
            &BatchOptions::default(),
            mock,
            &SourceOptions::default(),
        )
        .unwrap();

        assert_eq!(report.written, [out.join("1tqn.obj")]);
        let failed: Vec<_> = report
            .failures
            .iter()
            .map(|f| (f.basename.as_str(), f.error.stage()))
            .collect();
        assert_eq!(
            failed,
            [
                ("../escaped", "reference"),
                ("1abc A", "reference"),
                ("-A", "reference"),
            ]
        );
        assert!(!dir.path().join("escaped.obj").exists());
        assert!(!out.join("1abc A.obj").exists());
        assert!(!out.join("-A.obj").exists());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[test]
    fn missing_manifest_is_fatal_before_engine_init() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_batch(
            &dir.path().join("absent.txt"),
            &dir.path().join("out"),
            &BatchOptions::default(),
            || -> Result<MockEngine, EngineError> {
                panic!("engine must not start")
            },
            &SourceOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::BadManifest(_)));
    }

    #[test]
    fn engine_init_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let err = run_batch(
            &manifest(dir.path(), "1tqn\n"),
            &out,
            &BatchOptions::default(),
            || -> Result<MockEngine, EngineError> {
                Err(EngineError::Init("no engine".into()))
            },
            &SourceOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::EngineInit(_)));
        assert!(!out.exists());
    }

    #[test]
    fn unusable_output_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        let err = run_batch(
            &manifest(dir.path(), "1tqn\n"),
            &blocker.join("out"),
            &BatchOptions::default(),
            mock,
            &SourceOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BatchError::OutputDir { .. }));
    }

    #[test]
    fn native_engine_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let cif = dir.path().join("test.cif");
        std::fs::File::create(&cif)
            .unwrap()
            .write_all(TWO_CHAINS.as_bytes())
            .unwrap();
        let out = dir.path().join("out");
        let resolver = |r: &ChainRef| StructureRef {
            url: cif.display().to_string(),
            auth_chain_id: r.chain_id.clone(),
            assembly_id: r.assembly_id.clone(),
        };
        let report = run_batch(
            &manifest(dir.path(), "TEST\nTEST-B\nTEST-Q\n"),
            &out,
            &BatchOptions::default(),
            || NativeEngine::new(&EngineOptions::default()),
            &resolver,
        )
        .unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.written.len(), 3);
        assert_eq!(report.empty_selections, ["TEST-Q"]);

        let whole = read(&out, "TEST.obj");
        assert!(whole.starts_with(OBJ_HEADER));
        assert!(whole.contains("\no structure-molecular-surface-mesh\n"));
        assert!(whole.contains("\nf "));
        assert!(read(&out, "TEST-B.obj").contains("\nf "));
        assert_eq!(read(&out, "TEST-Q.obj"), format!("{OBJ_HEADER}\n"));
    }
}
