// -- Lint policy ---------------------------------------------------------
// This is the single source of truth for crate-wide lints.

// Broad lint groups
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
// Documentation
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![deny(rustdoc::bare_urls)]
// No panicking in library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
// No debug/print artifacts
#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
// Import hygiene
#![deny(clippy::wildcard_imports)]
// Complexity limits (thresholds in clippy.toml)
#![deny(clippy::cognitive_complexity)]
#![deny(clippy::too_many_lines)]
#![deny(clippy::excessive_nesting)]
// Function signature hygiene
#![deny(clippy::too_many_arguments)]
#![deny(clippy::fn_params_excessive_bools)]
// Clone / pass-by-value hygiene
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::implicit_clone)]
// String hygiene
#![deny(clippy::inefficient_to_string)]
#![deny(clippy::redundant_closure_for_method_calls)]
#![deny(clippy::manual_string_new)]
#![deny(clippy::str_to_string)]
// Cargo lints (warn, not deny since cargo lints can be noisy)
#![warn(clippy::cargo)]
// Unused / redundant code
#![deny(unused_results)]
#![deny(unused_qualifications)]
// Cast hygiene
#![deny(trivial_casts)]
#![deny(trivial_numeric_casts)]

//! Headless batch generator of molecular-surface meshes.
//!
//! Molsurf reads a manifest of structure references (PDB entry, optional
//! assembly, optional author chain), fetches each structure, selects its
//! polymer chains and writes the solvent-excluded surface as a Wavefront OBJ
//! file per row.
//!
//! # Key entry points
//!
//! - [`batch::run_batch`] - process a whole manifest
//! - [`pipeline::run_one`] - the stage sequence for one structure
//! - [`engine::Engine`] - capabilities the pipeline drives, implemented
//!   in-process by [`engine::native::NativeEngine`]
//! - [`options::Options`] - runtime configuration (manifest dialect, source
//!   URLs, surface parameters, engine limits)
//!
//! # Architecture
//!
//! Everything runs on the calling thread. The batch runner reads the
//! manifest, creates one engine, then for every row resolves a URL, runs the
//! pipeline (download -> parse -> trajectory -> model -> structure ->
//! component -> representation) and exports the representation. Per-row
//! failures are logged and skipped; only manifest, engine and output
//! directory failures abort a run.

pub mod batch;
pub mod cif;
pub mod engine;
pub mod error;
pub mod export;
pub mod manifest;
pub mod options;
pub mod pipeline;
pub mod selection;
pub mod structure;
pub mod surface;
