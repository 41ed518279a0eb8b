//! LLIR access instrumentation for the nxsan runtime.
//!
//! Rewrites an LLIR module so that every scalar load and store of 1, 2, 4 or
//! 8 bytes is preceded by a call to the matching `__nxsan_report_*` hook, and
//! declares the eight hook symbols. Atomics, vectors, aggregates and
//! non-standard sizes are left untouched.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod instrument;

pub use instrument::{AccessInstrumenter, InstrumentedIr, output_file_name};

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("failed to read module {}: {source}", .path.display())]
    ReadModule {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
