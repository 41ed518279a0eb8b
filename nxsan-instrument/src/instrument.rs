use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use nxsan_shared::{AccessMode, AccessWidth};
use regex::Regex;

use crate::InstrumentError;

/// Result of instrumenting one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedIr {
    pub ir: String,
    pub num_loads: u64,
    pub num_stores: u64,
}

/// Rewrites the scalar loads and stores of an LLIR module with calls to the
/// nxsan report hooks.
///
/// The rewriter is line-oriented over the modern opaque-pointer syntax: a
/// recognised instruction gets its hook call inserted on the preceding line,
/// anything else passes through byte-for-byte. The eight hook declarations
/// are appended to the module.
#[derive(Debug)]
pub struct AccessInstrumenter {
    file_path: PathBuf,
    num_loads: u64,
    num_stores: u64,
}

impl AccessInstrumenter {
    pub fn new(llir_path: impl Into<PathBuf>) -> Self {
        AccessInstrumenter { file_path: llir_path.into(), num_loads: 0, num_stores: 0 }
    }

    /// Generates instrumented IR text from the source module file.
    pub fn generate_ir(&mut self) -> Result<InstrumentedIr, InstrumentError> {
        self.num_loads = 0;
        self.num_stores = 0;
        let source = fs::read_to_string(&self.file_path).map_err(|source| {
            InstrumentError::ReadModule { path: self.file_path.clone(), source }
        })?;
        let ir = self.instrument_module(&source);
        Ok(InstrumentedIr { ir, num_loads: self.num_loads, num_stores: self.num_stores })
    }

    fn instrument_module(&mut self, source: &str) -> String {
        let mut out = String::with_capacity(source.len() + source.len() / 4);
        for line in source.lines() {
            if let Some(call) = self.instrument_line(line) {
                out.push_str(&call);
                out.push('\n');
            }
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        push_declarations(&mut out);
        out
    }

    /// The hook call for a line holding a scalar load or store, if one is
    /// needed. `load atomic`/`store atomic` fail the type classification
    /// (the keyword lands in the type capture) and are skipped silently,
    /// like every other unsupported shape.
    fn instrument_line(&mut self, line: &str) -> Option<String> {
        let (mode, captures) = if let Some(captures) = load_re().captures(line) {
            (AccessMode::Load, captures)
        } else if let Some(captures) = store_re().captures(line) {
            (AccessMode::Store, captures)
        } else {
            return None;
        };

        let width = scalar_access_width(captures.name("ty")?.as_str().trim())?;
        let indent = captures.name("indent").map_or("", |m| m.as_str());
        let pointer = captures.name("ptr")?.as_str();

        match mode {
            AccessMode::Load => self.num_loads += 1,
            AccessMode::Store => self.num_stores += 1,
        }
        Some(format!("{indent}call void @{}(ptr {pointer})", width.hook_symbol(mode)))
    }
}

fn load_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<indent>\s*)%[-A-Za-z0-9$._]+\s*=\s*load\s+(?:volatile\s+)?(?P<ty>[^,]+),\s*ptr\s+(?P<ptr>[%@][-A-Za-z0-9$._]+)\s*(?:,.*)?$",
        )
        .unwrap()
    })
}

fn store_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<indent>\s*)store\s+(?:volatile\s+)?(?P<ty>\S+)\s+(?P<val>[^,]+),\s*ptr\s+(?P<ptr>[%@][-A-Za-z0-9$._]+)\s*(?:,.*)?$",
        )
        .unwrap()
    })
}

/// The hook width for a scalar first-class type, or `None` for anything the
/// runtime has no hook for. Store sizes follow the usual 64-bit data layout:
/// integers round up to whole bytes, `ptr` is eight bytes.
fn scalar_access_width(ty: &str) -> Option<AccessWidth> {
    match ty {
        "half" | "bfloat" => Some(AccessWidth::W16),
        "float" => Some(AccessWidth::W32),
        "double" => Some(AccessWidth::W64),
        "ptr" => Some(AccessWidth::W64),
        _ => {
            let bits: u64 = ty.strip_prefix('i')?.parse().ok()?;
            AccessWidth::from_store_bits(bits.div_ceil(8) * 8)
        }
    }
}

fn push_declarations(out: &mut String) {
    out.push_str("; nxsan report hook declarations\n");
    for mode in [AccessMode::Load, AccessMode::Store] {
        for width in AccessWidth::ALL {
            out.push_str("declare void @");
            out.push_str(width.hook_symbol(mode));
            out.push_str("(ptr)\n");
        }
    }
}

/// Applies an output-file pattern, substituting `{}` with the input stem.
pub fn output_file_name(pattern: &str, stem: &str) -> String {
    pattern.replace("{}", stem)
}
