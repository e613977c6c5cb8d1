use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use snafu::Snafu;

static PRAGMA_VERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*#pragma\s+version\s+(\d+)\s*$").expect("pragma regex is valid")
});

#[derive(Debug, Snafu)]
pub enum CompilerError {
    /// The compiler's diagnostic, verbatim.
    #[snafu(display("{message}"))]
    Rejected { message: String },

    #[snafu(display("Compiler unavailable: {message}"))]
    Unavailable { message: String },

    #[snafu(display("Invalid source map: {message}"))]
    InvalidSourceMap { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledProgram {
    pub bytecode: Vec<u8>,
    /// Address of the program when used as a logic signature.
    pub hash: String,
    pub source_map: Option<serde_json::Value>,
}

impl CompiledProgram {
    /// The pc to line mapping, when the compiler returned a source map.
    pub fn pc_map(&self) -> Option<Result<SourceMap, CompilerError>> {
        self.source_map.as_ref().map(SourceMap::from_json)
    }
}

const BASE64_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Maps program counters back to source lines.
///
/// Built from the version 3 source map algod returns with `sourcemap=true`: `mappings` holds one
/// `;` separated segment per pc, each a base64 VLQ group whose third field is the line delta
/// from the previous pc. An empty segment keeps the previous line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMap {
    pc_to_line: Vec<u64>,
}

impl SourceMap {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CompilerError> {
        let mappings = value
            .get("mappings")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CompilerError::InvalidSourceMap {
                message: "missing mappings".to_string(),
            })?;

        let mut line: i64 = 0;
        let mut pc_to_line = Vec::new();
        for (pc, segment) in mappings.split(';').enumerate() {
            if !segment.is_empty() {
                let fields = decode_vlq(segment)?;
                let delta = fields.get(2).ok_or_else(|| CompilerError::InvalidSourceMap {
                    message: format!("segment {} for pc {} has no line field", segment, pc),
                })?;
                line += delta;
            }
            if line < 0 {
                return Err(CompilerError::InvalidSourceMap {
                    message: format!("pc {} maps to negative line {}", pc, line),
                });
            }
            pc_to_line.push(line as u64);
        }
        Ok(SourceMap { pc_to_line })
    }

    /// Zero-based source line of the instruction at `pc`.
    pub fn line_for_pc(&self, pc: u64) -> Option<u64> {
        usize::try_from(pc)
            .ok()
            .and_then(|pc| self.pc_to_line.get(pc))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.pc_to_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pc_to_line.is_empty()
    }
}

fn decode_vlq(segment: &str) -> Result<Vec<i64>, CompilerError> {
    let invalid = |reason: &str| CompilerError::InvalidSourceMap {
        message: format!("segment {} {}", segment, reason),
    };

    let mut values = Vec::new();
    let mut value: i64 = 0;
    let mut shift = 0;
    for c in segment.bytes() {
        let digit = BASE64_ALPHABET
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| invalid("is not base64"))? as i64;
        if shift > 55 {
            return Err(invalid("overflows"));
        }
        value += (digit & 31) << shift;
        if digit & 32 != 0 {
            shift += 5;
            continue;
        }
        // Sign lives in the lowest bit
        let magnitude = value >> 1;
        values.push(if value & 1 == 1 { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }
    if shift != 0 {
        return Err(invalid("ends mid value"));
    }
    Ok(values)
}

/// Turns program source into bytecode. Deterministic for a given (source, version) pair.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source: &str, version: u8) -> Result<CompiledProgram, CompilerError>;
}

/// Reads the version declared by the first line that is neither blank nor a `//` comment, if it
/// is a `#pragma version` line.
pub fn declared_version(source: &str) -> Option<u8> {
    let first_line = source.lines().find(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with("//")
    })?;
    PRAGMA_VERSION_REGEX
        .captures(first_line)
        .and_then(|captures| captures.get(1))
        .and_then(|version| version.as_str().parse().ok())
}

/// Makes sure the source starts with `#pragma version {version}`.
pub fn with_version_pragma(source: &str, version: u8) -> Result<String, CompilerError> {
    match declared_version(source) {
        Some(declared) if declared == version => Ok(source.to_string()),
        Some(declared) => Err(CompilerError::Rejected {
            message: format!(
                "Source declares #pragma version {} but version {} was requested",
                declared, version
            ),
        }),
        None => Ok(format!("#pragma version {}\n{}", version, source)),
    }
}
