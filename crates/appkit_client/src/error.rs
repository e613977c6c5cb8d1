use crate::transport::TransportError;
use appkit_abi::ABIError;
use appkit_transact::AppkitTransactError;
use snafu::Snafu;
use std::fmt;

#[derive(Debug, Snafu)]
pub enum AppClientError {
    /// Signer or sender cannot be resolved, or the client is in the wrong state for the call.
    #[snafu(display("Configuration error: {message}"))]
    ConfigurationError { message: String },
    /// Carries the compiler diagnostic verbatim.
    #[snafu(display("Compilation error: {message}"))]
    CompilationError { message: String },
    #[snafu(display("Argument error: {message}"))]
    ArgumentError { message: String },
    /// Carries the node's rejection reason verbatim.
    #[snafu(display("Submission error: {message}"))]
    SubmissionError { message: String },
    /// The approval program rejected a call; see [`LogicError`].
    #[snafu(display("{message}"))]
    LogicError {
        message: String,
        logic: Box<LogicError>,
    },
    #[snafu(display("Timeout error: {message}"))]
    TimeoutError { message: String },
    #[snafu(display("ABI error: {source}"))]
    ABIError { source: ABIError },
    #[snafu(display("Transact error: {source}"))]
    TransactError { source: AppkitTransactError },
    #[snafu(display("Transport error: {source}"))]
    TransportError { source: TransportError },
    #[snafu(display("Decode error: {message}"))]
    DecodeError { message: String },
    #[snafu(display("App state error: {message}"))]
    StateError { message: String },
}

/// An approval program rejection, located in the program source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicError {
    /// The node's rejection, verbatim.
    pub message: String,
    pub transaction_id: Option<String>,
    pub pc: Option<u64>,
    /// One-based line of the approval source the pc maps to.
    pub line_no: Option<u64>,
    /// Numbered source lines around `line_no`, formatted as `"{:>4} | {}"`.
    pub lines: Vec<String>,
}

impl fmt::Display for LogicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tx = self.transaction_id.as_deref().unwrap_or("N/A");
        let pc = self
            .pc
            .map(|pc| pc.to_string())
            .unwrap_or_else(|| "N/A".to_string());
        write!(f, "Txn {} had error '{}' at PC {}", tx, self.message, pc)?;
        if let Some(line_no) = self.line_no {
            write!(f, " and Source Line {}", line_no)?;
        }
        if let Some(trace) = self.annotated_trace() {
            write!(f, "\n{}", trace)?;
        }
        Ok(())
    }
}

impl LogicError {
    /// The listing with the failing line marked.
    pub fn annotated_trace(&self) -> Option<String> {
        let line_no = self.line_no?;
        if self.lines.is_empty() {
            return None;
        }
        let marker = format!("{:>4} |", line_no);
        let mut out = String::new();
        for entry in &self.lines {
            out.push_str(entry);
            if entry.starts_with(&marker) {
                out.push_str("\t<--- Error");
            }
            out.push('\n');
        }
        Some(out)
    }
}

impl From<ABIError> for AppClientError {
    fn from(source: ABIError) -> Self {
        AppClientError::ABIError { source }
    }
}

impl From<AppkitTransactError> for AppClientError {
    fn from(source: AppkitTransactError) -> Self {
        AppClientError::TransactError { source }
    }
}

impl From<TransportError> for AppClientError {
    fn from(source: TransportError) -> Self {
        match source {
            TransportError::Rejected { message } => AppClientError::SubmissionError { message },
            source => AppClientError::TransportError { source },
        }
    }
}
