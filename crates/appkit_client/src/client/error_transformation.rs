use super::ApplicationClient;
use crate::compiler::with_version_pragma;
use crate::error::{AppClientError, LogicError};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

/// Lines shown either side of the failing line.
const LISTING_CONTEXT: u64 = 3;

static LOGIC_ERROR_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"transaction (?P<transaction_id>[A-Z2-7]{52}): logic eval error: (?P<message>.*)\. Details: .*pc=(?P<pc>[0-9]+)",
    )
    .expect("logic error regex is valid")
});

static APP_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bapp=(?P<app_id>[0-9]+)").expect("app id regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogicErrorData {
    pub transaction_id: String,
    pub message: String,
    pub pc: u64,
    pub app_id: Option<u64>,
}

pub(crate) fn extract_logic_error_data(error_str: &str) -> Option<LogicErrorData> {
    let caps = LOGIC_ERROR_REGEX.captures(error_str)?;
    let pc = caps["pc"].parse().ok()?;
    let app_id = APP_ID_REGEX
        .captures(error_str)
        .and_then(|app| app["app_id"].parse().ok());
    Some(LogicErrorData {
        transaction_id: caps["transaction_id"].to_string(),
        message: caps["message"].to_string(),
        pc,
        app_id,
    })
}

/// Numbered lines of `source` around the one-based `center_line`.
fn truncate_listing(source: &str, center_line: u64, context: u64) -> Vec<String> {
    let center = center_line.saturating_sub(1);
    let start = center.saturating_sub(context);
    source
        .lines()
        .enumerate()
        .skip(start as usize)
        .take((center - start + context + 1) as usize)
        .map(|(i, line)| format!("{:>4} | {}", i + 1, line))
        .collect()
}

impl ApplicationClient {
    /// Turns a node rejection raised by this application's approval program into an
    /// [`AppClientError::LogicError`] located through the approval source map. Anything else is
    /// returned unchanged.
    pub(super) async fn expose_logic_error(&self, error: AppClientError) -> AppClientError {
        let message = match error {
            AppClientError::SubmissionError { message } => message,
            other => return other,
        };
        let Some(data) = extract_logic_error_data(&message) else {
            return AppClientError::SubmissionError { message };
        };
        // Another application in the group failed
        if self.app_id != 0 && data.app_id.is_some_and(|app_id| app_id != self.app_id) {
            return AppClientError::SubmissionError { message };
        }

        let (line_no, lines) = match self.approval_source_line(data.pc).await {
            Some((line_no, lines)) => (Some(line_no), lines),
            None => (None, Vec::new()),
        };
        debug!(
            "Approval program of {} rejected {} at pc {}: {}",
            self.app.name(),
            data.transaction_id,
            data.pc,
            data.message
        );

        let logic = LogicError {
            message,
            transaction_id: Some(data.transaction_id),
            pc: Some(data.pc),
            line_no,
            lines,
        };
        AppClientError::LogicError {
            message: logic.to_string(),
            logic: Box::new(logic),
        }
    }

    /// One-based approval source line for `pc`, with the listing around it.
    async fn approval_source_line(&self, pc: u64) -> Option<(u64, Vec<String>)> {
        let compiled = match self.compiled_approval().await {
            Ok(compiled) => compiled,
            Err(e) => {
                debug!("No approval source map for {}: {}", self.app.name(), e);
                return None;
            }
        };
        let map = match compiled.pc_map()? {
            Ok(map) => map,
            Err(e) => {
                debug!("Ignoring approval source map for {}: {}", self.app.name(), e);
                return None;
            }
        };

        let line_no = map.line_for_pc(pc)? + 1;
        let source = with_version_pragma(self.app.approval_source(), self.app.version()).ok()?;
        Some((line_no, truncate_listing(&source, line_no, LISTING_CONTEXT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const TX_ID: &str = "MRMFTGBR4LNUHUTJ7FB7IHR5NXGIDUCPTCNNQ5SYH4W7LS7LS2SA";

    #[test]
    fn test_extract_logic_error_data() {
        let node_text = format!(
            "TransactionPool.Remember: transaction {}: logic eval error: assert failed pc=26. \
             Details: app=1001, pc=26, opcodes=intc_0 // 0",
            TX_ID
        );
        let data = extract_logic_error_data(&node_text).unwrap();
        assert_eq!(
            data,
            LogicErrorData {
                transaction_id: TX_ID.to_string(),
                message: "assert failed pc=26".to_string(),
                pc: 26,
                app_id: Some(1001),
            }
        );
    }

    #[rstest]
    #[case("TransactionPool.Remember: transaction TXID: logic eval error: err opcode executed")]
    #[case("overspend")]
    #[case("transaction ABC: logic eval error: rejected. Details: app=1")]
    fn test_non_logic_errors_are_not_parsed(#[case] error_str: &str) {
        assert_eq!(extract_logic_error_data(error_str), None);
    }

    #[rstest]
    #[case(1, vec!["   1 | a", "   2 | b", "   3 | c", "   4 | d"])]
    #[case(5, vec!["   2 | b", "   3 | c", "   4 | d", "   5 | e", "   6 | f"])]
    #[case(12, vec![])]
    fn test_truncate_listing(#[case] center_line: u64, #[case] expected: Vec<&str>) {
        let source = "a\nb\nc\nd\ne\nf";
        assert_eq!(truncate_listing(source, center_line, 3), expected);
    }
}
