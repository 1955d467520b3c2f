use crate::error::ScanError;
use regex::Regex;
use serde::Serialize;
use std::str::FromStr;
use std::sync::LazyLock;

static PAYLOAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^SG\|q=(?P<q>[^|]+)\|s=(?P<s>\d+)\|v=(?P<v>\d+)$")
        .unwrap_or_else(|e| panic!("Failed to compile payload pattern: {e}"))
});

/// Parsed `SG|q=<quizId>|s=<sheetId>|v=<version>` identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetPayload {
    /// Quiz the sheet was printed for
    pub quiz_id: String,
    /// Printed sheet number
    pub sheet_id: i64,
    /// Layout version of the quiz
    pub version: u32,
}

impl FromStr for SheetPayload {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScanError::InvalidPayload {
            payload: s.to_string(),
        };
        let caps = PAYLOAD_RE.captures(s).ok_or_else(invalid)?;
        Ok(Self {
            quiz_id: caps["q"].to_string(),
            sheet_id: caps["s"].parse().map_err(|_| invalid())?,
            version: caps["v"].parse().map_err(|_| invalid())?,
        })
    }
}
