//! NDT methods and the normalized result-code vocabulary.
//!
//! Export files spell results many ways (`ACC`, `PASS`, `合格`, ...). Everything is
//! normalized to [`NdtResult`] on import; an empty cell means the method is not
//! tracked for that joint and is stored as NULL.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::CoreError;

// ---------------------------------------------------------------------------
// NdtMethod
// ---------------------------------------------------------------------------

/// Inspection and heat-treatment methods tracked per joint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdtMethod {
    Vt,
    Rt,
    Pt,
    Ut,
    Mt,
    Pmi,
    Ft,
    Ht,
    Pwht,
}

impl NdtMethod {
    pub const ALL: [Self; 9] = [
        Self::Vt,
        Self::Rt,
        Self::Pt,
        Self::Ut,
        Self::Mt,
        Self::Pmi,
        Self::Ft,
        Self::Ht,
        Self::Pwht,
    ];

    /// Lowercase identifier, also the column prefix in SQL (`vt_result`, `vt_total`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vt => "vt",
            Self::Rt => "rt",
            Self::Pt => "pt",
            Self::Ut => "ut",
            Self::Mt => "mt",
            Self::Pmi => "pmi",
            Self::Ft => "ft",
            Self::Ht => "ht",
            Self::Pwht => "pwht",
        }
    }

    /// Uppercase label used in export headers and reports.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vt => "VT",
            Self::Rt => "RT",
            Self::Pt => "PT",
            Self::Ut => "UT",
            Self::Mt => "MT",
            Self::Pmi => "PMI",
            Self::Ft => "FT",
            Self::Ht => "HT",
            Self::Pwht => "PWHT",
        }
    }

    /// Joint column holding this method's result.
    #[must_use]
    pub const fn result_column(self) -> &'static str {
        match self {
            Self::Vt => "vt_result",
            Self::Rt => "rt_result",
            Self::Pt => "pt_result",
            Self::Ut => "ut_result",
            Self::Mt => "mt_result",
            Self::Pmi => "pmi_result",
            Self::Ft => "ft_result",
            Self::Ht => "ht_result",
            Self::Pwht => "pwht_result",
        }
    }
}

impl fmt::Display for NdtMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// NdtResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NdtResult {
    Pending,
    Accepted,
    Rejected,
}

const ACCEPTED_CODES: &[&str] = &["ACC", "ACCEPT", "ACCEPTED", "PASS", "PASSED", "OK", "合格"];
const REJECTED_CODES: &[&str] = &["REJ", "REJECT", "REJECTED", "FAIL", "FAILED", "NG", "不合格"];
const PENDING_CODES: &[&str] = &["PENDING", "WAIT", "WAITING", "-", "TBD", "待检"];

impl NdtResult {
    /// Normalize a raw export cell.
    ///
    /// Empty input yields `Ok(None)`. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Validation` for codes outside the known vocabulary.
    pub fn parse(raw: &str) -> Result<Option<Self>, CoreError> {
        let code = raw.trim().to_uppercase();
        if code.is_empty() {
            return Ok(None);
        }
        let code = code.as_str();
        if ACCEPTED_CODES.contains(&code) {
            Ok(Some(Self::Accepted))
        } else if REJECTED_CODES.contains(&code) {
            Ok(Some(Self::Rejected))
        } else if PENDING_CODES.contains(&code) {
            Ok(Some(Self::Pending))
        } else {
            Err(CoreError::Validation(format!(
                "unknown NDT result code '{}'",
                raw.trim()
            )))
        }
    }

    /// Accepted or rejected: the inspection has a final verdict.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a stored column value.
    #[must_use]
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for NdtResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NdtResults
// ---------------------------------------------------------------------------

/// Per-method results of one joint. `None` means not tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdtResults {
    pub vt: Option<NdtResult>,
    pub rt: Option<NdtResult>,
    pub pt: Option<NdtResult>,
    pub ut: Option<NdtResult>,
    pub mt: Option<NdtResult>,
    pub pmi: Option<NdtResult>,
    pub ft: Option<NdtResult>,
    pub ht: Option<NdtResult>,
    pub pwht: Option<NdtResult>,
}

impl NdtResults {
    #[must_use]
    pub const fn get(&self, method: NdtMethod) -> Option<NdtResult> {
        match method {
            NdtMethod::Vt => self.vt,
            NdtMethod::Rt => self.rt,
            NdtMethod::Pt => self.pt,
            NdtMethod::Ut => self.ut,
            NdtMethod::Mt => self.mt,
            NdtMethod::Pmi => self.pmi,
            NdtMethod::Ft => self.ft,
            NdtMethod::Ht => self.ht,
            NdtMethod::Pwht => self.pwht,
        }
    }

    pub const fn set(&mut self, method: NdtMethod, result: Option<NdtResult>) {
        let slot = match method {
            NdtMethod::Vt => &mut self.vt,
            NdtMethod::Rt => &mut self.rt,
            NdtMethod::Pt => &mut self.pt,
            NdtMethod::Ut => &mut self.ut,
            NdtMethod::Mt => &mut self.mt,
            NdtMethod::Pmi => &mut self.pmi,
            NdtMethod::Ft => &mut self.ft,
            NdtMethod::Ht => &mut self.ht,
            NdtMethod::Pwht => &mut self.pwht,
        };
        *slot = result;
    }

    /// Recorded results in method order.
    pub fn recorded(&self) -> impl Iterator<Item = (NdtMethod, NdtResult)> + '_ {
        NdtMethod::ALL
            .into_iter()
            .filter_map(|method| self.get(method).map(|result| (method, result)))
    }

    /// At least one recorded result and every recorded result accepted.
    #[must_use]
    pub fn all_recorded_accepted(&self) -> bool {
        let mut any = false;
        for (_, result) in self.recorded() {
            if result != NdtResult::Accepted {
                return false;
            }
            any = true;
        }
        any
    }
}
