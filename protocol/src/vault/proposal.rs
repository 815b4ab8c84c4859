//! Proposal types: the draft a caller submits, the pending proposal the
//! vault tracks, and the receipt returned once one is applied.
//!
//! Proposals deliberately tolerate malformed content. An unknown `type`
//! or a non-numeric `amount` is retained as-is and only rejected when
//! someone tries to execute it; see [`super::lifecycle`].

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{VaultError, VaultResult};
use crate::config::DEFAULT_REQUIRED_SIGS;

// ---------------------------------------------------------------------------
// ProposalId
// ---------------------------------------------------------------------------

/// Stable identifier of a pending proposal.
///
/// Assigned from a monotonically increasing counter at propose time and
/// never reused, so executing one proposal does not shift the identity of
/// any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProposalId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for ProposalId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(ProposalId)
    }
}

// ---------------------------------------------------------------------------
// ProposalKind
// ---------------------------------------------------------------------------

/// What a proposal does once executed.
///
/// Persisted as the snake_case strings `fund_spoke` / `pay_tax`. Any other
/// string survives a round-trip as [`ProposalKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProposalKind {
    /// Move funds from the vault into a named spoke.
    FundSpoke,
    /// Burn funds out of the vault as a fee.
    PayTax,
    /// Anything else. Accepted by propose, rejected by execute.
    Other(String),
}

impl ProposalKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::FundSpoke => "fund_spoke",
            Self::PayTax => "pay_tax",
            Self::Other(raw) => raw,
        }
    }

    /// Whether execute knows how to apply this kind.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<String> for ProposalKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "fund_spoke" => Self::FundSpoke,
            "pay_tax" => Self::PayTax,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for ProposalKind {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<ProposalKind> for String {
    fn from(kind: ProposalKind) -> Self {
        match kind {
            ProposalKind::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A proposal amount as submitted.
///
/// Normally a JSON number. Anything else (a string, a bool, an object) is
/// kept verbatim so that the persisted record stays loadable and execute
/// can report it as an [`VaultError::InvalidAmount`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    /// A numeric amount. Not necessarily positive.
    Number(f64),
    /// A non-numeric value.
    Malformed(serde_json::Value),
}

impl Amount {
    /// Returns the amount if it is a positive finite number.
    pub fn positive(&self) -> VaultResult<f64> {
        match self {
            Self::Number(n) if n.is_finite() && *n > 0.0 => Ok(*n),
            other => Err(VaultError::InvalidAmount {
                value: other.to_string(),
            }),
        }
    }
}

impl From<f64> for Amount {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Amount {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u64> for Amount {
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Malformed(v) => write!(f, "{}", v),
        }
    }
}

// ---------------------------------------------------------------------------
// ProposalDraft
// ---------------------------------------------------------------------------

/// An unvalidated proposal request.
///
/// Propose only checks that `type`, `asset` and `amount` are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    #[serde(rename = "type", default)]
    pub kind: Option<ProposalKind>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoke: Option<String>,
}

impl ProposalDraft {
    /// Draft for moving `amount` of `asset` into `spoke`.
    pub fn fund_spoke(
        asset: impl Into<String>,
        amount: impl Into<Amount>,
        spoke: impl Into<String>,
    ) -> Self {
        Self {
            kind: Some(ProposalKind::FundSpoke),
            asset: Some(asset.into()),
            amount: Some(amount.into()),
            spoke: Some(spoke.into()),
        }
    }

    /// Draft for paying `amount` of `asset` out of the vault as a fee.
    pub fn pay_tax(asset: impl Into<String>, amount: impl Into<Amount>) -> Self {
        Self {
            kind: Some(ProposalKind::PayTax),
            asset: Some(asset.into()),
            amount: Some(amount.into()),
            spoke: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

fn default_required_sigs() -> usize {
    DEFAULT_REQUIRED_SIGS
}

/// A pending transaction awaiting quorum and timelock expiry.
///
/// Field names match the persisted record (`type`, `requiredSigs`,
/// `not_before`), which is why `kind`/`asset`/`amount` stay optional here
/// even though propose always fills them: a record written by another tool
/// may lack them, and execute has to say so.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    #[serde(rename = "type", default)]
    pub kind: Option<ProposalKind>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoke: Option<String>,
    /// Signatures needed before execution. Fixed at creation.
    #[serde(rename = "requiredSigs", default = "default_required_sigs")]
    pub required_sigs: usize,
    /// Distinct keys that approved this proposal.
    #[serde(default)]
    pub signatures: BTreeSet<String>,
    /// Execution is forbidden strictly before this instant.
    #[serde(with = "epoch_seconds")]
    pub not_before: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "epoch_seconds::option"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Proposal {
    /// Number of distinct approvals collected.
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Whether `key` has already signed.
    pub fn is_signed_by(&self, key: &str) -> bool {
        self.signatures.contains(key)
    }

    /// Whether the quorum requirement is met.
    pub fn has_quorum(&self) -> bool {
        self.signatures.len() >= self.required_sigs
    }

    /// Whether the timelock has elapsed at `now`.
    pub fn timelock_elapsed(&self, now: DateTime<Utc>) -> bool {
        now >= self.not_before
    }
}

// ---------------------------------------------------------------------------
// ExecutionReceipt
// ---------------------------------------------------------------------------

/// What an execute call applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub id: ProposalId,
    pub kind: ProposalKind,
    pub asset: String,
    pub amount: f64,
    /// Credited spoke, for `fund_spoke`.
    pub spoke: Option<String>,
    pub executed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Timestamp encoding
// ---------------------------------------------------------------------------

/// Unix-epoch seconds, integral when possible, fractional otherwise.
///
/// Accepts both integer and floating point input so records written with
/// sub-second precision still load.
pub(crate) mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        if instant.timestamp_subsec_millis() == 0 {
            s.serialize_i64(instant.timestamp())
        } else {
            s.serialize_f64(instant.timestamp_millis() as f64 / 1_000.0)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(d)?;
        from_secs(secs).ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", secs)))
    }

    pub(crate) fn from_secs(secs: f64) -> Option<DateTime<Utc>> {
        if !secs.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis((secs * 1_000.0).round() as i64)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            instant: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match instant {
                Some(instant) => super::serialize(instant, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<f64>::deserialize(d)?
                .map(|secs| {
                    super::from_secs(secs).ok_or_else(|| {
                        serde::de::Error::custom(format!("timestamp out of range: {}", secs))
                    })
                })
                .transpose()
        }
    }
}
