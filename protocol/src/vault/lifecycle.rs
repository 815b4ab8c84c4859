//! # Proposal Lifecycle
//!
//! propose → sign (quorum collection) → execute (timelock + quorum check +
//! balance mutation).
//!
//! Propose only checks that the draft names a type, an asset and an
//! amount. Type support, amount positivity and spoke presence are decided
//! by execute, the single gate in front of any balance change.
//!
//! Every operation validates first and mutates after, so a failing call
//! leaves the state exactly as it found it.

use chrono::{DateTime, Duration, SubsecRound, Utc};

use super::error::{VaultError, VaultResult};
use super::proposal::{Amount, ExecutionReceipt, Proposal, ProposalDraft, ProposalId, ProposalKind};
use super::state::VaultState;
use crate::clock::Clock;
use crate::config::{DEFAULT_REQUIRED_SIGS, SECONDS_PER_HOUR};

/// A fully validated execution, ready to apply.
struct Disbursement {
    id: ProposalId,
    kind: ProposalKind,
    asset: String,
    amount: f64,
    spoke: Option<String>,
}

impl VaultState {
    /// Queues a new proposal and returns its id.
    ///
    /// `timelock_hours` delays execution: the proposal cannot run before
    /// `now + timelock_hours * 3600s`.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Validation`] naming the first missing draft
    /// field (`type`, `asset`, `amount`), `timelock_hours` when it is
    /// negative or not finite, or `next_id` once the id space is used up.
    pub fn propose(
        &mut self,
        draft: ProposalDraft,
        timelock_hours: f64,
        clock: &dyn Clock,
    ) -> VaultResult<ProposalId> {
        let ProposalDraft {
            kind,
            asset,
            amount,
            spoke,
        } = draft;

        let kind = kind.ok_or(VaultError::Validation { field: "type" })?;
        let asset = asset.ok_or(VaultError::Validation { field: "asset" })?;
        let amount = amount.ok_or(VaultError::Validation { field: "amount" })?;

        // Millisecond precision is what the persisted record keeps.
        let now = clock.now().trunc_subsecs(3);
        let not_before = timelock_deadline(now, timelock_hours)?;

        let id = ProposalId(self.next_id);
        let next_id = self
            .next_id
            .checked_add(1)
            .ok_or(VaultError::Validation { field: "next_id" })?;
        self.next_id = next_id;
        self.pending.insert(
            id,
            Proposal {
                kind: Some(kind),
                asset: Some(asset),
                amount: Some(amount),
                spoke,
                required_sigs: DEFAULT_REQUIRED_SIGS,
                signatures: Default::default(),
                not_before,
                created_at: Some(now),
            },
        );
        Ok(id)
    }

    /// Records `key`'s approval of proposal `id`.
    ///
    /// Returns `true` when the signature is new and `false` when `key` had
    /// already signed (which is not an error). Signing is allowed past
    /// quorum and regardless of the timelock.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] for an unknown id, then
    /// [`VaultError::Unauthorized`] for a key outside the key set.
    pub fn sign(&mut self, id: ProposalId, key: &str) -> VaultResult<bool> {
        let authorized = self.keys.contains(key);
        let proposal = self
            .pending
            .get_mut(&id)
            .ok_or(VaultError::NotFound { id })?;

        if !authorized {
            return Err(VaultError::Unauthorized {
                key: key.to_string(),
            });
        }

        if proposal.signatures.contains(key) {
            return Ok(false);
        }
        proposal.signatures.insert(key.to_string());
        Ok(true)
    }

    /// Applies proposal `id` and removes it from the pending set.
    ///
    /// Checks run in a fixed order and the first failure wins:
    ///
    /// 1. [`VaultError::NotFound`]
    /// 2. [`VaultError::InsufficientSignatures`]
    /// 3. [`VaultError::TimelockActive`]
    /// 4. [`VaultError::UnsupportedType`]
    /// 5. [`VaultError::MissingField`] (`asset`, `amount`, then `spoke` for `fund_spoke`)
    /// 6. [`VaultError::InvalidAmount`]
    /// 7. [`VaultError::InsufficientFunds`]
    /// 8. [`VaultError::BalanceOverflow`] (`fund_spoke` credit to the spoke)
    ///
    /// `fund_spoke` moves the amount from the vault into the spoke,
    /// creating the spoke with a zero balance for every vault asset if it
    /// does not exist yet. `pay_tax` removes the amount from the vault.
    pub fn execute(&mut self, id: ProposalId, clock: &dyn Clock) -> VaultResult<ExecutionReceipt> {
        let now = clock.now();
        let disbursement = self.check_execution(id, now)?;
        Ok(self.apply(disbursement, now))
    }

    /// Whether `id` has reached quorum and its timelock has elapsed at `now`.
    ///
    /// Says nothing about the later field and funds checks.
    pub fn is_executable(&self, id: ProposalId, now: DateTime<Utc>) -> bool {
        self.pending
            .get(&id)
            .is_some_and(|p| p.has_quorum() && p.timelock_elapsed(now))
    }

    /// Credits funds arriving from outside the treasury.
    ///
    /// Creates the asset entry if needed and returns the new vault balance.
    ///
    /// # Errors
    ///
    /// [`VaultError::Validation`] for an empty asset symbol,
    /// [`VaultError::InvalidAmount`] unless `amount` is positive and finite,
    /// [`VaultError::BalanceOverflow`] if the new balance would not be finite.
    pub fn deposit(&mut self, asset: &str, amount: impl Into<Amount>) -> VaultResult<f64> {
        if asset.is_empty() {
            return Err(VaultError::Validation { field: "asset" });
        }
        let amount = amount.into().positive()?;
        let balance = credited("vault", self.vault_balance(asset), asset, amount)?;
        self.vault.insert(asset.to_string(), balance);
        Ok(balance)
    }

    fn check_execution(&self, id: ProposalId, now: DateTime<Utc>) -> VaultResult<Disbursement> {
        let proposal = self.pending.get(&id).ok_or(VaultError::NotFound { id })?;

        if !proposal.has_quorum() {
            return Err(VaultError::InsufficientSignatures {
                id,
                have: proposal.signature_count(),
                need: proposal.required_sigs,
            });
        }

        if !proposal.timelock_elapsed(now) {
            return Err(VaultError::TimelockActive {
                id,
                not_before: proposal.not_before,
                now,
            });
        }

        let kind = match &proposal.kind {
            Some(kind) if kind.is_supported() => kind.clone(),
            Some(kind) => {
                return Err(VaultError::UnsupportedType {
                    kind: kind.to_string(),
                })
            }
            None => {
                return Err(VaultError::UnsupportedType {
                    kind: "<none>".to_string(),
                })
            }
        };

        let asset = proposal
            .asset
            .as_deref()
            .ok_or(VaultError::MissingField { id, field: "asset" })?;
        let amount = proposal
            .amount
            .as_ref()
            .ok_or(VaultError::MissingField { id, field: "amount" })?;
        let spoke = match kind {
            ProposalKind::FundSpoke => Some(
                proposal
                    .spoke
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(VaultError::MissingField { id, field: "spoke" })?
                    .to_string(),
            ),
            _ => None,
        };

        let amount = amount.positive()?;

        let available = self.vault_balance(asset);
        if available < amount {
            return Err(VaultError::InsufficientFunds {
                asset: asset.to_string(),
                available,
                required: amount,
            });
        }

        if let Some(spoke) = &spoke {
            credited(spoke, self.spoke_balance(spoke, asset), asset, amount)?;
        }

        Ok(Disbursement {
            id,
            kind,
            asset: asset.to_string(),
            amount,
            spoke,
        })
    }

    fn apply(&mut self, d: Disbursement, now: DateTime<Utc>) -> ExecutionReceipt {
        if let Some(spoke) = &d.spoke {
            if !self.spokes.contains_key(spoke) {
                let zeroed = self.vault.keys().map(|a| (a.clone(), 0.0)).collect();
                self.spokes.insert(spoke.clone(), zeroed);
            }
            if let Some(balances) = self.spokes.get_mut(spoke) {
                *balances.entry(d.asset.clone()).or_insert(0.0) += d.amount;
            }
        }
        *self.vault.entry(d.asset.clone()).or_insert(0.0) -= d.amount;
        self.pending.remove(&d.id);

        ExecutionReceipt {
            id: d.id,
            kind: d.kind,
            asset: d.asset,
            amount: d.amount,
            spoke: d.spoke,
            executed_at: now,
        }
    }
}

/// `balance + amount`, provided the result is still a finite number.
fn credited(account: &str, balance: f64, asset: &str, amount: f64) -> VaultResult<f64> {
    let total = balance + amount;
    if total.is_finite() {
        Ok(total)
    } else {
        Err(VaultError::BalanceOverflow {
            account: account.to_string(),
            asset: asset.to_string(),
            amount,
        })
    }
}

fn timelock_deadline(now: DateTime<Utc>, hours: f64) -> VaultResult<DateTime<Utc>> {
    let invalid = VaultError::Validation {
        field: "timelock_hours",
    };
    if !hours.is_finite() || hours < 0.0 {
        return Err(invalid);
    }
    let millis = (hours * SECONDS_PER_HOUR * 1_000.0).round();
    if millis > i64::MAX as f64 {
        return Err(invalid);
    }
    Duration::try_milliseconds(millis as i64)
        .and_then(|delay| now.checked_add_signed(delay))
        .ok_or(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn clock() -> FixedClock {
        FixedClock::at_timestamp(1_700_000_000)
    }

    fn funded(eth: f64) -> VaultState {
        let mut state = VaultState::default();
        state.deposit("ETH", eth).unwrap();
        state
    }

    fn approved(state: &mut VaultState, id: ProposalId) {
        state.sign(id, "K1").unwrap();
        state.sign(id, "K2").unwrap();
    }

    #[test]
    fn propose_sets_defaults() {
        let clock = clock();
        let mut state = VaultState::default();
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 2.0, &clock)
            .unwrap();
        let p = state.proposal(id).unwrap();
        assert_eq!(p.required_sigs, 2);
        assert!(p.signatures.is_empty());
        assert_eq!(p.not_before.timestamp(), 1_700_000_000 + 7_200);
        assert_eq!(p.created_at, Some(clock.now()));
    }

    #[test]
    fn propose_reports_first_missing_field() {
        let clock = clock();
        let mut state = VaultState::default();
        let mut draft = ProposalDraft::default();
        assert_eq!(
            state.propose(draft.clone(), 0.0, &clock),
            Err(VaultError::Validation { field: "type" })
        );
        draft.kind = Some(ProposalKind::PayTax);
        assert_eq!(
            state.propose(draft.clone(), 0.0, &clock),
            Err(VaultError::Validation { field: "asset" })
        );
        draft.asset = Some("ETH".into());
        assert_eq!(
            state.propose(draft, 0.0, &clock),
            Err(VaultError::Validation { field: "amount" })
        );
        assert_eq!(state.pending_len(), 0);
        assert_eq!(state.next_id(), ProposalId(0));
    }

    #[test]
    fn propose_rejects_bad_timelock() {
        let clock = clock();
        let mut state = VaultState::default();
        for hours in [-1.0, f64::NAN, f64::INFINITY, 1e300] {
            let err = state
                .propose(ProposalDraft::pay_tax("ETH", 1), hours, &clock)
                .unwrap_err();
            assert_eq!(err, VaultError::Validation { field: "timelock_hours" });
        }
        assert_eq!(state.pending_len(), 0);
    }

    #[test]
    fn propose_is_permissive_about_content() {
        let clock = clock();
        let mut state = VaultState::default();
        let draft = ProposalDraft {
            kind: Some(ProposalKind::from("mint")),
            asset: Some("DOGE".into()),
            amount: Some(Amount::from(-5)),
            spoke: None,
        };
        assert!(state.propose(draft, 0.0, &clock).is_ok());
    }

    #[test]
    fn sign_is_idempotent() {
        let clock = clock();
        let mut state = VaultState::default();
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 0.0, &clock)
            .unwrap();
        assert!(state.sign(id, "K1").unwrap());
        assert!(!state.sign(id, "K1").unwrap());
        assert_eq!(state.proposal(id).unwrap().signature_count(), 1);
    }

    #[test]
    fn sign_checks_existence_before_key() {
        let mut state = VaultState::default();
        assert_eq!(
            state.sign(ProposalId(9), "nobody"),
            Err(VaultError::NotFound { id: ProposalId(9) })
        );
    }

    #[test]
    fn extra_signatures_beyond_quorum_accepted() {
        let clock = clock();
        let mut state = VaultState::default();
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 0.0, &clock)
            .unwrap();
        approved(&mut state, id);
        assert!(state.sign(id, "K3").unwrap());
        assert_eq!(state.proposal(id).unwrap().signature_count(), 3);
    }

    #[test]
    fn quorum_checked_before_everything_else() {
        let clock = clock();
        let mut state = VaultState::default();
        let draft = ProposalDraft {
            kind: Some(ProposalKind::from("mint")),
            asset: Some("ETH".into()),
            amount: Some(Amount::from(0)),
            spoke: None,
        };
        let id = state.propose(draft, 5.0, &clock).unwrap();
        state.sign(id, "K1").unwrap();
        let err = state.execute(id, &clock).unwrap_err();
        assert_eq!(err.kind(), "InsufficientSignaturesError");
    }

    #[test]
    fn timelock_checked_before_type() {
        let clock = clock();
        let mut state = VaultState::default();
        let draft = ProposalDraft {
            kind: Some(ProposalKind::from("mint")),
            asset: Some("ETH".into()),
            amount: Some(Amount::from(1)),
            spoke: None,
        };
        let id = state.propose(draft, 1.0, &clock).unwrap();
        approved(&mut state, id);
        assert_eq!(state.execute(id, &clock).unwrap_err().kind(), "TimelockActiveError");

        clock.advance(Duration::hours(1));
        assert_eq!(
            state.execute(id, &clock).unwrap_err(),
            VaultError::UnsupportedType { kind: "mint".into() }
        );
    }

    #[test]
    fn missing_spoke_reported_before_amount() {
        let clock = clock();
        let mut state = funded(100.0);
        let draft = ProposalDraft {
            kind: Some(ProposalKind::FundSpoke),
            asset: Some("ETH".into()),
            amount: Some(Amount::from(-1)),
            spoke: Some(String::new()),
        };
        let id = state.propose(draft, 0.0, &clock).unwrap();
        approved(&mut state, id);
        assert_eq!(
            state.execute(id, &clock).unwrap_err(),
            VaultError::MissingField { id, field: "spoke" }
        );
    }

    #[test]
    fn invalid_amount_reported_before_funds() {
        let clock = clock();
        let mut state = VaultState::default();
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 0), 0.0, &clock)
            .unwrap();
        approved(&mut state, id);
        assert_eq!(state.execute(id, &clock).unwrap_err().kind(), "InvalidAmountError");
    }

    #[test]
    fn unknown_asset_counts_as_empty() {
        let clock = clock();
        let mut state = funded(100.0);
        let id = state
            .propose(ProposalDraft::pay_tax("BTC", 1), 0.0, &clock)
            .unwrap();
        approved(&mut state, id);
        assert_eq!(
            state.execute(id, &clock).unwrap_err(),
            VaultError::InsufficientFunds {
                asset: "BTC".into(),
                available: 0.0,
                required: 1.0,
            }
        );
        assert!(!state.vault().contains_key("BTC"));
    }

    #[test]
    fn pay_tax_burns_from_vault() {
        let clock = clock();
        let mut state = funded(50.0);
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 20), 0.0, &clock)
            .unwrap();
        approved(&mut state, id);
        let receipt = state.execute(id, &clock).unwrap();
        assert_eq!(receipt.kind, ProposalKind::PayTax);
        assert_eq!(receipt.spoke, None);
        assert_eq!(state.vault_balance("ETH"), 30.0);
        assert_eq!(state.total_supply("ETH"), 30.0);
        assert!(state.spokes().is_empty());
    }

    #[test]
    fn new_spoke_gets_every_vault_asset() {
        let clock = clock();
        let mut state = funded(10.0);
        state.deposit("DAI", 1).unwrap();
        let id = state
            .propose(ProposalDraft::fund_spoke("ETH", 10, "alpha"), 0.0, &clock)
            .unwrap();
        approved(&mut state, id);
        state.execute(id, &clock).unwrap();
        let spoke = state.spoke("alpha").unwrap();
        assert_eq!(spoke.len(), 3);
        assert_eq!(spoke["ETH"], 10.0);
        assert_eq!(spoke["USDC"], 0.0);
        assert_eq!(spoke["DAI"], 0.0);
        assert_eq!(state.vault_balance("ETH"), 0.0);
    }

    #[test]
    fn ids_survive_earlier_execution() {
        let clock = clock();
        let mut state = funded(100.0);
        let first = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 0.0, &clock)
            .unwrap();
        let second = state
            .propose(ProposalDraft::pay_tax("ETH", 2), 0.0, &clock)
            .unwrap();
        approved(&mut state, first);
        state.execute(first, &clock).unwrap();

        assert!(state.proposal(first).is_none());
        assert_eq!(
            state.proposal(second).unwrap().amount,
            Some(Amount::from(2))
        );
        let third = state
            .propose(ProposalDraft::pay_tax("ETH", 3), 0.0, &clock)
            .unwrap();
        assert!(third > second);
    }

    #[test]
    fn is_executable_tracks_quorum_and_timelock() {
        let clock = clock();
        let mut state = VaultState::default();
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 1.0, &clock)
            .unwrap();
        approved(&mut state, id);
        assert!(!state.is_executable(id, clock.now()));
        assert!(state.is_executable(id, clock.now() + Duration::hours(1)));
        assert!(!state.is_executable(ProposalId(42), clock.now()));
    }

    #[test]
    fn deposit_validates_amount() {
        let mut state = VaultState::default();
        assert_eq!(state.deposit("ETH", 2.5).unwrap(), 2.5);
        assert_eq!(state.deposit("ETH", 2.5).unwrap(), 5.0);
        assert_eq!(state.deposit("ETH", 0).unwrap_err().kind(), "InvalidAmountError");
        assert_eq!(
            state.deposit("", 1).unwrap_err(),
            VaultError::Validation { field: "asset" }
        );
    }

    #[test]
    fn deposit_rejects_overflowing_balance() {
        let mut state = VaultState::default();
        state.deposit("ETH", 1e308).unwrap();
        let before = state.clone();

        let err = state.deposit("ETH", 1e308).unwrap_err();
        assert_eq!(err.kind(), "BalanceOverflowError");
        assert_eq!(state, before);
        assert_eq!(state.vault_balance("ETH"), 1e308);
    }

    #[test]
    fn spoke_credit_overflow_leaves_state_untouched() {
        let clock = clock();
        let mut state = funded(1e308);
        let first = state
            .propose(ProposalDraft::fund_spoke("ETH", 1e308, "alpha"), 0.0, &clock)
            .unwrap();
        approved(&mut state, first);
        state.execute(first, &clock).unwrap();

        state.deposit("ETH", 1e308).unwrap();
        let second = state
            .propose(ProposalDraft::fund_spoke("ETH", 1e308, "alpha"), 0.0, &clock)
            .unwrap();
        approved(&mut state, second);
        let before = state.clone();

        assert_eq!(
            state.execute(second, &clock).unwrap_err(),
            VaultError::BalanceOverflow {
                account: "alpha".into(),
                asset: "ETH".into(),
                amount: 1e308,
            }
        );
        assert_eq!(state, before);
        assert!(state.spoke_balance("alpha", "ETH").is_finite());
    }

    #[test]
    fn exhausted_id_counter_is_rejected() {
        let clock = clock();
        let mut state: VaultState = serde_json::from_value(serde_json::json!({
            "vault": { "ETH": 0 },
            "spokes": {},
            "pending": [],
            "keys": ["K1", "K2", "K3"],
            "next_id": u64::MAX
        }))
        .unwrap();
        let before = state.clone();

        let err = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 0.0, &clock)
            .unwrap_err();
        assert_eq!(err, VaultError::Validation { field: "next_id" });
        assert_eq!(state, before);
    }

    #[test]
    fn proposal_times_survive_a_save_and_reload() {
        let instant = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let clock = FixedClock::new(instant);
        let mut state = VaultState::default();
        let id = state
            .propose(ProposalDraft::pay_tax("ETH", 1), 0.25, &clock)
            .unwrap();

        let p = state.proposal(id).unwrap();
        assert_eq!(p.created_at.unwrap().timestamp_millis(), 1_700_000_000_123);
        assert_eq!(p.not_before.timestamp_subsec_nanos(), 123_000_000);

        let reloaded: VaultState =
            serde_json::from_slice(&serde_json::to_vec(&state).unwrap()).unwrap();
        assert_eq!(reloaded, state);
    }
}
