use {
    crate::domain::{
        provider::{PaymentHandle, ProviderStatus, StatusSnapshot},
        reference::{ReferenceCheck, ReferenceFormat, TransactionReference},
    },
    serde::Serialize,
};

/// Where providers have been seen to put the settlement reference, in the
/// order they are tried. Responses are not consistent across SDK versions.
pub const REFERENCE_FIELDS: &[&str] = &[
    "/transactionReference",
    "/transactionHash",
    "/transaction_hash",
    "/txHash",
    "/hash",
    "/receipt/transactionHash",
    "/transaction/hash",
    "/data/transactionHash",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmedReference {
    pub reference: TransactionReference,
    pub check: ReferenceCheck,
    /// JSON pointer the reference came from; `None` for the id fallback.
    pub field: Option<&'static str>,
}

impl ConfirmedReference {
    pub fn is_verified(&self) -> bool {
        self.check == ReferenceCheck::Verified
    }
}

/// Picks the first well-formed reference out of a status answer.
///
/// Falls back to the payment id (snapshot id, then handle id) only when no
/// reference field matched; the result is then marked `Heuristic`.
pub fn extract_reference(
    snapshot: &StatusSnapshot,
    handle: &PaymentHandle,
    format: ReferenceFormat,
) -> Option<ConfirmedReference> {
    let verified = REFERENCE_FIELDS.iter().find_map(|field| {
        let raw = snapshot.body.pointer(field)?.as_str()?.trim();
        let reference = TransactionReference::parse(raw, format).ok()?;
        Some(ConfirmedReference {
            reference,
            check: ReferenceCheck::Verified,
            field: Some(*field),
        })
    });
    if verified.is_some() {
        return verified;
    }

    [snapshot.id.as_str(), handle.external_id.as_str()]
        .into_iter()
        .find_map(|id| TransactionReference::parse(id, format).ok())
        .map(|reference| {
            tracing::warn!(
                reference = %reference,
                "no reference field matched, accepting payment id as unverified reference"
            );
            ConfirmedReference {
                reference,
                check: ReferenceCheck::Heuristic,
                field: None,
            }
        })
}

/// What one poll attempt produced.
#[derive(Debug, Clone, Copy)]
pub enum Attempt<'a> {
    Answered(&'a StatusSnapshot),
    /// Network hiccup or provider 5xx. Costs an attempt, nothing else.
    Transient,
}

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub format: ReferenceFormat,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Polling { attempts: u32 },
    Succeeded { reference: ConfirmedReference, attempts: u32 },
    Failed { reason: String, attempts: u32 },
    TimedOut { attempts: u32 },
}

impl PollState {
    pub fn start() -> Self {
        Self::Polling { attempts: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Polling { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Polling { attempts }
            | Self::Succeeded { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::TimedOut { attempts } => *attempts,
        }
    }

    /// One transition. Terminal states absorb every further observation.
    ///
    /// `completed` without a usable reference is not terminal: providers
    /// flip the status before the hash is attached.
    pub fn observe(self, attempt: Attempt<'_>, handle: &PaymentHandle, policy: PollPolicy) -> Self {
        let Self::Polling { attempts } = self else {
            return self;
        };
        let attempts = attempts + 1;

        if let Attempt::Answered(snapshot) = attempt {
            match snapshot.status {
                ProviderStatus::Failed => {
                    return Self::Failed {
                        reason: snapshot
                            .failure_reason
                            .clone()
                            .unwrap_or_else(|| "provider reported failure".to_string()),
                        attempts,
                    };
                }
                ProviderStatus::Completed => {
                    if let Some(reference) = extract_reference(snapshot, handle, policy.format) {
                        return Self::Succeeded {
                            reference,
                            attempts,
                        };
                    }
                    tracing::debug!(
                        external_id = %handle.external_id,
                        attempts,
                        "completed without a well-formed reference, polling on"
                    );
                }
                ProviderStatus::Pending => {}
            }
        }

        if attempts >= policy.max_attempts {
            Self::TimedOut { attempts }
        } else {
            Self::Polling { attempts }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x8f3a3c1e4b5d6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7f8";
    const OTHER_HASH: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn snapshot(id: &str, status: ProviderStatus, body: serde_json::Value) -> StatusSnapshot {
        StatusSnapshot {
            id: id.to_string(),
            status,
            failure_reason: None,
            body,
        }
    }

    fn policy(max_attempts: u32) -> PollPolicy {
        PollPolicy {
            format: ReferenceFormat::OnchainHash,
            max_attempts,
        }
    }

    #[test]
    fn direct_field_wins() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot(
            "payment_1",
            ProviderStatus::Completed,
            serde_json::json!({ "transactionHash": HASH, "hash": OTHER_HASH }),
        );
        let found = extract_reference(&snap, &handle, ReferenceFormat::OnchainHash).unwrap();
        assert_eq!(found.reference.as_str(), HASH);
        assert_eq!(found.check, ReferenceCheck::Verified);
        assert_eq!(found.field, Some("/transactionHash"));
    }

    #[test]
    fn malformed_candidates_are_skipped_for_later_ones() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot(
            "payment_1",
            ProviderStatus::Completed,
            serde_json::json!({
                "transactionHash": "0xdeadbeef",
                "txHash": 42,
                "receipt": { "transactionHash": HASH },
            }),
        );
        let found = extract_reference(&snap, &handle, ReferenceFormat::OnchainHash).unwrap();
        assert_eq!(found.reference.as_str(), HASH);
        assert_eq!(found.field, Some("/receipt/transactionHash"));
    }

    #[test]
    fn id_fallback_is_flagged_heuristic() {
        let handle = PaymentHandle::new(HASH);
        let snap = snapshot(HASH, ProviderStatus::Completed, serde_json::json!({}));
        let found = extract_reference(&snap, &handle, ReferenceFormat::OnchainHash).unwrap();
        assert_eq!(found.reference.as_str(), HASH);
        assert_eq!(found.check, ReferenceCheck::Heuristic);
        assert!(!found.is_verified());
        assert_eq!(found.field, None);
    }

    #[test]
    fn nothing_usable_yields_none() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot(
            "payment_1",
            ProviderStatus::Completed,
            serde_json::json!({ "transactionHash": "pending" }),
        );
        assert!(extract_reference(&snap, &handle, ReferenceFormat::OnchainHash).is_none());
    }

    #[test]
    fn completed_without_reference_keeps_polling() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot("payment_1", ProviderStatus::Completed, serde_json::json!({}));
        let state = PollState::start().observe(Attempt::Answered(&snap), &handle, policy(3));
        assert_eq!(state, PollState::Polling { attempts: 1 });
    }

    #[test]
    fn failed_is_terminal_immediately() {
        let handle = PaymentHandle::new("payment_1");
        let mut snap = snapshot("payment_1", ProviderStatus::Failed, serde_json::json!({}));
        snap.failure_reason = Some("insufficient balance".into());
        let state = PollState::start().observe(Attempt::Answered(&snap), &handle, policy(30));
        assert_eq!(
            state,
            PollState::Failed {
                reason: "insufficient balance".into(),
                attempts: 1
            }
        );
    }

    #[test]
    fn budget_exhaustion_times_out() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot("payment_1", ProviderStatus::Pending, serde_json::json!({}));
        let mut state = PollState::start();
        state = state.observe(Attempt::Answered(&snap), &handle, policy(2));
        state = state.observe(Attempt::Transient, &handle, policy(2));
        assert_eq!(state, PollState::TimedOut { attempts: 2 });
    }

    #[test]
    fn terminal_states_absorb() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot(
            "payment_1",
            ProviderStatus::Completed,
            serde_json::json!({ "transactionHash": HASH }),
        );
        let timed_out = PollState::TimedOut { attempts: 2 };
        assert_eq!(
            timed_out
                .clone()
                .observe(Attempt::Answered(&snap), &handle, policy(2)),
            timed_out
        );
    }

    #[test]
    fn success_on_last_attempt_beats_timeout() {
        let handle = PaymentHandle::new("payment_1");
        let snap = snapshot(
            "payment_1",
            ProviderStatus::Completed,
            serde_json::json!({ "transactionHash": HASH }),
        );
        let state = PollState::Polling { attempts: 2 }.observe(
            Attempt::Answered(&snap),
            &handle,
            policy(3),
        );
        assert!(matches!(state, PollState::Succeeded { attempts: 3, .. }));
    }
}
