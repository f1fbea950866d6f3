use {
    super::confirmation::{Attempt, ConfirmedReference, PollPolicy, PollState},
    crate::domain::{
        error::CheckoutError,
        payment::Environment,
        provider::{PaymentHandle, PaymentProvider, StatusSnapshot},
        reference::ReferenceFormat,
    },
    serde::Serialize,
    std::time::Duration,
    tokio::sync::watch,
};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// How a confirmation run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Succeeded {
        reference: ConfirmedReference,
        attempts: u32,
    },
    Failed {
        reason: String,
        attempts: u32,
    },
    /// Budget spent without a terminal answer. Not a failure: the payment may
    /// still settle and must be reconciled.
    TimedOut { attempts: u32 },
    /// Caller went away. Same standing as `TimedOut`.
    Cancelled { attempts: u32 },
}

impl ConfirmationOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::TimedOut { attempts }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::TimedOut { .. } | Self::Cancelled { .. })
    }
}

/// Asks a provider about one payment at a fixed interval until it settles,
/// fails, or the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct ConfirmationPoller {
    interval: Duration,
    max_attempts: u32,
    attempt_timeout: Option<Duration>,
}

impl Default for ConfirmationPoller {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            attempt_timeout: None,
        }
    }
}

impl ConfirmationPoller {
    pub fn new(interval: Duration, max_attempts: u32) -> Result<Self, CheckoutError> {
        if max_attempts == 0 {
            return Err(CheckoutError::Validation(
                "max_attempts must be at least 1".into(),
            ));
        }
        Ok(Self {
            interval,
            max_attempts,
            attempt_timeout: None,
        })
    }

    /// Caps each status query. A query that runs over counts as a transient
    /// error and spends its attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Upper bound on one `run` when every query is capped, `None` otherwise.
    pub fn max_run_time(&self) -> Option<Duration> {
        let per_query = self.attempt_timeout?;
        Some(self.interval * (self.max_attempts - 1) + per_query * self.max_attempts)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs until a terminal outcome. Waits between attempts (never after the
    /// last one) and gives up as soon as `cancel` turns `true`.
    ///
    /// Retryable provider errors spend an attempt and are otherwise ignored.
    /// Non-retryable ones end the run with the error.
    #[tracing::instrument(
        name = "confirm_payment",
        skip_all,
        fields(method = %provider.method(), external_id = %handle.external_id)
    )]
    pub async fn run(
        &self,
        provider: &dyn PaymentProvider,
        handle: &PaymentHandle,
        environment: Environment,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<ConfirmationOutcome, CheckoutError> {
        let policy = PollPolicy {
            format: ReferenceFormat::for_method(provider.method()),
            max_attempts: self.max_attempts,
        };
        let mut state = PollState::start();

        loop {
            let attempts = state.attempts();
            if attempts > 0 {
                tokio::select! {
                    _ = cancelled(&mut cancel) => {
                        tracing::info!(attempts, "confirmation cancelled while waiting");
                        return Ok(ConfirmationOutcome::Cancelled { attempts });
                    }
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }

            let answer = tokio::select! {
                _ = cancelled(&mut cancel) => {
                    tracing::info!(attempts, "confirmation cancelled during status query");
                    return Ok(ConfirmationOutcome::Cancelled { attempts });
                }
                answer = self.query(provider, handle, environment) => answer,
            };

            state = match answer {
                Ok(snapshot) => {
                    tracing::debug!(attempt = attempts + 1, status = ?snapshot.status, "status answered");
                    state.observe(Attempt::Answered(&snapshot), handle, policy)
                }
                Err(e) if e.is_retryable() => {
                    tracing::debug!(attempt = attempts + 1, error = %e, "transient status error, retrying");
                    state.observe(Attempt::Transient, handle, policy)
                }
                Err(e) => {
                    tracing::warn!(attempt = attempts + 1, error = %e, "status query rejected, aborting");
                    return Err(e);
                }
            };

            match state {
                PollState::Polling { .. } => continue,
                PollState::Succeeded {
                    reference,
                    attempts,
                } => {
                    tracing::info!(attempts, reference = %reference.reference, check = ?reference.check, "payment confirmed");
                    return Ok(ConfirmationOutcome::Succeeded {
                        reference,
                        attempts,
                    });
                }
                PollState::Failed { reason, attempts } => {
                    tracing::info!(attempts, reason = %reason, "payment failed");
                    return Ok(ConfirmationOutcome::Failed { reason, attempts });
                }
                PollState::TimedOut { attempts } => {
                    tracing::warn!(attempts, "no terminal status within attempt budget");
                    return Ok(ConfirmationOutcome::TimedOut { attempts });
                }
            }
        }
    }

    async fn query(
        &self,
        provider: &dyn PaymentProvider,
        handle: &PaymentHandle,
        environment: Environment,
    ) -> Result<StatusSnapshot, CheckoutError> {
        let query = provider.fetch_status(handle, environment);
        let Some(limit) = self.attempt_timeout else {
            return query.await;
        };
        tokio::time::timeout(limit, query).await.unwrap_or_else(|_| {
            Err(CheckoutError::provider(
                provider.method().as_str(),
                format!("no status answer within {limit:?}"),
                true,
            ))
        })
    }
}

/// Resolves once cancellation is requested. If every sender is gone nobody
/// can cancel any more, so it never resolves.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
