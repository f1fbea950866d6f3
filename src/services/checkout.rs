use {
    super::{
        confirmation::extract_reference,
        poller::{ConfirmationOutcome, ConfirmationPoller},
        registry::ProviderRegistry,
    },
    crate::domain::{
        error::CheckoutError,
        id::{OrderId, PaymentId},
        money::{Currency, Money},
        notify::Notifier,
        order::{CustomerInfo, NewOrder, OrderItem},
        payment::{
            Environment, NewPaymentRecord, PaymentMethod, PaymentRecord, PaymentStatus,
            SettleResult, Settlement, SettlementSource,
        },
        provider::{PayerInfoRequest, PaymentHandle, PaymentRequest, ProviderStatus},
        reference::{ReferenceCheck, ReferenceFormat, TransactionReference},
        store::PaymentStore,
    },
    rust_decimal::Decimal,
    serde::Serialize,
    std::sync::Arc,
    tokio::sync::watch,
};

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Wallet that receives crypto payments.
    pub base_pay_recipient: String,
    pub cop_per_usd: Decimal,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub method: PaymentMethod,
    pub amount_usd: Money,
    pub items: Vec<OrderItem>,
    pub customer: CustomerInfo,
    pub environment: Environment,
    pub payer_info: Option<PayerInfoRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutStarted {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub method: PaymentMethod,
    pub external_id: String,
    /// What the provider was asked to charge.
    pub charged: Money,
    pub checkout_url: Option<String>,
    pub client_secret: Option<String>,
}

/// Where a payment stands after a confirm call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationReport {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub status: PaymentStatus,
    pub transaction_reference: Option<String>,
    pub reference_check: Option<ReferenceCheck>,
    pub failure_reason: Option<String>,
    /// Present only when this call polled the provider.
    pub outcome: Option<ConfirmationOutcome>,
}

impl ConfirmationReport {
    fn new(record: &PaymentRecord, outcome: Option<ConfirmationOutcome>) -> Self {
        Self {
            payment_id: record.payment_id.clone(),
            order_id: record.order_id.clone(),
            status: record.status,
            transaction_reference: record.transaction_reference.clone(),
            reference_check: record.reference_check,
            failure_reason: record.failure_reason.clone(),
            outcome,
        }
    }
}

/// One status answer, as shown to the storefront.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub id: String,
    pub status: ProviderStatus,
    /// Only a reference read from a reference field; never the id fallback.
    pub transaction_hash: Option<String>,
    pub reference_check: Option<ReferenceCheck>,
    pub failure_reason: Option<String>,
}

/// A signed provider callback, already verified and decoded.
#[derive(Debug, Clone)]
pub struct WebhookUpdate {
    pub method: PaymentMethod,
    pub external_id: String,
    pub status: ProviderStatus,
    pub reference: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Ignored(&'static str),
    Settled(PaymentRecord),
    AlreadyTerminal(PaymentRecord),
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored(_) => "ignored",
            Self::Settled(_) => "settled",
            Self::AlreadyTerminal(_) => "already_terminal",
        }
    }
}

/// Checkout flow: start a payment, confirm it by polling, record the result,
/// and accept provider webhooks for the same records.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn PaymentStore>,
    notifier: Arc<dyn Notifier>,
    providers: ProviderRegistry,
    poller: ConfirmationPoller,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        notifier: Arc<dyn Notifier>,
        providers: ProviderRegistry,
        poller: ConfirmationPoller,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            providers,
            poller,
            settings,
        }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn store(&self) -> &Arc<dyn PaymentStore> {
        &self.store
    }

    /// Persists the order and a pending payment, then asks the provider to
    /// take the payment. If the provider refuses, the record stays pending
    /// and the caller gets `Initiation`; it must not go on to confirm.
    #[tracing::instrument(name = "checkout_start", skip_all, fields(method = %request.method))]
    pub async fn start(&self, request: CheckoutRequest) -> Result<CheckoutStarted, CheckoutError> {
        if request.amount_usd.currency() != Currency::Usd {
            return Err(CheckoutError::Validation(format!(
                "cart totals are in usd, got {}",
                request.amount_usd.currency()
            )));
        }
        request.amount_usd.ensure_positive()?;
        for item in &request.items {
            if item.quantity == 0 {
                return Err(CheckoutError::Validation(format!(
                    "item {} has zero quantity",
                    item.product_id
                )));
            }
        }

        let provider = self.providers.get(request.method)?;
        let amount_cop = request.amount_usd.usd_to_cop(self.settings.cop_per_usd)?;
        let charged = match request.method {
            PaymentMethod::Wompi => amount_cop.clone(),
            PaymentMethod::BasePay | PaymentMethod::Stripe => request.amount_usd.clone(),
        };
        let recipient = match request.method {
            PaymentMethod::BasePay => self.settings.base_pay_recipient.clone(),
            PaymentMethod::Stripe | PaymentMethod::Wompi => String::new(),
        };

        let order_id = OrderId::generate();
        let payment_id = PaymentId::generate();
        let description = format!("{} producto(s)", request.items.len());

        let order = NewOrder {
            order_id: order_id.clone(),
            payment_id: payment_id.clone(),
            method: request.method,
            amount_usd: request.amount_usd.clone(),
            amount_cop: Some(amount_cop),
            items: request.items,
            customer: request.customer,
        };
        let payment = NewPaymentRecord {
            payment_id: payment_id.clone(),
            order_id: order_id.clone(),
            method: request.method,
            money: charged.clone(),
            recipient: recipient.clone(),
            environment: request.environment,
        };
        self.store.create_checkout(&order, &payment).await?;
        tracing::info!(order_id = %order_id, payment_id = %payment_id, amount = %charged, "checkout recorded as pending");

        let provider_request = PaymentRequest {
            order_id: order_id.clone(),
            payment_id: payment_id.clone(),
            amount: charged.clone(),
            recipient,
            environment: request.environment,
            payer_info: request.payer_info,
            description,
        };
        let initiation = provider.initiate(&provider_request).await.map_err(|e| {
            tracing::warn!(payment_id = %payment_id, error = %e, "provider refused payment, record stays pending");
            e.into_initiation()
        })?;

        self.store
            .attach_external_id(
                &payment_id,
                &initiation.handle.external_id,
                initiation.checkout_url.as_deref(),
            )
            .await?;
        tracing::info!(payment_id = %payment_id, external_id = %initiation.handle.external_id, "payment initiated");

        Ok(CheckoutStarted {
            order_id,
            payment_id,
            method: request.method,
            external_id: initiation.handle.external_id,
            charged,
            checkout_url: initiation.checkout_url,
            client_secret: initiation.client_secret,
        })
    }

    /// Polls the provider until the payment settles, fails, the attempt
    /// budget runs out or `cancel` fires, then records the result. A payment
    /// that is already terminal is reported without polling.
    #[tracing::instrument(name = "checkout_confirm", skip_all, fields(payment_id = %payment_id))]
    pub async fn confirm(
        &self,
        payment_id: &PaymentId,
        cancel: watch::Receiver<bool>,
    ) -> Result<ConfirmationReport, CheckoutError> {
        let record = self.payment(payment_id).await?;
        if record.status.is_terminal() {
            tracing::debug!(status = %record.status, "already settled, not polling");
            return Ok(ConfirmationReport::new(&record, None));
        }

        let external_id = record.external_id.clone().ok_or_else(|| {
            CheckoutError::Validation(format!("payment {payment_id} was never initiated"))
        })?;
        let provider = self.providers.get(record.method)?;
        let handle = PaymentHandle::new(external_id);

        let outcome = self
            .poller
            .run(provider.as_ref(), &handle, record.environment, cancel)
            .await?;

        let record = match self.record_outcome(payment_id, &outcome).await? {
            Some(result) => result.record().clone(),
            None => record,
        };
        Ok(ConfirmationReport::new(&record, Some(outcome)))
    }

    /// Writes a poller outcome. `TimedOut` and `Cancelled` write nothing: the
    /// payment may still settle and is left pending for reconciliation.
    pub async fn record_outcome(
        &self,
        payment_id: &PaymentId,
        outcome: &ConfirmationOutcome,
    ) -> Result<Option<SettleResult>, CheckoutError> {
        let settlement = match outcome {
            ConfirmationOutcome::Succeeded { reference, .. } => Settlement::completed(
                reference.reference.clone(),
                reference.check,
                SettlementSource::Poller,
            ),
            ConfirmationOutcome::Failed { reason, .. } => Settlement::Failed {
                reason: reason.clone(),
                source: SettlementSource::Poller,
            },
            ConfirmationOutcome::TimedOut { attempts } | ConfirmationOutcome::Cancelled { attempts } => {
                tracing::warn!(
                    payment_id = %payment_id,
                    attempts,
                    outcome = ?outcome,
                    "confirmation ended without a terminal status, payment left pending"
                );
                return Ok(None);
            }
        };
        self.settle(payment_id, &settlement).await.map(Some)
    }

    /// Applies a verified webhook through the same conditional write the
    /// poller uses. Pending notifications are ignored.
    #[tracing::instrument(
        name = "webhook_apply",
        skip_all,
        fields(method = %update.method, external_id = %update.external_id)
    )]
    pub async fn apply_webhook(&self, update: WebhookUpdate) -> Result<WebhookOutcome, CheckoutError> {
        let source = SettlementSource::Webhook(update.method);
        let settlement = match update.status {
            ProviderStatus::Pending => return Ok(WebhookOutcome::Ignored("not terminal")),
            ProviderStatus::Completed => {
                webhook_completion(&update, ReferenceFormat::for_method(update.method), source)
            }
            ProviderStatus::Failed => Settlement::Failed {
                reason: update
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "provider reported failure".to_string()),
                source,
            },
        };

        let record = match self
            .store
            .find_by_external_id(update.method, &update.external_id)
            .await?
        {
            Some(record) => record,
            None => {
                // Some callbacks carry our own payment id instead.
                let by_own_id = match PaymentId::new(update.external_id.clone()) {
                    Ok(id) => self.store.find_payment(&id).await?,
                    Err(_) => None,
                };
                by_own_id
                    .filter(|r| r.method == update.method)
                    .ok_or_else(|| {
                        CheckoutError::NotFound(format!(
                            "{} payment {}",
                            update.method, update.external_id
                        ))
                    })?
            }
        };

        match self.settle(&record.payment_id, &settlement).await? {
            SettleResult::Applied(record) => Ok(WebhookOutcome::Settled(record)),
            SettleResult::AlreadyTerminal(record) => Ok(WebhookOutcome::AlreadyTerminal(record)),
        }
    }

    pub async fn payment(&self, payment_id: &PaymentId) -> Result<PaymentRecord, CheckoutError> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("payment {payment_id}")))
    }

    /// One status query, nothing written.
    pub async fn query_status(
        &self,
        method: PaymentMethod,
        external_id: &str,
        environment: Environment,
    ) -> Result<StatusView, CheckoutError> {
        let provider = self.providers.get(method)?;
        let handle = PaymentHandle::new(external_id);
        let snapshot = provider.fetch_status(&handle, environment).await?;

        let reference = match snapshot.status {
            ProviderStatus::Completed => {
                extract_reference(&snapshot, &handle, ReferenceFormat::for_method(method))
            }
            _ => None,
        };
        if snapshot.status == ProviderStatus::Completed && reference.is_none() {
            tracing::warn!(external_id, "completed without a well-formed reference");
        }

        Ok(StatusView {
            id: snapshot.id,
            status: snapshot.status,
            transaction_hash: reference
                .as_ref()
                .filter(|r| r.is_verified())
                .map(|r| r.reference.to_string()),
            reference_check: reference.map(|r| r.check),
            failure_reason: snapshot.failure_reason,
        })
    }

    /// The single path out of `pending`. Only the writer whose `Completed`
    /// was applied notifies, so the order is announced once.
    async fn settle(
        &self,
        payment_id: &PaymentId,
        settlement: &Settlement,
    ) -> Result<SettleResult, CheckoutError> {
        let result = self.store.settle_if_pending(payment_id, settlement).await?;

        match &result {
            SettleResult::Applied(record) => {
                tracing::info!(
                    payment_id = %payment_id,
                    status = %record.status,
                    actor = %settlement.source().actor(),
                    "payment settled"
                );
                if record.status == PaymentStatus::Completed {
                    self.dispatch_notification(record.order_id.clone());
                }
            }
            SettleResult::AlreadyTerminal(record) if record.status != settlement.status() => {
                tracing::warn!(
                    payment_id = %payment_id,
                    current = %record.status,
                    incoming = %settlement.status(),
                    actor = %settlement.source().actor(),
                    "conflicting settlement rejected"
                );
            }
            SettleResult::AlreadyTerminal(_) => {}
        }
        Ok(result)
    }

    /// Runs detached so a caller that goes away after the settlement does not
    /// take the notification down with it. Failures are logged, never undone.
    fn dispatch_notification(&self, order_id: OrderId) {
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            let summary = match store.order_summary(&order_id).await {
                Ok(Some(summary)) => summary,
                Ok(None) => {
                    tracing::error!(order_id = %order_id, "settled payment has no order, nothing to notify");
                    return;
                }
                Err(e) => {
                    tracing::error!(order_id = %order_id, error = %e, "loading order for notification failed");
                    return;
                }
            };
            if let Err(e) = notifier.order_confirmed(&summary).await {
                tracing::error!(order_id = %order_id, error = %e, "order notification failed");
            }
        });
    }
}

/// Webhook references are stored even when malformed, flagged for
/// reconciliation; the provider already moved the money.
fn webhook_completion(
    update: &WebhookUpdate,
    format: ReferenceFormat,
    source: SettlementSource,
) -> Settlement {
    if let Some(raw) = update.reference.as_deref().map(str::trim) {
        return match TransactionReference::parse(raw, format) {
            Ok(reference) => Settlement::completed(reference, ReferenceCheck::Verified, source),
            Err(_) => {
                tracing::warn!(reference = raw, "webhook completed with malformed reference, flagging");
                Settlement::Completed {
                    reference: raw.to_string(),
                    check: ReferenceCheck::Malformed,
                    source,
                }
            }
        };
    }

    match TransactionReference::parse(update.external_id.as_str(), format) {
        Ok(reference) => {
            tracing::warn!(reference = %reference, "webhook carried no reference, using payment id");
            Settlement::completed(reference, ReferenceCheck::Heuristic, source)
        }
        Err(_) => {
            tracing::warn!("webhook completed without any usable reference, flagging");
            Settlement::Completed {
                reference: update.external_id.clone(),
                check: ReferenceCheck::Malformed,
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x8f3a3c1e4b5d6f708192a3b4c5d6e7f8091a2b3c4d5e6f708192a3b4c5d6e7f8";

    fn update(external_id: &str, reference: Option<&str>) -> WebhookUpdate {
        WebhookUpdate {
            method: PaymentMethod::BasePay,
            external_id: external_id.to_string(),
            status: ProviderStatus::Completed,
            reference: reference.map(str::to_string),
            failure_reason: None,
        }
    }

    #[test]
    fn webhook_reference_checks() {
        let source = SettlementSource::Webhook(PaymentMethod::BasePay);
        let format = ReferenceFormat::OnchainHash;

        let s = webhook_completion(&update("bp_1", Some(HASH)), format, source);
        assert_eq!(s.reference_check(), Some(ReferenceCheck::Verified));

        let s = webhook_completion(&update("bp_1", Some("0xfeed")), format, source);
        assert_eq!(s.reference_check(), Some(ReferenceCheck::Malformed));
        assert_eq!(s.reference(), Some("0xfeed"));

        let s = webhook_completion(&update(HASH, None), format, source);
        assert_eq!(s.reference_check(), Some(ReferenceCheck::Heuristic));

        let s = webhook_completion(&update("bp_1", None), format, source);
        assert_eq!(s.reference_check(), Some(ReferenceCheck::Malformed));
    }
}
