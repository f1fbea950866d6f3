use {
    crate::domain::{
        audit::NewAuditEntry,
        error::CheckoutError,
        id::{OrderId, PaymentId},
        order::{NewOrder, OrderSummary},
        payment::{
            NewPaymentRecord, PaymentMethod, PaymentRecord, PaymentStatus, SettleResult,
            Settlement,
        },
        store::{PaymentStore, StoreFuture},
    },
    chrono::Utc,
    std::{
        collections::HashMap,
        sync::{Mutex, MutexGuard},
    },
};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, (NewOrder, PaymentStatus)>,
    payments: HashMap<PaymentId, PaymentRecord>,
    audit: Vec<NewAuditEntry>,
}

/// Process-local store. One mutex around everything makes the
/// check-and-set in `settle_if_pending` atomic, like the conditional UPDATE
/// in Postgres.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // A panic mid-update leaves nothing half-written worth refusing.
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn audit_entries(&self, entity_id: &str) -> Vec<NewAuditEntry> {
        self.lock()
            .audit
            .iter()
            .filter(|a| a.entity_id == entity_id)
            .cloned()
            .collect()
    }

    pub fn order_status(&self, order_id: &OrderId) -> Option<PaymentStatus> {
        self.lock().orders.get(order_id).map(|(_, status)| *status)
    }

    fn settle(
        &self,
        payment_id: &PaymentId,
        settlement: &Settlement,
    ) -> Result<SettleResult, CheckoutError> {
        let mut tables = self.lock();
        let Tables {
            orders,
            payments,
            audit,
        } = &mut *tables;

        let record = payments
            .get_mut(payment_id)
            .ok_or_else(|| CheckoutError::NotFound(format!("payment {payment_id}")))?;

        if !record.status.can_transition_to(&settlement.status()) {
            audit.push(settlement.rejected_audit(payment_id, record.status));
            return Ok(SettleResult::AlreadyTerminal(record.clone()));
        }

        let now = Utc::now();
        record.status = settlement.status();
        record.transaction_reference = settlement.reference().map(str::to_string);
        record.reference_check = settlement.reference_check();
        record.failure_reason = settlement.failure_reason().map(str::to_string);
        record.updated_at = now;
        if settlement.status() == PaymentStatus::Completed {
            record.completed_at = Some(now);
        }
        if let Some((_, order_status)) = orders.get_mut(&record.order_id) {
            *order_status = settlement.status();
        }
        audit.push(settlement.applied_audit(payment_id));

        Ok(SettleResult::Applied(record.clone()))
    }
}

impl PaymentStore for InMemoryStore {
    fn create_checkout<'a>(
        &'a self,
        order: &'a NewOrder,
        payment: &'a NewPaymentRecord,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.lock();
            if tables.orders.contains_key(&order.order_id)
                || tables.payments.contains_key(&payment.payment_id)
            {
                return Err(CheckoutError::Validation(format!(
                    "order {} already exists",
                    order.order_id
                )));
            }
            tables
                .orders
                .insert(order.order_id.clone(), (order.clone(), PaymentStatus::Pending));
            tables.payments.insert(
                payment.payment_id.clone(),
                payment.clone().into_record(Utc::now()),
            );
            Ok(())
        })
    }

    fn attach_external_id<'a>(
        &'a self,
        payment_id: &'a PaymentId,
        external_id: &'a str,
        payment_link: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut tables = self.lock();
            let record = tables
                .payments
                .get_mut(payment_id)
                .ok_or_else(|| CheckoutError::NotFound(format!("payment {payment_id}")))?;
            record.external_id = Some(external_id.to_string());
            record.payment_link = payment_link.map(str::to_string);
            record.updated_at = Utc::now();
            Ok(())
        })
    }

    fn find_payment<'a>(
        &'a self,
        payment_id: &'a PaymentId,
    ) -> StoreFuture<'a, Option<PaymentRecord>> {
        Box::pin(async move { Ok(self.lock().payments.get(payment_id).cloned()) })
    }

    fn find_by_external_id<'a>(
        &'a self,
        method: PaymentMethod,
        external_id: &'a str,
    ) -> StoreFuture<'a, Option<PaymentRecord>> {
        Box::pin(async move {
            Ok(self
                .lock()
                .payments
                .values()
                .find(|p| p.method == method && p.external_id.as_deref() == Some(external_id))
                .cloned())
        })
    }

    fn settle_if_pending<'a>(
        &'a self,
        payment_id: &'a PaymentId,
        settlement: &'a Settlement,
    ) -> StoreFuture<'a, SettleResult> {
        Box::pin(async move { self.settle(payment_id, settlement) })
    }

    fn order_summary<'a>(
        &'a self,
        order_id: &'a OrderId,
    ) -> StoreFuture<'a, Option<OrderSummary>> {
        Box::pin(async move {
            let tables = self.lock();
            let Some((order, _)) = tables.orders.get(order_id) else {
                return Ok(None);
            };
            let payment = tables.payments.get(&order.payment_id);
            Ok(Some(OrderSummary {
                order_id: order.order_id.clone(),
                method: order.method,
                customer: order.customer.clone(),
                items: order.items.clone(),
                total: order.amount_usd.clone(),
                transaction_reference: payment.and_then(|p| p.transaction_reference.clone()),
                reference_check: payment.and_then(|p| p.reference_check),
            }))
        })
    }
}
