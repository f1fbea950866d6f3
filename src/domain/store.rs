use {
    super::error::CheckoutError,
    super::id::{OrderId, PaymentId},
    super::order::{NewOrder, OrderSummary},
    super::payment::{NewPaymentRecord, PaymentMethod, PaymentRecord, SettleResult, Settlement},
    std::{future::Future, pin::Pin},
};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CheckoutError>> + Send + 'a>>;

/// Persistence for orders and their payments.
///
/// `settle_if_pending` is the only way a payment leaves `pending`, and it
/// must be a conditional write at the storage layer: the poller and the
/// provider webhooks race on the same row and at most one may win.
pub trait PaymentStore: Send + Sync {
    fn create_checkout<'a>(
        &'a self,
        order: &'a NewOrder,
        payment: &'a NewPaymentRecord,
    ) -> StoreFuture<'a, ()>;

    fn attach_external_id<'a>(
        &'a self,
        payment_id: &'a PaymentId,
        external_id: &'a str,
        payment_link: Option<&'a str>,
    ) -> StoreFuture<'a, ()>;

    fn find_payment<'a>(&'a self, payment_id: &'a PaymentId)
    -> StoreFuture<'a, Option<PaymentRecord>>;

    fn find_by_external_id<'a>(
        &'a self,
        method: PaymentMethod,
        external_id: &'a str,
    ) -> StoreFuture<'a, Option<PaymentRecord>>;

    fn settle_if_pending<'a>(
        &'a self,
        payment_id: &'a PaymentId,
        settlement: &'a Settlement,
    ) -> StoreFuture<'a, SettleResult>;

    fn order_summary<'a>(&'a self, order_id: &'a OrderId) -> StoreFuture<'a, Option<OrderSummary>>;
}
