use {
    super::error::CheckoutError,
    super::order::OrderSummary,
    std::{future::Future, pin::Pin},
};

pub trait Notifier: Send + Sync {
    /// Tells the customer, the shop admin and the distributor that an order
    /// is paid. Called once per order, after the payment settled.
    fn order_confirmed<'a>(
        &'a self,
        summary: &'a OrderSummary,
    ) -> Pin<Box<dyn Future<Output = Result<(), CheckoutError>> + Send + 'a>>;
}
