use {
    super::id::{OrderId, PaymentId},
    super::money::Money,
    super::payment::PaymentMethod,
    super::reference::ReferenceCheck,
    serde::{Deserialize, Serialize},
};

/// One cart line as the storefront submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    /// Unit price in USD cents.
    pub unit_price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl CustomerInfo {
    pub fn shipping_line(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.address, &self.city, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// For INSERT at checkout start.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub method: PaymentMethod,
    pub amount_usd: Money,
    pub amount_cop: Option<Money>,
    pub items: Vec<OrderItem>,
    pub customer: CustomerInfo,
}

/// What the notifier needs once an order is paid.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub customer: CustomerInfo,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub transaction_reference: Option<String>,
    pub reference_check: Option<ReferenceCheck>,
}

impl OrderSummary {
    /// Only verified references are shown to people as proof of payment.
    pub fn displayable_reference(&self) -> Option<&str> {
        match self.reference_check {
            Some(ReferenceCheck::Verified) => self.transaction_reference.as_deref(),
            _ => None,
        }
    }
}
