use {
    super::audit_repo::insert_audit_entry,
    crate::domain::{
        error::CheckoutError,
        id::{OrderId, PaymentId},
        money::{Currency, Money, MoneyAmount},
        order::{CustomerInfo, NewOrder, OrderItem, OrderSummary},
        payment::{
            Environment, NewPaymentRecord, PaymentMethod, PaymentRecord, PaymentStatus,
            SettleResult, Settlement,
        },
        reference::ReferenceCheck,
        store::{PaymentStore, StoreFuture},
    },
    chrono::{DateTime, Utc},
    sqlx::{PgPool, types::Json},
};

const PAYMENT_COLUMNS: &str = "payment_id, order_id, payment_method, external_payment_id, \
     amount, currency, to_address, testnet, status, transaction_hash, reference_check, \
     failure_reason, payment_link, created_at, updated_at, completed_at";

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    payment_id: String,
    order_id: String,
    payment_method: String,
    external_payment_id: Option<String>,
    amount: i64,
    currency: String,
    to_address: String,
    testnet: bool,
    status: String,
    transaction_hash: Option<String>,
    reference_check: Option<String>,
    failure_reason: Option<String>,
    payment_link: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = CheckoutError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            payment_id: PaymentId::new(row.payment_id)?,
            order_id: OrderId::new(row.order_id)?,
            method: PaymentMethod::try_from(row.payment_method.as_str())?,
            external_id: row.external_payment_id,
            money: Money::new(
                MoneyAmount::new(row.amount)?,
                Currency::try_from(row.currency.as_str())?,
            ),
            recipient: row.to_address,
            environment: Environment::from_testnet(row.testnet),
            status: PaymentStatus::try_from(row.status.as_str())?,
            transaction_reference: row.transaction_hash,
            reference_check: row
                .reference_check
                .as_deref()
                .map(ReferenceCheck::try_from)
                .transpose()?,
            failure_reason: row.failure_reason,
            payment_link: row.payment_link,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    order_id: String,
    payment_method: String,
    amount_usd: i64,
    items: Json<Vec<OrderItem>>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    customer_phone: Option<String>,
    shipping_address: Option<String>,
    shipping_city: Option<String>,
    shipping_country: Option<String>,
    transaction_hash: Option<String>,
    reference_check: Option<String>,
}

impl TryFrom<OrderSummaryRow> for OrderSummary {
    type Error = CheckoutError;

    fn try_from(row: OrderSummaryRow) -> Result<Self, Self::Error> {
        Ok(OrderSummary {
            order_id: OrderId::new(row.order_id)?,
            method: PaymentMethod::try_from(row.payment_method.as_str())?,
            customer: CustomerInfo {
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
                address: row.shipping_address,
                city: row.shipping_city,
                country: row.shipping_country,
            },
            items: row.items.0,
            total: Money::new(MoneyAmount::new(row.amount_usd)?, Currency::Usd),
            transaction_reference: row.transaction_hash,
            reference_check: row
                .reference_check
                .as_deref()
                .map(ReferenceCheck::try_from)
                .transpose()?,
        })
    }
}

/// Postgres-backed store. Owns a pool handle; clone freely.
#[derive(Clone)]
pub struct PgPaymentStore {
    pool: PgPool,
}

impl PgPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Order first, then payment, in one transaction. Nothing reaches a
    /// provider until both rows exist.
    async fn create_checkout_inner(
        &self,
        order: &NewOrder,
        payment: &NewPaymentRecord,
    ) -> Result<(), CheckoutError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders
                (order_id, payment_id, payment_method, amount_usd, amount_cop, status, items,
                 customer_name, customer_email, customer_phone,
                 shipping_address, shipping_city, shipping_country)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.order_id.as_str())
        .bind(order.payment_id.as_str())
        .bind(order.method.as_str())
        .bind(order.amount_usd.amount().cents())
        .bind(order.amount_cop.as_ref().map(|m| m.amount().cents()))
        .bind(Json(&order.items))
        .bind(order.customer.name.as_deref())
        .bind(order.customer.email.as_deref())
        .bind(order.customer.phone.as_deref())
        .bind(order.customer.address.as_deref())
        .bind(order.customer.city.as_deref())
        .bind(order.customer.country.as_deref())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO payments
                (payment_id, order_id, payment_method, amount, currency, to_address, testnet, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')
            "#,
        )
        .bind(payment.payment_id.as_str())
        .bind(payment.order_id.as_str())
        .bind(payment.method.as_str())
        .bind(payment.money.amount().cents())
        .bind(payment.money.currency().as_str())
        .bind(&payment.recipient)
        .bind(payment.environment.is_test())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn attach_external_id_inner(
        &self,
        payment_id: &PaymentId,
        external_id: &str,
        payment_link: Option<&str>,
    ) -> Result<(), CheckoutError> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET external_payment_id = $2, payment_link = $3, updated_at = now()
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id.as_str())
        .bind(external_id)
        .bind(payment_link)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CheckoutError::NotFound(format!("payment {payment_id}")));
        }
        Ok(())
    }

    async fn find_payment_inner(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Option<PaymentRecord>, CheckoutError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
        ))
        .bind(payment_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn find_by_external_id_inner(
        &self,
        method: PaymentMethod,
        external_id: &str,
    ) -> Result<Option<PaymentRecord>, CheckoutError> {
        let row: Option<PaymentRow> = sqlx::query_as(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments \
             WHERE payment_method = $1 AND external_payment_id = $2"
        ))
        .bind(method.as_str())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PaymentRecord::try_from).transpose()
    }

    /// Conditional write: only a `pending` row is touched. Two writers racing
    /// on the same payment both issue the UPDATE; the second blocks on the
    /// row lock, re-checks `status = 'pending'` after the first commits and
    /// matches nothing.
    async fn settle_inner(
        &self,
        payment_id: &PaymentId,
        settlement: &Settlement,
    ) -> Result<SettleResult, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET LOCAL lock_timeout = '5s'")
            .execute(&mut *tx)
            .await?;

        let updated: Option<PaymentRow> = sqlx::query_as(&format!(
            r#"
            UPDATE payments
            SET status = $2,
                transaction_hash = $3,
                reference_check = $4,
                failure_reason = $5,
                updated_at = now(),
                completed_at = CASE WHEN $2 = 'completed' THEN now() ELSE NULL END
            WHERE payment_id = $1 AND status = 'pending'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id.as_str())
        .bind(settlement.status().as_str())
        .bind(settlement.reference())
        .bind(settlement.reference_check().map(|c| c.as_str()))
        .bind(settlement.failure_reason())
        .fetch_optional(&mut *tx)
        .await?;

        match updated {
            Some(row) => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $2,
                        transaction_hash = $3,
                        updated_at = now(),
                        completed_at = CASE WHEN $2 = 'completed' THEN now() ELSE NULL END
                    WHERE order_id = $1 AND status = 'pending'
                    "#,
                )
                .bind(&row.order_id)
                .bind(settlement.status().as_str())
                .bind(settlement.reference())
                .execute(&mut *tx)
                .await?;

                insert_audit_entry(&mut tx, &settlement.applied_audit(payment_id)).await?;
                tx.commit().await?;
                Ok(SettleResult::Applied(row.try_into()?))
            }
            None => {
                let current: Option<PaymentRow> = sqlx::query_as(&format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments WHERE payment_id = $1"
                ))
                .bind(payment_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;

                let Some(current) = current else {
                    tx.rollback().await?;
                    return Err(CheckoutError::NotFound(format!("payment {payment_id}")));
                };
                let current = PaymentRecord::try_from(current)?;

                insert_audit_entry(
                    &mut tx,
                    &settlement.rejected_audit(payment_id, current.status),
                )
                .await?;
                tx.commit().await?;

                tracing::info!(
                    payment_id = %payment_id,
                    current = %current.status,
                    incoming = %settlement.status(),
                    actor = %settlement.source().actor(),
                    "payment already terminal, settlement ignored"
                );
                Ok(SettleResult::AlreadyTerminal(current))
            }
        }
    }

    async fn order_summary_inner(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<OrderSummary>, CheckoutError> {
        let row: Option<OrderSummaryRow> = sqlx::query_as(
            r#"
            SELECT o.order_id, o.payment_method, o.amount_usd, o.items,
                   o.customer_name, o.customer_email, o.customer_phone,
                   o.shipping_address, o.shipping_city, o.shipping_country,
                   p.transaction_hash, p.reference_check
            FROM orders o
            JOIN payments p ON p.payment_id = o.payment_id
            WHERE o.order_id = $1
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderSummary::try_from).transpose()
    }
}

impl PaymentStore for PgPaymentStore {
    fn create_checkout<'a>(
        &'a self,
        order: &'a NewOrder,
        payment: &'a NewPaymentRecord,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.create_checkout_inner(order, payment))
    }

    fn attach_external_id<'a>(
        &'a self,
        payment_id: &'a PaymentId,
        external_id: &'a str,
        payment_link: Option<&'a str>,
    ) -> StoreFuture<'a, ()> {
        Box::pin(self.attach_external_id_inner(payment_id, external_id, payment_link))
    }

    fn find_payment<'a>(
        &'a self,
        payment_id: &'a PaymentId,
    ) -> StoreFuture<'a, Option<PaymentRecord>> {
        Box::pin(self.find_payment_inner(payment_id))
    }

    fn find_by_external_id<'a>(
        &'a self,
        method: PaymentMethod,
        external_id: &'a str,
    ) -> StoreFuture<'a, Option<PaymentRecord>> {
        Box::pin(self.find_by_external_id_inner(method, external_id))
    }

    fn settle_if_pending<'a>(
        &'a self,
        payment_id: &'a PaymentId,
        settlement: &'a Settlement,
    ) -> StoreFuture<'a, SettleResult> {
        Box::pin(self.settle_inner(payment_id, settlement))
    }

    fn order_summary<'a>(
        &'a self,
        order_id: &'a OrderId,
    ) -> StoreFuture<'a, Option<OrderSummary>> {
        Box::pin(self.order_summary_inner(order_id))
    }
}
