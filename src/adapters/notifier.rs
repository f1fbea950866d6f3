use {
    super::http_client::ProviderHttpClient,
    crate::{
        config::{NotificationConfig, ResendConfig, TwilioConfig},
        domain::{
            error::CheckoutError,
            money::{Currency, Money, MoneyAmount},
            notify::Notifier,
            order::OrderSummary,
        },
    },
    reqwest::Method,
    std::{fmt::Write as _, future::Future, pin::Pin, time::Duration},
};

const RESEND_URL: &str = "https://api.resend.com/emails";
const TWILIO_URL: &str = "https://api.twilio.com/2010-04-01/Accounts";

type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), CheckoutError>> + Send + 'a>>;

/// Logs what would have been sent. Used when no delivery channel is
/// configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn order_confirmed<'a>(&'a self, summary: &'a OrderSummary) -> NotifyFuture<'a> {
        Box::pin(async move {
            tracing::info!(
                order_id = %summary.order_id,
                method = %summary.method,
                total = %summary.total,
                items = summary.items.len(),
                customer_email = summary.customer.email.as_deref().unwrap_or("-"),
                "order paid (notifications not configured, logged only)"
            );
            Ok(())
        })
    }
}

/// Customer and admin e-mail through Resend, distributor WhatsApp through
/// Twilio. Every configured channel is attempted; the first error is
/// returned after all of them ran.
pub struct HttpNotifier {
    http: ProviderHttpClient,
    resend: Option<ResendConfig>,
    twilio: Option<TwilioConfig>,
}

impl HttpNotifier {
    pub fn new(config: &NotificationConfig, timeout: Duration) -> Result<Self, CheckoutError> {
        Ok(Self {
            http: ProviderHttpClient::new("notifications", timeout)?,
            resend: config.resend.clone(),
            twilio: config.twilio.clone(),
        })
    }

    async fn send_email(
        &self,
        resend: &ResendConfig,
        to: &str,
        subject: String,
        text: String,
    ) -> Result<(), CheckoutError> {
        let payload = serde_json::json!({
            "from": resend.from,
            "to": [to],
            "subject": subject,
            "text": text,
        });
        let _: serde_json::Value = self
            .http
            .request_json(Method::POST, RESEND_URL, Some(&resend.api_key), Some(&payload))
            .await?;
        Ok(())
    }

    async fn send_whatsapp(&self, twilio: &TwilioConfig, body: String) -> Result<(), CheckoutError> {
        let url = format!("{TWILIO_URL}/{}/Messages.json", twilio.account_sid);
        let from = format!("whatsapp:{}", twilio.whatsapp_from);
        let to = format!("whatsapp:{}", twilio.distributor_whatsapp);
        self.http
            .post_form(
                &url,
                (twilio.account_sid.as_str(), twilio.auth_token.as_str()),
                &[("From", from.as_str()), ("To", to.as_str()), ("Body", body.as_str())],
            )
            .await?;
        Ok(())
    }

    async fn order_confirmed_inner(&self, summary: &OrderSummary) -> Result<(), CheckoutError> {
        let mut first_error = None;
        let mut record = |channel: &'static str, result: Result<(), CheckoutError>| match result {
            Ok(()) => tracing::info!(order_id = %summary.order_id, channel, "notification sent"),
            Err(e) => {
                tracing::error!(order_id = %summary.order_id, channel, error = %e, "notification failed");
                first_error.get_or_insert(e);
            }
        };

        if let Some(resend) = &self.resend {
            match summary.customer.email.as_deref() {
                Some(email) => record(
                    "customer_email",
                    self.send_email(
                        resend,
                        email,
                        format!("Confirmación de Pedido #{}", summary.order_id),
                        customer_message(summary),
                    )
                    .await,
                ),
                None => tracing::warn!(order_id = %summary.order_id, "no customer e-mail, skipping confirmation"),
            }
            if let Some(admin) = resend.admin_email.as_deref() {
                record(
                    "admin_email",
                    self.send_email(
                        resend,
                        admin,
                        format!("Nueva Orden para Procesar #{}", summary.order_id),
                        fulfillment_message(summary),
                    )
                    .await,
                );
            }
        }

        if let Some(twilio) = &self.twilio {
            record(
                "distributor_whatsapp",
                self.send_whatsapp(twilio, fulfillment_message(summary)).await,
            );
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Notifier for HttpNotifier {
    fn order_confirmed<'a>(&'a self, summary: &'a OrderSummary) -> NotifyFuture<'a> {
        Box::pin(self.order_confirmed_inner(summary))
    }
}

fn item_lines(summary: &OrderSummary) -> String {
    let mut out = String::new();
    for item in &summary.items {
        let line_total = MoneyAmount::new(item.unit_price)
            .ok()
            .and_then(|p| p.checked_mul(item.quantity))
            .map(|amount| Money::new(amount, Currency::Usd).to_major_string())
            .unwrap_or_else(|| "?".to_string());
        let variant = item
            .variant
            .as_deref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        let _ = writeln!(out, "- {}{} x{}: ${}", item.name, variant, item.quantity, line_total);
    }
    out
}

pub fn customer_message(summary: &OrderSummary) -> String {
    let name = summary.customer.name.as_deref().unwrap_or("cliente");
    let mut out = format!(
        "Hola {name}, recibimos tu pago.\n\nPedido: {}\n\n{}\nTotal: ${} USD\n",
        summary.order_id,
        item_lines(summary),
        summary.total.to_major_string()
    );
    if let Some(reference) = summary.displayable_reference() {
        let _ = writeln!(out, "Referencia de pago: {reference}");
    }
    out
}

pub fn fulfillment_message(summary: &OrderSummary) -> String {
    let customer = &summary.customer;
    let mut out = format!(
        "Nueva orden {} ({})\n\n{}\nTotal: ${} USD\n",
        summary.order_id,
        summary.method,
        item_lines(summary),
        summary.total.to_major_string()
    );
    let _ = writeln!(
        out,
        "Cliente: {} / {} / {}",
        customer.name.as_deref().unwrap_or("-"),
        customer.email.as_deref().unwrap_or("-"),
        customer.phone.as_deref().unwrap_or("-"),
    );
    if let Some(shipping) = customer.shipping_line() {
        let _ = writeln!(out, "Envío: {shipping}");
    }
    if let (Some(reference), Some(check)) =
        (summary.transaction_reference.as_deref(), summary.reference_check)
    {
        let _ = writeln!(out, "Referencia: {reference} ({})", check.as_str());
    }
    out
}
