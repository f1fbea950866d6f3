use {
    super::error::CheckoutError,
    rust_decimal::{Decimal, prelude::ToPrimitive},
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Amount in minor units (cents / centavos).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub fn new(cents: i64) -> Result<Self, CheckoutError> {
        if cents < 0 {
            return Err(CheckoutError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_mul(self, quantity: u32) -> Option<MoneyAmount> {
        self.0.checked_mul(i64::from(quantity)).map(MoneyAmount)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Cop,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Cop => "cop",
        }
    }

    /// Digits after the decimal point in the major unit.
    pub fn decimals(&self) -> u32 {
        match self {
            Self::Usd | Self::Cop => 2,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = CheckoutError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "cop" => Ok(Self::Cop),
            other => Err(CheckoutError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MoneyAmount,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Parses a major-unit decimal (`1.00` dollars) into minor units without
    /// going through floating point. More fractional digits than the currency
    /// carries is an error, not a rounding.
    pub fn from_major(major: Decimal, currency: Currency) -> Result<Self, CheckoutError> {
        if major.is_sign_negative() {
            return Err(CheckoutError::Validation(format!(
                "amount cannot be negative, got: {major}"
            )));
        }
        let scaled = major
            .checked_mul(Decimal::from(10_i64.pow(currency.decimals())))
            .ok_or_else(|| CheckoutError::Validation(format!("amount {major} is out of range")))?;
        if !scaled.fract().is_zero() {
            return Err(CheckoutError::Validation(format!(
                "amount {major} has more than {} decimal places",
                currency.decimals()
            )));
        }
        let cents = scaled
            .to_i64()
            .ok_or_else(|| CheckoutError::Validation(format!("amount {major} is out of range")))?;
        Ok(Self::new(MoneyAmount::new(cents)?, currency))
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn ensure_positive(&self) -> Result<(), CheckoutError> {
        if self.amount.is_zero() {
            return Err(CheckoutError::Validation(
                "amount must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn to_major(&self) -> Decimal {
        Decimal::new(self.amount.cents(), self.currency.decimals())
    }

    /// Major units with exactly the currency's precision: 100 USD cents is `"1.00"`.
    pub fn to_major_string(&self) -> String {
        format!(
            "{:.*}",
            self.currency.decimals() as usize,
            self.to_major()
        )
    }

    /// USD → COP at `cop_per_usd`, rounded to whole pesos.
    pub fn usd_to_cop(&self, cop_per_usd: Decimal) -> Result<Money, CheckoutError> {
        if self.currency != Currency::Usd {
            return Err(CheckoutError::Validation(format!(
                "cannot convert {} to cop",
                self.currency
            )));
        }
        let pesos = self
            .to_major()
            .checked_mul(cop_per_usd)
            .ok_or_else(|| {
                CheckoutError::Validation(format!("{self} at {cop_per_usd} cop/usd is out of range"))
            })?
            .round();
        Money::from_major(pesos, Currency::Cop)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_major_string(), self.currency)
    }
}
