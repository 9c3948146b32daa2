//! Order intent and the checks applied before an order is signed.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::processor::Order;
use crate::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market = 0,
    Limit = 1,
}

impl FromStr for OrderType {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "market" | "0" => Ok(Self::Market),
            "limit" | "1" => Ok(Self::Limit),
            other => Err(OrderError::ConfigError(format!("unknown order type `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day = 0,
    #[default]
    Gtc = 1,
    Ioc = 2,
    Fok = 3,
}

impl FromStr for TimeInForce {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "0" => Ok(Self::Day),
            "gtc" | "1" => Ok(Self::Gtc),
            "ioc" | "2" => Ok(Self::Ioc),
            "fok" | "3" => Ok(Self::Fok),
            other => Err(OrderError::ConfigError(format!(
                "unknown time in force `{other}`"
            ))),
        }
    }
}

/// Lifecycle state reported by `getOrderStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    None,
    Active,
    Fulfilled,
    Cancelled,
}

impl TryFrom<u8> for OrderStatus {
    type Error = OrderError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Active),
            2 => Ok(Self::Fulfilled),
            3 => Ok(Self::Cancelled),
            other => Err(OrderError::ChainError(format!("unknown order status {other}"))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "NONE",
            Self::Active => "ACTIVE",
            Self::Fulfilled => "FULFILLED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

/// What the operator wants to trade.
///
/// `amount` is in payment token units for buys and asset token units for
/// sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub asset_token: Address,
    pub payment_token: Address,
    pub sell: bool,
    pub order_type: OrderType,
    pub amount: U256,
    pub price: U256,
    pub tif: TimeInForce,
}

impl OrderRequest {
    /// Sell and limit orders are subject to the processor's decimal limit.
    pub fn needs_precision_check(&self) -> bool {
        self.sell || self.order_type == OrderType::Limit
    }

    /// Token the permit is signed for: the payment token for buys, the
    /// asset token for sells.
    pub fn permit_token(&self) -> Address {
        if self.sell {
            self.asset_token
        } else {
            self.payment_token
        }
    }

    /// Amount the processor may pull. Buy fees are added on top of the
    /// order amount; sell fees come out of the proceeds.
    pub fn permit_value(&self, fees: U256) -> Result<U256, OrderError> {
        if self.sell {
            return Ok(self.amount);
        }
        self.amount
            .checked_add(fees)
            .ok_or_else(|| OrderError::InvalidOrder("order amount plus fees overflows".to_string()))
    }

    /// Build the processor's `Order` struct.
    pub fn to_order(&self, recipient: Address) -> Order {
        let (asset_quantity, payment_quantity) = if self.sell {
            (self.amount, U256::ZERO)
        } else {
            (U256::ZERO, self.amount)
        };
        Order {
            recipient,
            assetToken: self.asset_token,
            paymentToken: self.payment_token,
            sell: self.sell,
            orderType: self.order_type as u8,
            assetTokenQuantity: asset_quantity,
            paymentTokenQuantity: payment_quantity,
            price: self.price,
            tif: self.tif as u8,
            splitRecipient: Address::ZERO,
            splitAmount: U256::ZERO,
        }
    }
}

/// Reject amounts finer than the processor accepts: `amount` must be a
/// multiple of `10^(asset_decimals - max_decimals)`.
pub fn check_order_precision(
    amount: U256,
    asset_decimals: u8,
    max_decimals: i8,
) -> Result<(), OrderError> {
    let exponent = i32::from(asset_decimals) - i32::from(max_decimals);
    if exponent <= 0 {
        return Ok(());
    }

    let step = U256::from(10u64)
        .checked_pow(U256::from(exponent as u64))
        .ok_or_else(|| {
            OrderError::InvalidOrder(format!("precision step 10^{exponent} overflows"))
        })?;
    if amount % step != U256::ZERO {
        return Err(OrderError::InvalidOrder(format!(
            "order amount {amount} exceeds max decimals of {max_decimals}"
        )));
    }
    Ok(())
}
