//! Transaction requests and address helpers.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::error::WalletError;

static ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static address regex"));
static HEX_DATA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x(?:[0-9a-fA-F]{2})*$").expect("static hex regex"));

const WEI_PER_ETH: Decimal = dec!(1_000_000_000_000_000_000);

/// A validated request to move ETH (and optionally call data) between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionRequest {
    pub to: String,
    pub from: String,
    /// Amount in ETH.
    pub value: Decimal,
    /// `0x`-prefixed call data, empty when there is none.
    pub data: String,
}

impl TransactionRequest {
    /// Validate raw user input into a request.
    pub fn new(to: &str, from: &str, value: &str, data: &str) -> Result<Self, WalletError> {
        let to = to.trim();
        let from = from.trim();
        let value = value.trim();
        let data = data.trim();

        if to.is_empty() || value.is_empty() {
            return Err(WalletError::InvalidRequest(
                "recipient and amount are required".to_string(),
            ));
        }
        if !is_valid_address(to) {
            return Err(WalletError::InvalidRequest(format!(
                "invalid recipient address '{to}'"
            )));
        }
        if !is_valid_address(from) {
            return Err(WalletError::InvalidRequest(format!(
                "invalid sender address '{from}'"
            )));
        }

        let value = Decimal::from_str(value).map_err(|e| {
            WalletError::InvalidRequest(format!("invalid amount '{value}': {e}"))
        })?;
        if value.is_sign_negative() {
            return Err(WalletError::InvalidRequest(
                "amount must not be negative".to_string(),
            ));
        }

        let data = if data.is_empty() {
            String::new()
        } else if HEX_DATA_RE.is_match(data) {
            data.to_ascii_lowercase()
        } else {
            return Err(WalletError::InvalidRequest(
                "data must be 0x-prefixed hex bytes".to_string(),
            ));
        };

        Ok(Self {
            to: to.to_string(),
            from: from.to_string(),
            value,
            data,
        })
    }

    /// Amount in wei, if it is a whole number of wei that fits in `u128`.
    pub fn value_wei(&self) -> Option<u128> {
        let wei = self.value.checked_mul(WEI_PER_ETH)?;
        if !wei.fract().is_zero() {
            return None;
        }
        u128::try_from(wei).ok()
    }
}

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

/// EIP-55 mixed-case checksum encoding of an address.
pub fn checksum_address(address: &str) -> Result<String, WalletError> {
    if !is_valid_address(address) {
        return Err(WalletError::InvalidRequest(format!(
            "invalid address '{address}'"
        )));
    }

    let lower = address[2..].to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, ch) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }
    Ok(out)
}
