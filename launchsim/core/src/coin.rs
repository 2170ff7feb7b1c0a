use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A single coin amount in the chain's `<amount><denom>` notation, e.g. `100stake`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coin {
    pub amount: u128,
    pub denom: String,
}

/// An ordered list of coins rendered as a comma separated list, e.g. `100stake,5token`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coins(pub Vec<Coin>);

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinParseError {
    #[error("coin `{0}` has no amount")]
    MissingAmount(String),
    #[error("coin `{0}` has no denom")]
    MissingDenom(String),
    #[error("coin `{0}` has an invalid amount")]
    InvalidAmount(String),
    #[error("coin `{0}` has an invalid denom")]
    InvalidDenom(String),
}

impl Coin {
    pub fn new<D>(amount: u128, denom: D) -> Self
    where
        D: Into<String>,
    {
        Self {
            amount,
            denom: denom.into(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = CoinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| CoinParseError::MissingDenom(s.to_owned()))?;
        let (amount, denom) = s.split_at(split);

        if amount.is_empty() {
            return Err(CoinParseError::MissingAmount(s.to_owned()));
        }
        if !denom
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-'))
        {
            return Err(CoinParseError::InvalidDenom(s.to_owned()));
        }

        Ok(Self {
            amount: amount
                .parse()
                .map_err(|_| CoinParseError::InvalidAmount(s.to_owned()))?,
            denom: denom.to_owned(),
        })
    }
}

impl TryFrom<String> for Coin {
    type Error = CoinParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coin> for String {
    fn from(value: Coin) -> Self {
        value.to_string()
    }
}

impl Coins {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ind, coin) in self.0.iter().enumerate() {
            if ind > 0 {
                f.write_str(",")?;
            }
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

impl FromStr for Coins {
    type Err = CoinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        s.split(',').map(str::parse).collect::<Result<_, _>>().map(Self)
    }
}

impl TryFrom<String> for Coins {
    type Error = CoinParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Coins> for String {
    fn from(value: Coins) -> Self {
        value.to_string()
    }
}

impl From<Vec<Coin>> for Coins {
    fn from(value: Vec<Coin>) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coin() {
        assert_eq!("100stake".parse::<Coin>().unwrap(), Coin::new(100, "stake"));
        assert_eq!(
            "7ibc/27394FB0".parse::<Coin>().unwrap(),
            Coin::new(7, "ibc/27394FB0")
        );
        assert!(matches!(
            "stake".parse::<Coin>(),
            Err(CoinParseError::MissingAmount(_))
        ));
        assert!(matches!(
            "100".parse::<Coin>(),
            Err(CoinParseError::MissingDenom(_))
        ));
        assert!(matches!(
            "100st ake".parse::<Coin>(),
            Err(CoinParseError::InvalidDenom(_))
        ));
    }

    #[test]
    fn test_coins_display() {
        let coins: Coins = "100stake,5token".parse().unwrap();
        assert_eq!(coins.0.len(), 2);
        assert_eq!(coins.to_string(), "100stake,5token");
        assert!("".parse::<Coins>().unwrap().is_empty());
    }

    #[test]
    fn test_coin_serde_as_string() {
        let coin = Coin::new(50, "stake");
        let json = serde_json::to_string(&coin).unwrap();
        assert_eq!(json, "\"50stake\"");
        assert_eq!(serde_json::from_str::<Coin>(&json).unwrap(), coin);
    }
}
