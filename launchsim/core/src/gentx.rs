use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;

use crate::coin::Coin;

/// Human readable suffix of validator operator addresses (`cosmosvaloper1...`).
const VALOPER_SUFFIX: &str = "valoper";

/// Information extracted from a genesis transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GentxInfo {
    pub delegator_address: String,
    pub consensus_pub_key: Vec<u8>,
    pub self_delegation: Coin,
    pub memo: String,
}

pub trait GentxParser {
    fn parse(&self, gentx: &[u8]) -> Result<GentxInfo>;
}

/// [`GentxParser`] for the JSON encoding produced by Cosmos SDK `gentx` commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonGentxParser;

#[derive(Debug, Deserialize)]
struct Gentx {
    body: GentxBody,
}

#[derive(Debug, Deserialize)]
struct GentxBody {
    messages: Vec<CreateValidatorMessage>,
    #[serde(default)]
    memo: String,
}

#[derive(Debug, Deserialize)]
struct CreateValidatorMessage {
    #[serde(default)]
    delegator_address: String,
    #[serde(default)]
    validator_address: String,
    pubkey: MessagePubKey,
    value: MessageValue,
}

#[derive(Debug, Deserialize)]
struct MessagePubKey {
    key: String,
}

#[derive(Debug, Deserialize)]
struct MessageValue {
    denom: String,
    amount: String,
}

impl GentxParser for JsonGentxParser {
    fn parse(&self, gentx: &[u8]) -> Result<GentxInfo> {
        let gentx: Gentx = serde_json::from_slice(gentx)?;
        let body = gentx.body;
        let message = body
            .messages
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("the gentx cannot be empty"))?;

        // Newer SDK versions drop the delegator from `MsgCreateValidator`; it is then the account
        // behind the operator address.
        let delegator_address = if message.delegator_address.is_empty() {
            account_from_operator(&message.validator_address)?
        } else {
            message.delegator_address
        };

        let consensus_pub_key = STANDARD
            .decode(message.pubkey.key.as_bytes())
            .map_err(|err| anyhow::anyhow!("invalid consensus pub key: {}", err))?;

        let amount = message.value.amount.parse().map_err(|_| {
            anyhow::anyhow!("invalid self delegation amount {}", message.value.amount)
        })?;

        Ok(GentxInfo {
            delegator_address,
            consensus_pub_key,
            self_delegation: Coin::new(amount, message.value.denom),
            memo: body.memo,
        })
    }
}

fn account_from_operator(operator: &str) -> Result<String> {
    let (hrp, data, variant) = bech32::decode(operator)
        .map_err(|err| anyhow::anyhow!("invalid validator address {}: {}", operator, err))?;
    let account_hrp = hrp
        .strip_suffix(VALOPER_SUFFIX)
        .ok_or_else(|| anyhow::anyhow!("{} is not a validator operator address", operator))?;

    Ok(bech32::encode(account_hrp, data, variant)?)
}

#[cfg(test)]
pub(crate) fn gentx_json(delegator: &str, pub_key: &[u8], self_delegation: &Coin) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "body": {
            "messages": [{
                "@type": "/cosmos.staking.v1beta1.MsgCreateValidator",
                "delegator_address": delegator,
                "validator_address": "",
                "pubkey": {
                    "@type": "/cosmos.crypto.ed25519.PubKey",
                    "key": STANDARD.encode(pub_key),
                },
                "value": {
                    "denom": self_delegation.denom,
                    "amount": self_delegation.amount.to_string(),
                },
            }],
            "memo": "nodeid@1.2.3.4:26656",
        },
        "auth_info": {},
        "signatures": [],
    }))
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::bech32_address;

    #[test]
    fn test_parse_gentx() {
        let delegator = bech32_address("cosmos", 1);
        let gentx = gentx_json(&delegator, &[9; 32], &Coin::new(50, "stake"));

        let info = JsonGentxParser.parse(&gentx).unwrap();
        assert_eq!(info.delegator_address, delegator);
        assert_eq!(info.consensus_pub_key, vec![9; 32]);
        assert_eq!(info.self_delegation, Coin::new(50, "stake"));
        assert_eq!(info.memo, "nodeid@1.2.3.4:26656");
    }

    #[test]
    fn test_parse_gentx_without_delegator() {
        let operator = bech32_address("cosmosvaloper", 3);
        let gentx = serde_json::json!({
            "body": {
                "messages": [{
                    "validator_address": operator,
                    "pubkey": { "key": STANDARD.encode([1u8; 32]) },
                    "value": { "denom": "stake", "amount": "10" },
                }],
            },
        });

        let info = JsonGentxParser
            .parse(&serde_json::to_vec(&gentx).unwrap())
            .unwrap();
        assert_eq!(info.delegator_address, bech32_address("cosmos", 3));
        assert!(info.memo.is_empty());
    }

    #[test]
    fn test_parse_malformed_gentx() {
        assert!(JsonGentxParser.parse(b"not json").is_err());
        assert!(JsonGentxParser
            .parse(br#"{"body":{"messages":[]}}"#)
            .is_err());
    }
}
