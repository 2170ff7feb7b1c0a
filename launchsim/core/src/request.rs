use serde::{Deserialize, Serialize};

use crate::{
    address::AddressCodec,
    coin::{Coin, Coins},
    errors::{Error, VerificationError},
    genesis_information::{GenesisAccount, GenesisValidator, ParamChange},
    gentx::GentxParser,
    peer::Peer,
    utils::base64_bytes,
};

/// A request to change the genesis of a launch, as stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub launch_id: u64,
    pub request_id: u64,
    pub content: RequestContent,
    #[serde(default)]
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestContent {
    GenesisAccount(GenesisAccount),
    VestingAccount(VestingAccountRequest),
    AccountRemoval { address: String },
    GenesisValidator(GenesisValidatorRequest),
    ValidatorRemoval { validator_address: String },
    ParamChange(ParamChange),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingAccountRequest {
    pub address: String,
    pub options: VestingOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VestingOptions {
    Delayed(DelayedVesting),
    Continuous(ContinuousVesting),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayedVesting {
    pub total_balance: Coins,
    pub vesting: Coins,
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuousVesting {
    pub total_balance: Coins,
    pub vesting: Coins,
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidatorRequest {
    pub address: String,
    #[serde(with = "base64_bytes")]
    pub gentx: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub consensus_pub_key: Vec<u8>,
    pub self_delegation: Coin,
    pub peer: Peer,
}

impl GenesisValidatorRequest {
    pub fn to_genesis_validator(&self) -> GenesisValidator {
        GenesisValidator {
            address: self.address.clone(),
            gentx: self.gentx.clone(),
            peer: self.peer.clone(),
            self_delegation: self.self_delegation.clone(),
        }
    }
}

impl Request {
    /// Wraps contents that have not been submitted to the ledger yet, numbering them from `0` in
    /// the given order.
    pub fn from_contents<I>(launch_id: u64, contents: I) -> Vec<Self>
    where
        I: IntoIterator<Item = RequestContent>,
    {
        contents
            .into_iter()
            .zip(0..)
            .map(|(content, request_id)| Self {
                launch_id,
                request_id,
                content,
                status: RequestStatus::Pending,
            })
            .collect()
    }
}

impl RequestContent {
    pub fn action_description(&self) -> &'static str {
        match self {
            Self::GenesisAccount(_) => "add account to the network",
            Self::VestingAccount(_) => "add vesting account to the network",
            Self::AccountRemoval { .. } => "remove account from the network",
            Self::GenesisValidator(_) => "join the network as a validator",
            Self::ValidatorRemoval { .. } => "remove validator from the network",
            Self::ParamChange(_) => "change param on the network",
        }
    }

    pub fn action_result_description(&self) -> &'static str {
        match self {
            Self::GenesisAccount(_) => "account added to the network",
            Self::VestingAccount(_) => "vesting account added to the network",
            Self::AccountRemoval { .. } => "account removed from network",
            Self::GenesisValidator(_) => "validator added to the network",
            Self::ValidatorRemoval { .. } => "validator removed from network",
            Self::ParamChange(_) => "param changed on network",
        }
    }
}

/// Static checks of requests against the data they embed.
#[derive(Debug, Clone)]
pub struct RequestValidator<P, C> {
    parser: P,
    codec: C,
    /// Address prefix used by the ledger for every stored address.
    ledger_prefix: String,
}

impl<P, C> RequestValidator<P, C>
where
    P: GentxParser,
    C: AddressCodec,
{
    pub fn new<S>(parser: P, codec: C, ledger_prefix: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            parser,
            codec,
            ledger_prefix: ledger_prefix.into(),
        }
    }

    /// Only validator requests carry data that can be checked without the genesis; other kinds
    /// are accepted as is.
    pub fn verify_request(&self, request: &Request) -> Result<(), Error> {
        match &request.content {
            RequestContent::GenesisValidator(validator) => self
                .verify_add_validator_request(validator)
                .map_err(|source| Error::StaticValidation {
                    request_id: request.request_id,
                    source,
                }),
            RequestContent::GenesisAccount(_)
            | RequestContent::VestingAccount(_)
            | RequestContent::AccountRemoval { .. }
            | RequestContent::ValidatorRemoval { .. }
            | RequestContent::ParamChange(_) => Ok(()),
        }
    }

    /// Cross-checks a validator request against its embedded gentx.
    pub fn verify_add_validator_request(
        &self,
        request: &GenesisValidatorRequest,
    ) -> Result<(), VerificationError> {
        let info = self
            .parser
            .parse(&request.gentx)
            .map_err(|err| VerificationError::MalformedGentx(format!("{err:#}")))?;

        // Addresses stored on the ledger all use the ledger prefix.
        let gentx_address = self
            .codec
            .change_prefix(&info.delegator_address, &self.ledger_prefix)
            .map_err(|err| VerificationError::AddressPrefix {
                address: info.delegator_address.clone(),
                reason: format!("{err:#}"),
            })?;

        if request.address != gentx_address {
            return Err(VerificationError::AddressMismatch {
                declared: request.address.clone(),
                gentx: gentx_address,
            });
        }

        if request.consensus_pub_key != info.consensus_pub_key {
            return Err(VerificationError::PubKeyMismatch {
                declared: hex::encode(&request.consensus_pub_key),
                gentx: hex::encode(&info.consensus_pub_key),
            });
        }

        if request.self_delegation.denom != info.self_delegation.denom
            || request.self_delegation.amount != info.self_delegation.amount
        {
            return Err(VerificationError::SelfDelegationMismatch {
                declared: request.self_delegation.to_string(),
                gentx: info.self_delegation.to_string(),
            });
        }

        if !request.peer.is_valid_format() {
            return Err(VerificationError::InvalidPeerFormat(request.peer.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        address::{bech32_address, Bech32AddressCodec},
        gentx::{gentx_json, JsonGentxParser},
    };

    const PUB_KEY: [u8; 32] = [4; 32];

    fn validator() -> RequestValidator<JsonGentxParser, Bech32AddressCodec> {
        RequestValidator::new(JsonGentxParser, Bech32AddressCodec, "spn")
    }

    fn validator_request() -> GenesisValidatorRequest {
        GenesisValidatorRequest {
            address: bech32_address("spn", 1),
            gentx: gentx_json(&bech32_address("cosmos", 1), &PUB_KEY, &Coin::new(50, "stake")),
            consensus_pub_key: PUB_KEY.to_vec(),
            self_delegation: Coin::new(50, "stake"),
            peer: Peer::tcp("nodeid", "1.2.3.4:26656"),
        }
    }

    #[test]
    fn test_verify_valid_validator_request() {
        validator()
            .verify_add_validator_request(&validator_request())
            .unwrap();
    }

    #[test]
    fn test_verify_malformed_gentx() {
        let mut request = validator_request();
        request.gentx = b"garbage".to_vec();

        assert!(matches!(
            validator().verify_add_validator_request(&request),
            Err(VerificationError::MalformedGentx(_))
        ));
    }

    #[test]
    fn test_verify_address_mismatch() {
        let mut request = validator_request();
        request.address = bech32_address("spn", 2);

        let err = validator()
            .verify_add_validator_request(&request)
            .unwrap_err();
        let message = err.to_string();

        assert!(matches!(err, VerificationError::AddressMismatch { .. }));
        assert!(message.contains(&bech32_address("spn", 2)));
        assert!(message.contains(&bech32_address("spn", 1)));
    }

    #[test]
    fn test_verify_pub_key_mismatch() {
        let mut request = validator_request();
        request.consensus_pub_key = vec![5; 32];

        assert_eq!(
            validator()
                .verify_add_validator_request(&request)
                .unwrap_err(),
            VerificationError::PubKeyMismatch {
                declared: hex::encode([5u8; 32]),
                gentx: hex::encode(PUB_KEY),
            }
        );
    }

    #[test]
    fn test_verify_self_delegation_mismatch() {
        for self_delegation in [Coin::new(51, "stake"), Coin::new(50, "token")] {
            let mut request = validator_request();
            request.self_delegation = self_delegation.clone();

            assert_eq!(
                validator()
                    .verify_add_validator_request(&request)
                    .unwrap_err(),
                VerificationError::SelfDelegationMismatch {
                    declared: self_delegation.to_string(),
                    gentx: "50stake".to_owned(),
                }
            );
        }
    }

    #[test]
    fn test_verify_invalid_peer() {
        let mut request = validator_request();
        request.peer = Peer::tcp("nodeid", "1.2.3.4");

        assert!(matches!(
            validator().verify_add_validator_request(&request),
            Err(VerificationError::InvalidPeerFormat(_))
        ));
    }

    #[test]
    fn test_verify_request_tags_request_id() {
        let mut content = validator_request();
        content.self_delegation = Coin::new(1, "stake");
        let request = Request {
            launch_id: 1,
            request_id: 42,
            content: RequestContent::GenesisValidator(content),
            status: RequestStatus::Pending,
        };

        let err = validator().verify_request(&request).unwrap_err();
        assert_eq!(err.request_id(), Some(42));
        assert!(err.is_invalid_request());

        // Other kinds are not statically checked.
        let removal = Request {
            content: RequestContent::AccountRemoval {
                address: "whatever".to_owned(),
            },
            ..request
        };
        validator().verify_request(&removal).unwrap();
    }

    #[test]
    fn test_from_contents() {
        let requests = Request::from_contents(
            9,
            [
                RequestContent::AccountRemoval {
                    address: "a".to_owned(),
                },
                RequestContent::ValidatorRemoval {
                    validator_address: "b".to_owned(),
                },
            ],
        );

        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].request_id, 0);
        assert_eq!(requests[1].request_id, 1);
        assert!(requests.iter().all(|request| request.launch_id == 9));
        assert_eq!(
            requests[1].content.action_description(),
            "remove validator from the network"
        );
    }

    #[test]
    fn test_action_result_description() {
        let removal = RequestContent::AccountRemoval {
            address: "a".to_owned(),
        };
        let param = RequestContent::ParamChange(ParamChange {
            module: "staking".to_owned(),
            param: "max_validators".to_owned(),
            value: b"10".to_vec(),
        });

        assert_eq!(
            removal.action_result_description(),
            "account removed from network"
        );
        assert_eq!(
            param.action_result_description(),
            "param changed on network"
        );
    }

    #[test]
    fn test_request_content_serde() {
        let content: RequestContent = serde_json::from_value(serde_json::json!({
            "type": "genesis_account",
            "address": "spn1xyz",
            "coins": "100stake",
        }))
        .unwrap();

        assert_eq!(
            content,
            RequestContent::GenesisAccount(GenesisAccount {
                address: "spn1xyz".to_owned(),
                coins: "100stake".parse().unwrap(),
            })
        );
    }
}
