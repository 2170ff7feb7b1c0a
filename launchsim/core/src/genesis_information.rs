use serde::{Deserialize, Serialize};

use crate::{
    coin::{Coin, Coins},
    errors::{ConflictError, Error},
    peer::Peer,
    request::{Request, RequestContent, VestingOptions},
    utils::base64_bytes,
};

/// Everything needed to construct the genesis of a chain.
///
/// Entries are kept in insertion order since they are later replayed into a genesis file, and the
/// same sequence of requests must always produce the same genesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisInformation {
    pub genesis_accounts: Vec<GenesisAccount>,
    pub vesting_accounts: Vec<VestingAccount>,
    pub genesis_validators: Vec<GenesisValidator>,
    pub param_changes: Vec<ParamChange>,
}

/// An account with an initial coin allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: String,
    pub coins: Coins,
}

/// An account with an initial allocation released at `end_time` (delayed vesting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingAccount {
    pub address: String,
    pub total_balance: Coins,
    pub vesting: Coins,
    /// Unix timestamp in seconds.
    pub end_time: i64,
}

/// A validator joining at genesis through its gentx.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub address: String,
    #[serde(with = "base64_bytes")]
    pub gentx: Vec<u8>,
    pub peer: Peer,
    pub self_delegation: Coin,
}

/// Overwrite of a single module parameter in the genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamChange {
    pub module: String,
    pub param: String,
    /// Raw JSON value.
    #[serde(with = "base64_bytes")]
    pub value: Vec<u8>,
}

impl GenesisInformation {
    pub fn new(
        genesis_accounts: Vec<GenesisAccount>,
        vesting_accounts: Vec<VestingAccount>,
        genesis_validators: Vec<GenesisValidator>,
        param_changes: Vec<ParamChange>,
    ) -> Self {
        Self {
            genesis_accounts,
            vesting_accounts,
            genesis_validators,
            param_changes,
        }
    }

    pub fn contains_genesis_account(&self, address: &str) -> Option<usize> {
        self.genesis_accounts
            .iter()
            .position(|account| account.address == address)
    }

    pub fn contains_vesting_account(&self, address: &str) -> Option<usize> {
        self.vesting_accounts
            .iter()
            .position(|account| account.address == address)
    }

    /// Whether the address is used by either a genesis or a vesting account.
    pub fn contains_account(&self, address: &str) -> bool {
        self.contains_genesis_account(address).is_some()
            || self.contains_vesting_account(address).is_some()
    }

    pub fn contains_genesis_validator(&self, address: &str) -> Option<usize> {
        self.genesis_validators
            .iter()
            .position(|validator| validator.address == address)
    }

    pub fn contains_param_change(&self, module: &str, param: &str) -> Option<usize> {
        self.param_changes
            .iter()
            .position(|change| change.module == module && change.param == param)
    }

    pub fn add_genesis_account(&mut self, account: GenesisAccount) {
        self.genesis_accounts.push(account);
    }

    pub fn add_vesting_account(&mut self, account: VestingAccount) {
        self.vesting_accounts.push(account);
    }

    pub fn add_genesis_validator(&mut self, validator: GenesisValidator) {
        self.genesis_validators.push(validator);
    }

    pub fn remove_genesis_account(&mut self, address: &str) {
        self.genesis_accounts
            .retain(|account| account.address != address);
    }

    pub fn remove_vesting_account(&mut self, address: &str) {
        self.vesting_accounts
            .retain(|account| account.address != address);
    }

    pub fn remove_genesis_validator(&mut self, address: &str) {
        self.genesis_validators
            .retain(|validator| validator.address != address);
    }

    /// Inserts the param change, replacing the previous value for the same module and param while
    /// keeping its position.
    pub fn upsert_param_change(&mut self, change: ParamChange) {
        match self.contains_param_change(&change.module, &change.param) {
            Some(ind) => self.param_changes[ind] = change,
            None => self.param_changes.push(change),
        }
    }

    /// Returns the genesis information resulting from the approval of `request`.
    ///
    /// `self` is never modified: on failure the caller still holds the previous state.
    pub fn apply_request(&self, request: &Request) -> Result<Self, Error> {
        let conflict = |source| Error::Conflict {
            request_id: request.request_id,
            source,
        };

        let mut gi = self.clone();
        match &request.content {
            RequestContent::GenesisAccount(account) => {
                if gi.contains_account(&account.address) {
                    return Err(conflict(ConflictError::DuplicateAccount(
                        account.address.clone(),
                    )));
                }
                gi.add_genesis_account(account.clone());
            }
            RequestContent::VestingAccount(request_account) => {
                // An unsupported vesting option doesn't make the request itself invalid.
                let account = match &request_account.options {
                    VestingOptions::Delayed(delayed) => VestingAccount {
                        address: request_account.address.clone(),
                        total_balance: delayed.total_balance.clone(),
                        vesting: delayed.vesting.clone(),
                        end_time: delayed.end_time,
                    },
                    VestingOptions::Continuous(_) => {
                        return Err(Error::UnsupportedVestingOption {
                            request_id: request.request_id,
                        })
                    }
                };

                if gi.contains_account(&account.address) {
                    return Err(conflict(ConflictError::DuplicateAccount(
                        account.address.clone(),
                    )));
                }
                gi.add_vesting_account(account);
            }
            RequestContent::AccountRemoval { address } => {
                if !gi.contains_account(address) {
                    return Err(conflict(ConflictError::AccountNotFound(address.clone())));
                }
                gi.remove_genesis_account(address);
                gi.remove_vesting_account(address);
            }
            RequestContent::GenesisValidator(validator) => {
                if gi.contains_genesis_validator(&validator.address).is_some() {
                    return Err(conflict(ConflictError::DuplicateValidator(
                        validator.address.clone(),
                    )));
                }
                gi.add_genesis_validator(validator.to_genesis_validator());
            }
            RequestContent::ValidatorRemoval { validator_address } => {
                if gi.contains_genesis_validator(validator_address).is_none() {
                    return Err(conflict(ConflictError::ValidatorNotFound(
                        validator_address.clone(),
                    )));
                }
                gi.remove_genesis_validator(validator_address);
            }
            RequestContent::ParamChange(change) => gi.upsert_param_change(change.clone()),
        }

        Ok(gi)
    }

    /// Folds `requests` in order, stopping at the first failure.
    pub fn apply_requests<'a, I>(&self, requests: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a Request>,
    {
        requests
            .into_iter()
            .try_fold(self.clone(), |gi, request| gi.apply_request(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{
        ContinuousVesting, DelayedVesting, GenesisValidatorRequest, VestingAccountRequest,
    };

    fn request(request_id: u64, content: RequestContent) -> Request {
        Request {
            launch_id: 1,
            request_id,
            content,
            status: Default::default(),
        }
    }

    fn add_account(request_id: u64, address: &str) -> Request {
        request(
            request_id,
            RequestContent::GenesisAccount(GenesisAccount {
                address: address.to_owned(),
                coins: "100stake".parse().unwrap(),
            }),
        )
    }

    fn add_vesting_account(request_id: u64, address: &str) -> Request {
        request(
            request_id,
            RequestContent::VestingAccount(VestingAccountRequest {
                address: address.to_owned(),
                options: VestingOptions::Delayed(DelayedVesting {
                    total_balance: "1000stake".parse().unwrap(),
                    vesting: "500stake".parse().unwrap(),
                    end_time: 1_700_000_000,
                }),
            }),
        )
    }

    fn add_validator(request_id: u64, address: &str) -> Request {
        request(
            request_id,
            RequestContent::GenesisValidator(GenesisValidatorRequest {
                address: address.to_owned(),
                gentx: b"{}".to_vec(),
                consensus_pub_key: vec![1; 32],
                self_delegation: Coin::new(50, "stake"),
                peer: Peer::tcp("nodeid", "1.2.3.4:26656"),
            }),
        )
    }

    fn param_change(request_id: u64, module: &str, param: &str, value: &str) -> Request {
        request(
            request_id,
            RequestContent::ParamChange(ParamChange {
                module: module.to_owned(),
                param: param.to_owned(),
                value: value.as_bytes().to_vec(),
            }),
        )
    }

    fn addresses(gi: &GenesisInformation) -> Vec<&str> {
        gi.genesis_accounts
            .iter()
            .map(|account| account.address.as_str())
            .collect()
    }

    #[test]
    fn test_apply_requests_preserves_order() {
        let forward = [
            add_account(0, "addr1"),
            add_account(1, "addr2"),
            add_account(2, "addr3"),
        ];
        let backward = [
            add_account(0, "addr3"),
            add_account(1, "addr2"),
            add_account(2, "addr1"),
        ];

        let gi_forward = GenesisInformation::default()
            .apply_requests(&forward)
            .unwrap();
        let gi_backward = GenesisInformation::default()
            .apply_requests(&backward)
            .unwrap();

        assert_eq!(addresses(&gi_forward), ["addr1", "addr2", "addr3"]);
        assert_eq!(addresses(&gi_backward), ["addr3", "addr2", "addr1"]);
        assert_ne!(
            serde_json::to_vec(&gi_forward).unwrap(),
            serde_json::to_vec(&gi_backward).unwrap()
        );

        // The same sequence always serializes identically.
        let again = GenesisInformation::default()
            .apply_requests(&forward)
            .unwrap();
        assert_eq!(
            serde_json::to_vec(&gi_forward).unwrap(),
            serde_json::to_vec(&again).unwrap()
        );
    }

    #[test]
    fn test_duplicate_account_leaves_state_unchanged() {
        let gi = GenesisInformation::default()
            .apply_requests(&[add_account(0, "addr1"), add_vesting_account(1, "addr2")])
            .unwrap();

        for duplicate in [
            add_account(7, "addr1"),
            add_account(7, "addr2"),
            add_vesting_account(7, "addr1"),
            add_vesting_account(7, "addr2"),
        ] {
            let before = gi.clone();
            let err = gi.apply_request(&duplicate).unwrap_err();

            assert!(err.is_invalid_request());
            assert_eq!(err.request_id(), Some(7));
            assert!(matches!(
                err,
                Error::Conflict {
                    source: ConflictError::DuplicateAccount(_),
                    ..
                }
            ));
            assert_eq!(gi, before);
        }
    }

    #[test]
    fn test_unsupported_vesting_option() {
        let continuous = request(
            3,
            RequestContent::VestingAccount(VestingAccountRequest {
                address: "addr1".to_owned(),
                options: VestingOptions::Continuous(ContinuousVesting {
                    total_balance: "1000stake".parse().unwrap(),
                    vesting: "500stake".parse().unwrap(),
                    start_time: 1_600_000_000,
                    end_time: 1_700_000_000,
                }),
            }),
        );

        let err = GenesisInformation::default()
            .apply_request(&continuous)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedVestingOption { request_id: 3 }
        ));
        assert!(!err.is_invalid_request());
    }

    #[test]
    fn test_account_removal() {
        let gi = GenesisInformation::default()
            .apply_requests(&[add_account(0, "addr1"), add_vesting_account(1, "addr2")])
            .unwrap();

        let removed = gi
            .apply_request(&request(
                2,
                RequestContent::AccountRemoval {
                    address: "addr2".to_owned(),
                },
            ))
            .unwrap();
        assert!(removed.vesting_accounts.is_empty());
        assert_eq!(addresses(&removed), ["addr1"]);

        let removed = removed
            .apply_request(&request(
                3,
                RequestContent::AccountRemoval {
                    address: "addr1".to_owned(),
                },
            ))
            .unwrap();
        assert!(removed.genesis_accounts.is_empty());

        let err = removed
            .apply_request(&request(
                4,
                RequestContent::AccountRemoval {
                    address: "addr1".to_owned(),
                },
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Conflict {
                request_id: 4,
                source: ConflictError::AccountNotFound(_),
            }
        ));
    }

    #[test]
    fn test_validator_add_and_removal() {
        let gi = GenesisInformation::default()
            .apply_request(&add_validator(0, "addr1"))
            .unwrap();
        assert_eq!(gi.genesis_validators.len(), 1);
        assert_eq!(gi.genesis_validators[0].self_delegation, Coin::new(50, "stake"));

        let err = gi.apply_request(&add_validator(1, "addr1")).unwrap_err();
        assert!(matches!(
            err,
            Error::Conflict {
                request_id: 1,
                source: ConflictError::DuplicateValidator(_),
            }
        ));

        let removal = request(
            2,
            RequestContent::ValidatorRemoval {
                validator_address: "addr1".to_owned(),
            },
        );
        let removed = gi.apply_request(&removal).unwrap();
        assert!(removed.contains_genesis_validator("addr1").is_none());
        assert!(removed.genesis_validators.is_empty());

        let err = removed.apply_request(&removal).unwrap_err();
        assert!(matches!(
            err,
            Error::Conflict {
                request_id: 2,
                source: ConflictError::ValidatorNotFound(_),
            }
        ));
    }

    #[test]
    fn test_param_change_upsert() {
        let gi = GenesisInformation::default()
            .apply_requests(&[
                param_change(0, "staking", "max_validators", "10"),
                param_change(1, "bank", "send_enabled", "true"),
                param_change(2, "staking", "max_validators", "20"),
            ])
            .unwrap();

        assert_eq!(gi.param_changes.len(), 2);
        let ind = gi
            .contains_param_change("staking", "max_validators")
            .unwrap();
        assert_eq!(ind, 0);
        assert_eq!(gi.param_changes[ind].value, b"20");
    }

    #[test]
    fn test_apply_requests_stops_at_first_failure() {
        let err = GenesisInformation::default()
            .apply_requests(&[
                add_account(0, "addr1"),
                add_account(1, "addr1"),
                add_account(2, "addr1"),
            ])
            .unwrap_err();

        assert_eq!(err.request_id(), Some(1));
    }
}
