use std::time::Duration;

/// Failures found by statically checking a request before it is applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("cannot parse gentx: {0}")]
    MalformedGentx(String),
    #[error("cannot change the prefix of address {address}: {reason}")]
    AddressPrefix { address: String, reason: String },
    #[error("the validator address {declared} doesn't match the one inside the gentx {gentx}")]
    AddressMismatch { declared: String, gentx: String },
    #[error("the consensus pub key {declared} doesn't match the one inside the gentx {gentx}")]
    PubKeyMismatch { declared: String, gentx: String },
    #[error("the self delegation {declared} doesn't match the one inside the gentx {gentx}")]
    SelfDelegationMismatch { declared: String, gentx: String },
    #[error("the peer address {0} doesn't match the peer format <host>:<port>")]
    InvalidPeerFormat(String),
}

/// Failures raised when a request can't be folded into the current genesis information.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConflictError {
    #[error("account {0} already in genesis")]
    DuplicateAccount(String),
    #[error("account {0} can't be removed because it doesn't exist")]
    AccountNotFound(String),
    #[error("genesis validator {0} already in genesis")]
    DuplicateValidator(String),
    #[error("genesis validator {0} can't be removed because it doesn't exist")]
    ValidatorNotFound(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("request #{request_id} is invalid: {source}")]
    StaticValidation {
        request_id: u64,
        #[source]
        source: VerificationError,
    },
    #[error("request #{request_id} is invalid: {source}")]
    Conflict {
        request_id: u64,
        #[source]
        source: ConflictError,
    },
    #[error("request #{request_id} uses an unsupported vesting option: only delayed vesting is supported")]
    UnsupportedVestingOption { request_id: u64 },
    #[error("invalid param change {module}.{param}: {reason}")]
    InvalidParamChange {
        module: String,
        param: String,
        reason: String,
    },
    #[error("failed to build genesis: {0:#}")]
    Build(anyhow::Error),
    #[error("the chain failed to start: {0:#}")]
    Simulation(anyhow::Error),
    #[error("the chain did not become healthy within {0:?}")]
    Timeout(Duration),
    #[error("ledger query failed: {0:#}")]
    Ledger(anyhow::Error),
    #[error("verification cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the failure is caused by the content of a request rather than by the environment
    /// the request is verified in.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::StaticValidation { .. } | Self::Conflict { .. })
    }

    /// Id of the request the failure originates from, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::StaticValidation { request_id, .. }
            | Self::Conflict { request_id, .. }
            | Self::UnsupportedVestingOption { request_id } => Some(*request_id),
            _ => None,
        }
    }
}
