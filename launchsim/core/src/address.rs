use anyhow::Result;

/// Re-encodes account addresses under a different human readable prefix.
pub trait AddressCodec {
    fn change_prefix(&self, address: &str, new_prefix: &str) -> Result<String>;
}

/// [`AddressCodec`] for bech32 encoded addresses. The payload is kept as is and only the human
/// readable part changes.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bech32AddressCodec;

impl AddressCodec for Bech32AddressCodec {
    fn change_prefix(&self, address: &str, new_prefix: &str) -> Result<String> {
        let (_, data, variant) = bech32::decode(address)
            .map_err(|err| anyhow::anyhow!("invalid bech32 address {}: {}", address, err))?;

        bech32::encode(new_prefix, data, variant)
            .map_err(|err| anyhow::anyhow!("invalid address prefix {}: {}", new_prefix, err))
    }
}

#[cfg(test)]
pub(crate) fn bech32_address(prefix: &str, seed: u8) -> String {
    use bech32::{ToBase32, Variant};

    bech32::encode(prefix, [seed; 20].to_base32(), Variant::Bech32).unwrap()
}
