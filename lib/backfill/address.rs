use bech32::Variant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,
    #[error("invalid bech32 address {address}: {source}")]
    Bech32 {
        address: String,
        #[source]
        source: bech32::Error,
    },
    #[error("address {address} has prefix {actual}, expected {expected}")]
    PrefixMismatch {
        address: String,
        expected: String,
        actual: String,
    },
    #[error("address {address} uses bech32m, expected bech32")]
    UnexpectedVariant { address: String },
}

/// Re-encodes a bech32 address from `from_prefix` to `to_prefix`, keeping the payload bytes.
///
/// The input must carry exactly `from_prefix`.
pub fn convert_address(
    address: &str,
    from_prefix: &str,
    to_prefix: &str,
) -> Result<String, AddressError> {
    if address.trim().is_empty() {
        return Err(AddressError::Empty);
    }

    let (hrp, data, variant) =
        bech32::decode(address).map_err(|source| AddressError::Bech32 {
            address: address.to_string(),
            source,
        })?;

    if hrp != from_prefix {
        return Err(AddressError::PrefixMismatch {
            address: address.to_string(),
            expected: from_prefix.to_string(),
            actual: hrp,
        });
    }
    if variant != Variant::Bech32 {
        return Err(AddressError::UnexpectedVariant {
            address: address.to_string(),
        });
    }

    bech32::encode(to_prefix, data, Variant::Bech32).map_err(|source| AddressError::Bech32 {
        address: address.to_string(),
        source,
    })
}
