//! Identifier and revision helpers

use bech32::Bech32m;
use uuid7::uuid7;

/// Mint a record identifier: a fresh uuid7 encoded as bech32m under `hrp`.
pub fn new_record_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encoded = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encoded)
}

/// CBOR-encode a record and return it with its sha256 digest.
pub fn encode_with_revision<T: minicbor::Encode<()>>(record: &T) -> anyhow::Result<(String, Vec<u8>)> {
    let cbor = minicbor::to_vec(record)?;
    let revision = sha256::digest(&cbor);

    Ok((revision, cbor))
}
