//! Request and outbox identifiers: a uuid7 encoded as bech32m under a
//! `request_` or `notice_` prefix.

use bech32::Bech32m;
use uuid7::uuid7;

// ids sort by creation time since uuid7 leads with a timestamp
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}
