//! Vote notification decoder.
//!
//! Turns the JSON payload of a subscription notification into a [`Vote`] or a
//! [`SlotUpdate`]. Decoding is pure: the receipt time is supplied by the
//! caller and nothing is logged or counted here.

use crate::core::{BlockHash, ParseIdError, Slot, Timestamp, TxSignature, ValidatorId};
use crate::vote::types::{ReportedLockout, Vote};
use serde::Deserialize;
use thiserror::Error;

/// Highest payload version this decoder understands.
pub const MAX_SUPPORTED_VERSION: u32 = 1;

/// Confirmation count assumed when a payload does not report one.
pub const DEFAULT_CONFIRMATION_COUNT: u32 = 1;

/// Reasons a notification payload could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid encoding in `{field}`: {source}")]
    InvalidEncoding {
        field: &'static str,
        source: ParseIdError,
    },

    #[error("inconsistent vote: {0}")]
    Inconsistent(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLockout {
    slot: Slot,
    confirmation_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVote {
    vote_pubkey: Option<String>,
    slots: Option<Vec<Slot>>,
    hash: Option<String>,
    signature: Option<String>,
    timestamp: Option<i64>,
    version: Option<u32>,
    confirmation_count: Option<u32>,
    slot_history: Option<Vec<Slot>>,
    lockouts: Option<Vec<RawLockout>>,
}

/// A slot notification: the data source created `slot` on top of `parent`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct SlotUpdate {
    pub slot: Slot,
    pub parent: Slot,
    pub root: Slot,
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField(field))
}

fn parse_id<T>(raw: &str, field: &'static str) -> Result<T, DecodeError>
where
    T: std::str::FromStr<Err = ParseIdError>,
{
    raw.parse()
        .map_err(|source| DecodeError::InvalidEncoding { field, source })
}

/// Decode one vote notification payload.
///
/// The highest entry of `slots` is the vote slot; the remaining slots are
/// ancestors on the same fork and join `slotHistory`. `slots` may arrive
/// unordered and repeated slots collapse to one.
pub fn decode_vote(payload: &str, observed_at: Timestamp) -> Result<Vote, DecodeError> {
    let raw: RawVote =
        serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let version = raw.version.unwrap_or(0);
    if version > MAX_SUPPORTED_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }

    let validator_id: ValidatorId = parse_id(&required(raw.vote_pubkey, "votePubkey")?, "votePubkey")?;
    let mut slots = required(raw.slots, "slots")?;
    let hash: BlockHash = parse_id(&required(raw.hash, "hash")?, "hash")?;
    let transaction_signature: TxSignature =
        parse_id(&required(raw.signature, "signature")?, "signature")?;

    slots.sort_unstable();
    slots.dedup();
    let slot = slots
        .pop()
        .ok_or_else(|| DecodeError::Inconsistent("vote carries no slots".to_string()))?;

    let history = raw.slot_history.unwrap_or_default();
    if let Some(bad) = history.iter().find(|s| **s >= slot) {
        return Err(DecodeError::Inconsistent(format!(
            "ancestor slot {} is not below vote slot {}",
            bad, slot
        )));
    }

    let reported_lockouts = raw
        .lockouts
        .unwrap_or_default()
        .into_iter()
        .map(|l| {
            if l.slot > slot {
                Err(DecodeError::Inconsistent(format!(
                    "reported lockout slot {} is above vote slot {}",
                    l.slot, slot
                )))
            } else {
                Ok(ReportedLockout {
                    slot: l.slot,
                    confirmation_count: l.confirmation_count,
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let confirmations_reported = raw.confirmation_count.is_some() || !reported_lockouts.is_empty();

    // A vote's own reported lockout is authoritative for its confirmation count
    let confirmation_count = raw
        .confirmation_count
        .or_else(|| {
            reported_lockouts
                .iter()
                .find(|l| l.slot == slot)
                .map(|l| l.confirmation_count)
        })
        .unwrap_or(DEFAULT_CONFIRMATION_COUNT);

    let mut vote = Vote {
        validator_id,
        slot,
        hash,
        confirmation_count,
        confirmations_reported,
        slot_history: Vec::with_capacity(history.len() + slots.len()),
        reported_lockouts,
        validator_timestamp: raw.timestamp,
        observed_at,
        transaction_signature,
    };
    vote.extend_history(history.into_iter().chain(slots));
    Ok(vote)
}

/// Decode one slot notification payload.
pub fn decode_slot_update(payload: &str) -> Result<SlotUpdate, DecodeError> {
    let update: SlotUpdate =
        serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if update.parent >= update.slot {
        return Err(DecodeError::Inconsistent(format!(
            "parent {} is not below slot {}",
            update.parent, update.slot
        )));
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::now;
    use serde_json::json;

    fn key(b: u8) -> String {
        ValidatorId::new([b; 32]).to_string()
    }

    fn sig(b: u8) -> String {
        TxSignature::new([b; 64]).to_string()
    }

    fn plain_payload() -> serde_json::Value {
        json!({
            "votePubkey": key(1),
            "slots": [98, 100, 99],
            "hash": key(2),
            "signature": sig(3),
            "timestamp": 1_700_000_000
        })
    }

    #[test]
    fn test_decode_plain_vote() {
        let vote = decode_vote(&plain_payload().to_string(), now()).unwrap();
        assert_eq!(vote.slot, 100);
        assert_eq!(vote.slot_history, vec![98, 99]);
        assert_eq!(vote.confirmation_count, DEFAULT_CONFIRMATION_COUNT);
        assert!(!vote.confirmations_reported);
        assert_eq!(vote.validator_timestamp, Some(1_700_000_000));
        assert_eq!(vote.validator_id, ValidatorId::new([1; 32]));
    }

    #[test]
    fn test_decode_extended_vote() {
        let payload = json!({
            "version": 1,
            "votePubkey": key(1),
            "slots": [100],
            "hash": key(2),
            "signature": sig(3),
            "slotHistory": [90, 95, 97],
            "lockouts": [
                {"slot": 95, "confirmationCount": 3},
                {"slot": 100, "confirmationCount": 1}
            ]
        });
        let vote = decode_vote(&payload.to_string(), now()).unwrap();
        assert_eq!(vote.slot_history, vec![90, 95, 97]);
        assert_eq!(vote.confirmation_count, 1);
        assert_eq!(vote.reported_lockouts.len(), 2);
        assert!(vote.confirmations_reported);
    }

    #[test]
    fn test_explicit_confirmation_count_wins() {
        let mut payload = plain_payload();
        payload["confirmationCount"] = json!(4);
        let vote = decode_vote(&payload.to_string(), now()).unwrap();
        assert_eq!(vote.confirmation_count, 4);
        assert!(vote.confirmations_reported);
    }

    #[test]
    fn test_repeated_slots_collapse() {
        let mut payload = plain_payload();
        payload["slots"] = json!([99, 100, 98, 100, 99]);
        let vote = decode_vote(&payload.to_string(), now()).unwrap();
        assert_eq!(vote.slot, 100);
        assert_eq!(vote.slot_history, vec![98, 99]);
    }

    #[test]
    fn test_unparsable_payload() {
        let err = decode_vote("{not json", now()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_missing_field() {
        let mut payload = plain_payload();
        payload.as_object_mut().unwrap().remove("signature");
        let err = decode_vote(&payload.to_string(), now()).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("signature"));
    }

    #[test]
    fn test_unsupported_version() {
        let mut payload = plain_payload();
        payload["version"] = json!(7);
        let err = decode_vote(&payload.to_string(), now()).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVersion(7));
    }

    #[test]
    fn test_bad_key_encoding() {
        let mut payload = plain_payload();
        payload["votePubkey"] = json!("short");
        let err = decode_vote(&payload.to_string(), now()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::InvalidEncoding { field: "votePubkey", .. }
        ));
    }

    #[test]
    fn test_empty_slots_inconsistent() {
        let mut payload = plain_payload();
        payload["slots"] = json!([]);
        let err = decode_vote(&payload.to_string(), now()).unwrap_err();
        assert!(matches!(err, DecodeError::Inconsistent(_)));
    }

    #[test]
    fn test_history_above_vote_inconsistent() {
        let mut payload = plain_payload();
        payload["slotHistory"] = json!([50, 100]);
        let err = decode_vote(&payload.to_string(), now()).unwrap_err();
        assert!(matches!(err, DecodeError::Inconsistent(_)));
    }

    #[test]
    fn test_decode_slot_update() {
        let update = decode_slot_update(r#"{"slot": 12, "parent": 10, "root": 4}"#).unwrap();
        assert_eq!(update, SlotUpdate { slot: 12, parent: 10, root: 4 });
        assert!(decode_slot_update(r#"{"slot": 12, "parent": 12, "root": 4}"#).is_err());
    }
}
