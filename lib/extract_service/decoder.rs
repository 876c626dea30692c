//! Closed decode table for the two recognized ledger event kinds.
//!
//! Attributes are positional. For `merge_claims_records`: `[0]` recipient, `[1]` claimed
//! coins, `[2]` fund community pool. For `claim`: `[0]` sender, `[1]` amount, `[2]` action.
//! Names carried by the attribute keys are never consulted.

use thiserror::Error;
use tracing::warn;

use crate::db::models::{ClaimEvent, MergedEvent};
use crate::ledger_client::{AttributeDecodeError, AttributeEncoding, Event, TxResult};

use super::types::BatchEvents;

pub const MERGE_CLAIMS_RECORDS_TAG: &str = "merge_claims_records";
pub const CLAIM_TAG: &str = "claim";

/// Attributes every recognized event must carry.
pub const EXPECTED_ATTRIBUTES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    MergeClaimsRecords,
    Claim,
}

impl EventKind {
    /// `None` for every tag outside the decode table.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            MERGE_CLAIMS_RECORDS_TAG => Some(Self::MergeClaimsRecords),
            CLAIM_TAG => Some(Self::Claim),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::MergeClaimsRecords => MERGE_CLAIMS_RECORDS_TAG,
            Self::Claim => CLAIM_TAG,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    Merged(MergedEvent),
    Claim(ClaimEvent),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error(transparent)]
    Attribute(#[from] AttributeDecodeError),
    #[error("{tag} event carries {actual} attributes, expected {expected}")]
    AttributeCount {
        tag: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Decodes one event at `height`.
///
/// `Ok(None)` means the tag is not recognized and the event is ignored.
pub fn decode_event(
    event: &Event,
    height: i64,
    encoding: AttributeEncoding,
) -> Result<Option<DecodedEvent>, DecodeError> {
    let Some(kind) = EventKind::from_tag(&event.type_) else {
        return Ok(None);
    };

    if event.attributes.len() != EXPECTED_ATTRIBUTES {
        return Err(DecodeError::AttributeCount {
            tag: kind.tag(),
            expected: EXPECTED_ATTRIBUTES,
            actual: event.attributes.len(),
        });
    }

    let [first, second, third] = positional_values(event, kind, encoding)?;
    let decoded = match kind {
        EventKind::MergeClaimsRecords => DecodedEvent::Merged(MergedEvent {
            height,
            recipient: first,
            claimed_coins: second,
            fund_community_pool: third,
        }),
        EventKind::Claim => DecodedEvent::Claim(ClaimEvent {
            height,
            sender: first,
            amount: second,
            action: third,
        }),
    };
    Ok(Some(decoded))
}

fn positional_values(
    event: &Event,
    kind: EventKind,
    encoding: AttributeEncoding,
) -> Result<[String; EXPECTED_ATTRIBUTES], DecodeError> {
    let decoded = event.decode_attributes(encoding)?;
    let actual = decoded.len();
    let values: Vec<String> = decoded.into_iter().map(|attribute| attribute.value).collect();
    values.try_into().map_err(|_| DecodeError::AttributeCount {
        tag: kind.tag(),
        expected: EXPECTED_ATTRIBUTES,
        actual,
    })
}

/// Classifies every event of every transaction in a block.
///
/// Malformed recognized events are logged and skipped; they never fail the height.
pub fn decode_block(
    txs_results: &[TxResult],
    height: i64,
    encoding: AttributeEncoding,
) -> BatchEvents {
    let mut events = BatchEvents::default();
    for (tx_index, tx) in txs_results.iter().enumerate() {
        for event in &tx.events {
            match decode_event(event, height, encoding) {
                Ok(Some(DecodedEvent::Merged(record))) => events.merged.push(record),
                Ok(Some(DecodedEvent::Claim(record))) => events.claims.push(record),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        event = "event_decode_failed",
                        height,
                        tx_index,
                        tag = %event.type_,
                        error = %err,
                        "skipping malformed event"
                    );
                }
            }
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::{decode_block, decode_event, DecodeError, DecodedEvent, EventKind};
    use crate::db::models::{ClaimEvent, MergedEvent};
    use crate::ledger_client::{AttributeEncoding, Event, EventAttribute, TxResult};
    use base64::Engine;

    fn encoded(raw: &str) -> Option<String> {
        Some(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    fn event(tag: &str, values: &[(&str, &str)]) -> Event {
        Event {
            type_: tag.to_string(),
            attributes: values
                .iter()
                .map(|(key, value)| EventAttribute {
                    key: encoded(key),
                    value: encoded(value),
                    index: true,
                })
                .collect(),
        }
    }

    fn tx(events: Vec<Event>) -> TxResult {
        TxResult {
            events,
            ..TxResult::default()
        }
    }

    #[test]
    fn merge_claims_records_maps_positions() {
        let decoded = decode_event(
            &event(
                "merge_claims_records",
                &[("recipient", "addr1"), ("claimed_coins", "100"), ("fund", "50")],
            ),
            42,
            AttributeEncoding::Base64,
        )
        .expect("valid event");

        assert_eq!(
            decoded,
            Some(DecodedEvent::Merged(MergedEvent {
                height: 42,
                recipient: "addr1".to_string(),
                claimed_coins: "100".to_string(),
                fund_community_pool: "50".to_string(),
            }))
        );
    }

    #[test]
    fn claim_maps_positions_regardless_of_key_names() {
        let decoded = decode_event(
            &event("claim", &[("amount", "addrX"), ("sender", "30"), ("x", "action1")]),
            7,
            AttributeEncoding::Base64,
        )
        .expect("valid event");

        assert_eq!(
            decoded,
            Some(DecodedEvent::Claim(ClaimEvent {
                height: 7,
                sender: "addrX".to_string(),
                amount: "30".to_string(),
                action: "action1".to_string(),
            }))
        );
    }

    #[test]
    fn unknown_tags_are_ignored() {
        assert_eq!(EventKind::from_tag("transfer"), None);
        let decoded = decode_event(
            &event("transfer", &[("a", "1"), ("b", "2"), ("c", "3")]),
            1,
            AttributeEncoding::Base64,
        )
        .expect("unknown tags never fail");
        assert_eq!(decoded, None);
    }

    #[test]
    fn wrong_attribute_count_is_a_decode_error() {
        let err = decode_event(
            &event("claim", &[("sender", "addrX"), ("amount", "30")]),
            7,
            AttributeEncoding::Base64,
        )
        .expect_err("two attributes should fail");
        assert_eq!(
            err,
            DecodeError::AttributeCount {
                tag: "claim",
                expected: 3,
                actual: 2,
            }
        );

        assert!(decode_event(
            &event("claim", &[("a", "1"), ("b", "2"), ("c", "3"), ("d", "4")]),
            7,
            AttributeEncoding::Base64,
        )
        .is_err());
    }

    #[test]
    fn plain_encoding_passes_values_through() {
        let plain = Event {
            type_: "claim".to_string(),
            attributes: ["addrX", "30", "action1"]
                .iter()
                .map(|value| EventAttribute {
                    key: Some("k".to_string()),
                    value: Some(value.to_string()),
                    index: false,
                })
                .collect(),
        };

        let decoded = decode_event(&plain, 7, AttributeEncoding::Plain).expect("plain event");
        assert!(matches!(decoded, Some(DecodedEvent::Claim(ref c)) if c.sender == "addrX"));
    }

    #[test]
    fn malformed_event_is_skipped_without_affecting_neighbours() {
        let txs = vec![
            tx(vec![
                event("claim", &[("sender", "addrX"), ("amount", "30")]),
                event("claim", &[("s", "addrY"), ("a", "5"), ("x", "ACTION_VOTE")]),
                event("transfer", &[("r", "z")]),
            ]),
            tx(vec![event(
                "merge_claims_records",
                &[("r", "osmo1a"), ("c", "100aevmos"), ("f", "false")],
            )]),
        ];

        let events = decode_block(&txs, 12, AttributeEncoding::Base64);

        assert_eq!(events.claims.len(), 1);
        assert_eq!(events.claims[0].sender, "addrY");
        assert_eq!(events.merged.len(), 1);
        assert_eq!(events.merged[0].height, 12);
    }

    #[test]
    fn invalid_base64_skips_only_that_event() {
        let mut broken = event("claim", &[("s", "addrX"), ("a", "30"), ("x", "act")]);
        broken.attributes[1].value = Some("%%%".to_string());
        let txs = vec![tx(vec![
            broken,
            event("claim", &[("s", "addrZ"), ("a", "1"), ("x", "act")]),
        ])];

        let events = decode_block(&txs, 3, AttributeEncoding::Base64);
        assert_eq!(events.claims.len(), 1);
        assert_eq!(events.claims[0].sender, "addrZ");
    }
}
