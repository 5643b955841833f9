// Encode and decode repair events in the registry wire format.
//
// Purpose
// - Own the parsed schema and the schema id obtained at registration, so
//   encoding never touches the network after startup.

use apache_avro::{from_avro_datum, from_value, to_avro_datum, to_value, Schema};
use thiserror::Error;

use crate::envelope::{self, EnvelopeError};
use crate::record::{RepairEventRecord, RAW_SCHEMA};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("avro: {0}")]
    Avro(#[from] apache_avro::Error),
}

pub struct EventCodec {
    schema: Schema,
    schema_id: u32,
}

impl EventCodec {
    /// Builds a codec from the embedded schema artefact and a schema id
    /// obtained from the registry. Parsing the artefact cannot fail at
    /// runtime unless the crate itself ships a broken schema, so a parse
    /// error here is a startup-fatal condition for the caller.
    pub fn new(schema_id: u32) -> Result<Self, CodecError> {
        let schema = Schema::parse_str(RAW_SCHEMA)?;
        Ok(Self { schema, schema_id })
    }

    pub fn schema_id(&self) -> u32 {
        self.schema_id
    }

    pub fn encode(&self, record: &RepairEventRecord) -> Result<Vec<u8>, CodecError> {
        let value = to_value(record)?;
        let datum = to_avro_datum(&self.schema, value)?;
        Ok(envelope::wrap(self.schema_id, datum.as_slice()))
    }

    pub fn decode(&self, payload: &[u8]) -> Result<RepairEventRecord, CodecError> {
        let (_schema_id, datum) = envelope::unwrap(payload)?;
        let mut reader = datum;
        let value = from_avro_datum(&self.schema, &mut reader, None)?;
        Ok(from_value::<RepairEventRecord>(&value)?)
    }
}

#[cfg(test)]
mod codec_tests {
    use super::*;
    use crate::record::{LocationRecord, MechanicRecord};
    use rstest::{fixture, rstest};

    #[fixture]
    fn event() -> RepairEventRecord {
        RepairEventRecord {
            id: "65f0aa11bb22cc33dd44ee55".into(),
            user_id: "u1".into(),
            status: "pending".into(),
            repair_type: "flat_tire".into(),
            total_price: 50.0,
            user_location: Some(LocationRecord {
                longitude: 13.4,
                latitude: 52.52,
            }),
            mechanics: vec![MechanicRecord {
                id: "m1".into(),
                name: "Berlin Auto Repair".into(),
                location: LocationRecord {
                    longitude: 13.41,
                    latitude: 52.51,
                },
                distance: 1234.5,
            }],
        }
    }

    #[rstest]
    fn it_should_round_trip_an_event(event: RepairEventRecord) {
        let codec = EventCodec::new(7).unwrap();
        let payload = codec.encode(&event).unwrap();
        assert_eq!(payload[0], 0x00);
        assert_eq!(&payload[1..5], &7u32.to_be_bytes());
        let decoded = codec.decode(&payload).unwrap();
        assert_eq!(decoded, event);
    }

    #[rstest]
    fn it_should_round_trip_without_a_user_location(mut event: RepairEventRecord) {
        event.user_location = None;
        event.mechanics.clear();
        let codec = EventCodec::new(1).unwrap();
        let decoded = codec.decode(&codec.encode(&event).unwrap()).unwrap();
        assert_eq!(decoded, event);
    }

    #[rstest]
    fn it_should_reject_a_truncated_payload() {
        let codec = EventCodec::new(1).unwrap();
        let err = codec.decode(&[0x00, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Envelope(EnvelopeError::TooShort(3))
        ));
    }
}
