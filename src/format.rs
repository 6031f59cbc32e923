use crate::error::PregelError;
use crate::message::MessageBatch;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Converts message batches to and from the bytes handed to the network.
pub trait MessageFormat<M>: Send + Sync {
    fn encode(&self, batch: &MessageBatch<M>) -> Result<Vec<u8>, PregelError>;
    fn decode(&self, payload: &[u8]) -> Result<MessageBatch<M>, PregelError>;
}

/// Compact binary encoding, the default for every algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeFormat;

impl<M> MessageFormat<M> for BincodeFormat
where
    M: Serialize + DeserializeOwned,
{
    fn encode(&self, batch: &MessageBatch<M>) -> Result<Vec<u8>, PregelError> {
        bincode::serialize(batch).map_err(|e| PregelError::Encode(e))
    }

    fn decode(&self, payload: &[u8]) -> Result<MessageBatch<M>, PregelError> {
        bincode::deserialize(payload).map_err(|e| PregelError::Decode(e))
    }
}

/// Human readable encoding, handy when batches have to be inspected.
///
/// JSON has no infinities or NaN: such floats are written as `null` and the
/// batch then fails to decode. Algorithms whose messages may carry them, like
/// unreached shortest-path distances, keep [`BincodeFormat`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl<M> MessageFormat<M> for JsonFormat
where
    M: Serialize + DeserializeOwned,
{
    fn encode(&self, batch: &MessageBatch<M>) -> Result<Vec<u8>, PregelError> {
        serde_json::to_vec(batch).map_err(|e| PregelError::Encode(Box::new(e)))
    }

    fn decode(&self, payload: &[u8]) -> Result<MessageBatch<M>, PregelError> {
        serde_json::from_slice(payload).map_err(|e| PregelError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combine::{Combine, SumCombiner};
    use crate::incoming::IncomingCache;
    use crate::message::VertexId;

    use std::sync::Arc;

    fn batch() -> MessageBatch<f64> {
        let mut batch = MessageBatch::new(3);
        batch.push(VertexId::from("a"), 0.25);
        batch.push(VertexId::from("b"), 1.5);
        batch.push(VertexId::from("a"), 0.75);
        batch
    }

    #[test]
    fn bincode_round_trip() {
        let payload = MessageFormat::<f64>::encode(&BincodeFormat, &batch()).unwrap();
        let decoded: MessageBatch<f64> = BincodeFormat.decode(&payload).unwrap();
        assert_eq!(decoded, batch());
    }

    #[test]
    fn json_round_trip() {
        let payload = MessageFormat::<f64>::encode(&JsonFormat, &batch()).unwrap();
        let decoded: MessageBatch<f64> = JsonFormat.decode(&payload).unwrap();
        assert_eq!(decoded, batch());
    }

    #[test]
    fn json_cannot_carry_non_finite_floats() {
        let mut batch = MessageBatch::new(0);
        batch.push(VertexId::from("far"), f64::INFINITY);

        let payload = MessageFormat::<f64>::encode(&JsonFormat, &batch).unwrap();
        let result: Result<MessageBatch<f64>, _> = JsonFormat.decode(&payload);
        assert!(matches!(result, Err(PregelError::Decode(_))));

        let payload = MessageFormat::<f64>::encode(&BincodeFormat, &batch).unwrap();
        let decoded: MessageBatch<f64> = BincodeFormat.decode(&payload).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let result: Result<MessageBatch<f64>, _> = BincodeFormat.decode(&[0xff, 0x01]);
        assert!(matches!(result, Err(PregelError::Decode(_))));

        let result: Result<MessageBatch<f64>, _> = JsonFormat.decode(b"{not json");
        assert!(matches!(result, Err(PregelError::Decode(_))));
    }

    #[test]
    fn decoded_value_combines_like_the_sent_one() {
        let combiner: Arc<dyn Combine<f64>> = Arc::new(SumCombiner);
        let value = 0.3_f64;

        let mut single = MessageBatch::new(0);
        single.push(VertexId::from("v"), value);
        let payload = MessageFormat::<f64>::encode(&BincodeFormat, &single).unwrap();
        let decoded: MessageBatch<f64> = BincodeFormat.decode(&payload).unwrap();
        let (_, copy) = decoded.messages[0].clone();

        let through_wire = IncomingCache::new(Some(combiner.clone()), 16);
        through_wire.insert(VertexId::from("v"), copy);
        through_wire.insert(VertexId::from("v"), copy);

        let direct = IncomingCache::new(Some(combiner), 16);
        direct.insert(VertexId::from("v"), value);
        direct.insert(VertexId::from("v"), value);

        assert_eq!(through_wire.get("v"), direct.get("v"));
    }
}
