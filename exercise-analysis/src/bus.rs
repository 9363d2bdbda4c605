//! Thin wrapper over the stream bus's consumer-group protocol.
//!
//! The `redis` crate has no first-class Streams API, so these helpers issue
//! the underlying `XADD`/`XGROUP CREATE`/`XREADGROUP`/`XACK` commands
//! directly through [`redis::cmd`], following the connection-management
//! style of a shared multiplexed async connection cloned per pipeline.

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{ConfigError, PipelineError};

const DATA_FIELD: &str = "data";
const OUTPUT_STREAM_MAXLEN: usize = 1000;

/// A single delivered message: its stream entry id (needed to ack) and the
/// decoded payload under the `data` field.
pub struct Delivery {
    pub entry_id: String,
    pub raw: String,
}

/// Shared handle to the stream bus. Clones share the underlying multiplexed
/// connection — cheap to clone per pipeline, matching the bus client's own
/// internal connection pooling.
#[derive(Clone)]
pub struct StreamBus {
    connection: MultiplexedConnection,
}

impl StreamBus {
    pub async fn connect(redis_url: &str) -> Result<Self, ConfigError> {
        let client = redis::Client::open(redis_url).map_err(|source| ConfigError::BusUnreachable {
            url: redis_url.to_string(),
            source,
        })?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|source| ConfigError::BusUnreachable {
                url: redis_url.to_string(),
                source,
            })?;
        Ok(Self { connection })
    }

    /// Creates the consumer group on `stream` if it does not already exist.
    /// A "group already exists" error from the bus is swallowed —
    /// stream/group creation is idempotent.
    pub async fn ensure_consumer_group(
        &mut self,
        stream: &str,
        group: &str,
    ) -> Result<(), PipelineError> {
        let result: Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut self.connection)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
            Err(err) => Err(PipelineError::Bus(err)),
        }
    }

    /// Blocking batch read from `stream` under `group`/`consumer`. Returns an
    /// empty vec on a read timeout (no new messages within `block_ms`).
    pub async fn read_group(
        &mut self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block_ms: usize,
    ) -> Result<Vec<Delivery>, PipelineError> {
        let reply: redis::streams::StreamReadReply = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(stream)
            .arg(">")
            .query_async(&mut self.connection)
            .await
            .or_else(|err| {
                // A BLOCK timeout with no new entries surfaces as a nil
                // reply, which the redis crate reports as a type error on
                // some server versions; treat it as "no messages".
                if err.to_string().contains("Response was nil") {
                    Ok(redis::streams::StreamReadReply { keys: vec![] })
                } else {
                    Err(err)
                }
            })
            .map_err(PipelineError::Bus)?;

        let mut deliveries = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                if let Some(redis::Value::BulkString(bytes)) = entry.map.get(DATA_FIELD) {
                    if let Ok(raw) = String::from_utf8(bytes.clone()) {
                        deliveries.push(Delivery { entry_id: entry.id.clone(), raw });
                    }
                }
            }
        }
        Ok(deliveries)
    }

    /// Acknowledges `entry_id` on `stream` under `group`.
    pub async fn ack(&mut self, stream: &str, group: &str, entry_id: &str) -> Result<(), PipelineError> {
        let _: i64 = self
            .connection
            .xack(stream, group, &[entry_id])
            .await
            .map_err(PipelineError::Bus)?;
        Ok(())
    }

    /// Publishes a JSON-serializable payload onto `stream`, trimming to an
    /// approximate length cap of 1000 entries (oldest dropped first).
    pub async fn publish<T: Serialize>(&mut self, stream: &str, payload: &T) -> Result<(), PipelineError> {
        let json = serde_json::to_string(payload).map_err(PipelineError::Decode)?;
        let _: String = redis::cmd("XADD")
            .arg(stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(OUTPUT_STREAM_MAXLEN)
            .arg("*")
            .arg(DATA_FIELD)
            .arg(json)
            .query_async(&mut self.connection)
            .await
            .map_err(PipelineError::Bus)?;
        Ok(())
    }
}

/// Decodes a delivered message's `data` payload into `T`.
pub fn decode<T: DeserializeOwned>(delivery: &Delivery) -> Result<T, PipelineError> {
    serde_json::from_str(&delivery.raw).map_err(PipelineError::Decode)
}
