//! Kafka reader backed by rskafka.
//!
//! Only partition 0 is read. Without a key filter the record just below the
//! high watermark is returned; with a filter the newest [`DEFAULT_SCAN_WINDOW`]
//! records are scanned and the last match wins.

use async_trait::async_trait;
use rskafka::client::partition::{OffsetAt, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::RecordAndOffset;
use tracing::{debug, trace};

use crate::error::{AdapterError, Result};
use crate::traits::{KafkaFetch, KafkaRecord};

/// Number of trailing records inspected when filtering by key.
pub const DEFAULT_SCAN_WINDOW: i64 = 100;

const PARTITION: i32 = 0;
const MAX_FETCH_BYTES: i32 = 1_048_576;
const MAX_WAIT_MS: i32 = 500;

/// [`KafkaFetch`] implementation that opens a short-lived client per call.
#[derive(Debug, Clone)]
pub struct KafkaReader {
    scan_window: i64,
}

impl Default for KafkaReader {
    fn default() -> Self {
        Self::new()
    }
}

impl KafkaReader {
    pub fn new() -> Self {
        Self {
            scan_window: DEFAULT_SCAN_WINDOW,
        }
    }

    async fn partition(&self, broker: &str, topic: &str) -> Result<PartitionClient> {
        let client = ClientBuilder::new(vec![broker.to_string()])
            .build()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("connect to {}: {}", broker, e)))?;

        client
            .partition_client(topic.to_string(), PARTITION, UnknownTopicHandling::Error)
            .await
            .map_err(|e| AdapterError::Unavailable(format!("open topic {}: {}", topic, e)))
    }

    async fn fetch_from(
        &self,
        partition: &PartitionClient,
        offset: i64,
    ) -> Result<Vec<RecordAndOffset>> {
        let (records, high_watermark) = partition
            .fetch_records(offset, 1..MAX_FETCH_BYTES, MAX_WAIT_MS)
            .await
            .map_err(|e| AdapterError::Unavailable(format!("fetch at offset {}: {}", offset, e)))?;
        trace!(offset, count = records.len(), high_watermark, "Fetched records");
        Ok(records)
    }
}

fn decode(record: RecordAndOffset) -> KafkaRecord {
    let key = record
        .record
        .key
        .map(|k| String::from_utf8_lossy(&k).into_owned());
    let value = record
        .record
        .value
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .unwrap_or_default();
    KafkaRecord { key, value }
}

fn key_matches(record: &RecordAndOffset, wanted: &str) -> bool {
    record.record.key.as_deref() == Some(wanted.as_bytes())
}

/// First offset of the key scan: at most `window` records below `latest`,
/// never before `earliest`.
fn scan_start(earliest: i64, latest: i64, window: i64) -> i64 {
    earliest.max(latest - window)
}

#[async_trait]
impl KafkaFetch for KafkaReader {
    async fn get_last_message(
        &self,
        broker: &str,
        topic: &str,
        key_filter: Option<&str>,
    ) -> Result<KafkaRecord> {
        if broker.is_empty() || topic.is_empty() {
            return Err(AdapterError::Unavailable(
                "broker or topic is empty".to_string(),
            ));
        }

        let partition = self.partition(broker, topic).await?;
        let offset_err =
            |e: rskafka::client::error::Error| AdapterError::Unavailable(format!("read offsets: {}", e));
        let latest = partition.get_offset(OffsetAt::Latest).await.map_err(offset_err)?;
        let earliest = partition
            .get_offset(OffsetAt::Earliest)
            .await
            .map_err(offset_err)?;

        debug!(broker, topic, earliest, latest, key = ?key_filter, "Reading last message");

        if latest <= earliest {
            return Err(AdapterError::NotFound(format!("topic {} is empty", topic)));
        }

        let Some(wanted) = key_filter else {
            let last = latest - 1;
            return self
                .fetch_from(&partition, last)
                .await?
                .into_iter()
                .find(|r| r.offset == last)
                .map(decode)
                .ok_or_else(|| AdapterError::NotFound(format!("no record at offset {}", last)));
        };

        let mut offset = scan_start(earliest, latest, self.scan_window);
        let mut found = None;
        while offset < latest {
            let batch = self.fetch_from(&partition, offset).await?;
            let before = offset;
            for record in batch {
                if record.offset < offset {
                    continue;
                }
                if record.offset >= latest {
                    break;
                }
                offset = record.offset + 1;
                if key_matches(&record, wanted) {
                    found = Some(record);
                }
            }
            if offset == before {
                break;
            }
        }

        found.map(decode).ok_or_else(|| {
            AdapterError::NotFound(format!(
                "key {} not found in the last {} records of {}",
                wanted, self.scan_window, topic
            ))
        })
    }
}
