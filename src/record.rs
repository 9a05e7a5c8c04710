use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Form data captured at submission time: field name to string, number or array.
pub type Payload = Map<String, Value>;

/// Store-assigned identifier of a queued record.
///
/// Ids are handed out by the backing store on insert and are never reused for the
/// lifetime of that store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A single captured submission waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedRecord {
	pub id: RecordId,
	pub payload: Payload,
	/// Epoch milliseconds at enqueue time.
	pub captured_at: i64,
}

impl QueuedRecord {
	pub(crate) fn new(id: RecordId, payload: Payload) -> Self {
		Self {
			id,
			payload,
			captured_at: now_millis(),
		}
	}

	/// The document sent to the endpoint: the payload plus `timestamp`, the
	/// capture time in epoch milliseconds, so a replayed record keeps the time
	/// it was filled in rather than the time it was synced.
	pub fn to_submission(&self) -> Payload {
		let mut submission = self.payload.clone();
		submission.insert(SUBMISSION_TIMESTAMP.into(), Value::from(self.captured_at));
		submission
	}
}

/// Field carrying the capture time in forwarded documents.
pub const SUBMISSION_TIMESTAMP: &str = "timestamp";

pub(crate) fn now_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_serializes_camel_case() {
		let mut payload = Payload::new();
		payload.insert("firstName".into(), json!("Ada"));
		let record = QueuedRecord {
			id: RecordId(7),
			payload,
			captured_at: 1_700_000_000_000,
		};

		let value = serde_json::to_value(&record).unwrap();
		assert_eq!(value["id"], 7);
		assert_eq!(value["capturedAt"], 1_700_000_000_000_i64);
		assert_eq!(value["payload"]["firstName"], "Ada");

		let back: QueuedRecord = serde_json::from_value(value).unwrap();
		assert_eq!(back, record);
	}

	#[test]
	fn test_submission_carries_capture_time() {
		let mut payload = Payload::new();
		payload.insert("firstName".into(), json!("Ada"));
		payload.insert("timestamp".into(), json!(1));
		let record = QueuedRecord {
			id: RecordId(3),
			payload,
			captured_at: 1_700_000_000_123,
		};

		let submission = record.to_submission();
		assert_eq!(submission["firstName"], "Ada");
		assert_eq!(submission["timestamp"], 1_700_000_000_123_i64);
		assert_eq!(record.payload["timestamp"], 1, "stored payload is left untouched");
	}

	#[test]
	fn test_new_stamps_capture_time() {
		let before = now_millis();
		let record = QueuedRecord::new(RecordId(1), Payload::new());
		assert!(record.captured_at >= before);
	}
}
