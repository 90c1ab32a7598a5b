//! JobEnvelope: job type + data, the thing stored as a job's payload bytes.

use serde::{Deserialize, Serialize};

use super::errors::QueueError;

/// Job type + JSON data, encoded as the payload bytes of a job record.
///
/// The queue core never looks inside `data`; it only needs `job_type` to
/// find a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    job_type: String,
    data: serde_json::Value,
}

impl JobEnvelope {
    pub fn new(job_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            job_type: job_type.into(),
            data,
        }
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn into_data(self) -> serde_json::Value {
        self.data
    }

    pub fn encode(&self) -> Result<Vec<u8>, QueueError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encoded_shape_is_plain_json() {
        let env = JobEnvelope::new("mail.send", json!({ "to": "a@b.c" }));
        let bytes = env.encode().unwrap();
        let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["job_type"], "mail.send");
        assert_eq!(v["data"]["to"], "a@b.c");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(JobEnvelope::decode(b"not json").is_err());
    }
}
