//! FILENAME: core/pivot-pipeline/src/protocol.rs
//! JSON messages exchanged with the offload worker.
//!
//! Request:  `{"id":7,"type":"CALCULATE","config":{"records":[..],"pivot":{..}}}`
//! Response: `{"id":7,"type":"RESULT","result":{..}}` or
//!           `{"id":7,"type":"ERROR","message":".."}`

use pivot_engine::{PivotResult, Record, TransferableConfig};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "CALCULATE")]
    Calculate,
    #[serde(rename = "RESULT")]
    Result,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffloadPayload {
    pub records: Vec<Record>,
    pub pivot: TransferableConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub config: OffloadPayload,
}

/// Borrowed twin of `WorkerRequest` so encoding never clones records.
#[derive(Serialize)]
struct WorkerRequestRef<'a> {
    id: u64,
    #[serde(rename = "type")]
    kind: MessageType,
    config: OffloadPayloadRef<'a>,
}

#[derive(Serialize)]
struct OffloadPayloadRef<'a> {
    records: &'a [Record],
    pivot: &'a TransferableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PivotResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WorkerResponse {
    pub fn result(id: u64, result: PivotResult) -> Self {
        WorkerResponse { id, kind: MessageType::Result, result: Some(result), message: None }
    }

    pub fn error(id: u64, message: impl Into<String>) -> Self {
        WorkerResponse { id, kind: MessageType::Error, result: None, message: Some(message.into()) }
    }
}

// ============================================================================
// CODEC
// ============================================================================

pub fn encode_request(
    id: u64,
    records: &[Record],
    pivot: &TransferableConfig,
) -> Result<String, PipelineError> {
    let request = WorkerRequestRef {
        id,
        kind: MessageType::Calculate,
        config: OffloadPayloadRef { records, pivot },
    };
    Ok(serde_json::to_string(&request)?)
}

pub fn decode_request(payload: &str) -> Result<WorkerRequest, PipelineError> {
    let request: WorkerRequest = serde_json::from_str(payload)?;
    if request.kind != MessageType::Calculate {
        return Err(PipelineError::Protocol(format!(
            "request {} has type {:?}, expected CALCULATE",
            request.id, request.kind
        )));
    }
    Ok(request)
}

/// Best-effort id of a message that failed to decode; 0 when unreadable.
pub fn peek_id(payload: &str) -> u64 {
    #[derive(Deserialize)]
    struct IdOnly {
        id: u64,
    }
    serde_json::from_str::<IdOnly>(payload).map(|m| m.id).unwrap_or(0)
}

pub fn encode_response(response: &WorkerResponse) -> Result<String, PipelineError> {
    Ok(serde_json::to_string(response)?)
}

pub fn decode_response(expected_id: u64, payload: &str) -> Result<PivotResult, PipelineError> {
    let response: WorkerResponse = serde_json::from_str(payload)?;
    if response.id != expected_id {
        return Err(PipelineError::Protocol(format!(
            "response id {} does not match request {}",
            response.id, expected_id
        )));
    }
    match response.kind {
        MessageType::Result => response
            .result
            .ok_or_else(|| PipelineError::Protocol("RESULT message without a result".to_string())),
        MessageType::Error => Err(PipelineError::Worker(response.message.unwrap_or_default())),
        MessageType::Calculate => {
            Err(PipelineError::Protocol("worker answered with a CALCULATE message".to_string()))
        }
    }
}
