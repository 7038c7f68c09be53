//! The envelope framing job messages between the pool and its workers.
//!
//! Every message is `job_id` (u64 LE) followed by a one-byte kind and the
//! kind's payload. The id is caller-chosen, opaque, and carried unchanged
//! from a request to its matching response, so the router can resolve the
//! pending handle without understanding the payload.

use std::io;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use smelt_chain::serialization::{SerializationError, SmeltDeserializeInto, WriteSmeltExt};

use crate::{request::DecryptNotesRequest, response::DecryptNotesResponse};

/// The envelope header length: job id plus kind byte.
pub const HEADER_SIZE: usize = 8 + 1;

/// The message discriminant carried after the job id.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageKind {
    /// A [`DecryptNotesRequest`] payload.
    DecryptNotesRequest = 0,
    /// A [`DecryptNotesResponse`] payload.
    DecryptNotesResponse = 1,
    /// A [`JobError`] payload.
    JobError = 2,
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        kind as u8
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = SerializationError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(MessageKind::DecryptNotesRequest),
            1 => Ok(MessageKind::DecryptNotesResponse),
            2 => Ok(MessageKind::JobError),
            _ => Err(SerializationError::Parse("unknown job message kind")),
        }
    }
}

/// A worker-side failure, reported in place of a response.
///
/// Jobs are pure functions of their request, so callers may retry an
/// equivalent request after receiving one of these.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("job failed: {message}")]
pub struct JobError {
    /// Human-readable failure detail from the worker.
    pub message: String,
}

impl JobError {
    /// Wrap a failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Encode this failure as a full envelope for `job_id`.
    pub fn encode(&self, job_id: u64) -> Vec<u8> {
        let expected_size = HEADER_SIZE + 4 + self.message.len();

        let mut data = Vec::with_capacity(expected_size);
        write_header(&mut data, job_id, MessageKind::JobError);
        data.write_count(self.message.len())
            .expect("writes to a Vec<u8> are infallible");
        data.extend_from_slice(self.message.as_bytes());

        assert_eq!(
            data.len(),
            expected_size,
            "error envelope wrote {} bytes but its size is {}",
            data.len(),
            expected_size,
        );
        data
    }

    fn decode_payload<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        let bytes = reader.smelt_deserialize_into()?;
        let message = String::from_utf8(bytes)
            .map_err(|_| SerializationError::Parse("job error message is not valid UTF-8"))?;

        Ok(Self { message })
    }
}

/// A job submitted to a worker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WorkerRequest {
    /// Trial-decrypt a batch of candidate notes.
    DecryptNotes(DecryptNotesRequest),
}

impl WorkerRequest {
    /// The correlation id this request's response will carry.
    pub fn job_id(&self) -> u64 {
        match self {
            WorkerRequest::DecryptNotes(request) => request.job_id,
        }
    }

    /// Encode the full envelope: header then payload, at its exact size.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            WorkerRequest::DecryptNotes(request) => {
                let expected_size = HEADER_SIZE + request.payload_size();

                let mut data = Vec::with_capacity(expected_size);
                write_header(&mut data, request.job_id, MessageKind::DecryptNotesRequest);
                request
                    .serialize_payload(&mut data)
                    .expect("writes to a Vec<u8> are infallible");

                assert_eq!(
                    data.len(),
                    expected_size,
                    "request envelope wrote {} bytes but its size is {}",
                    data.len(),
                    expected_size,
                );
                data
            }
        }
    }

    /// Decode a request envelope, as a worker does when taking a job.
    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut reader = bytes;
        let (job_id, kind) = read_header(&mut reader)?;

        match kind {
            MessageKind::DecryptNotesRequest => Ok(WorkerRequest::DecryptNotes(
                DecryptNotesRequest::deserialize_payload(job_id, reader)?,
            )),
            MessageKind::DecryptNotesResponse | MessageKind::JobError => Err(
                SerializationError::Parse("expected a request envelope, found a reply kind"),
            ),
        }
    }
}

/// A completed job's results.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WorkerResponse {
    /// The results of a [`WorkerRequest::DecryptNotes`] job.
    DecryptNotes(DecryptNotesResponse),
}

impl WorkerResponse {
    /// The correlation id of the request this response answers.
    pub fn job_id(&self) -> u64 {
        match self {
            WorkerResponse::DecryptNotes(response) => response.job_id,
        }
    }

    /// Encode the full envelope: header then payload, at its exact size.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            WorkerResponse::DecryptNotes(response) => {
                let expected_size = HEADER_SIZE + response.payload_size();

                let mut data = Vec::with_capacity(expected_size);
                write_header(&mut data, response.job_id, MessageKind::DecryptNotesResponse);
                response
                    .serialize_payload(&mut data)
                    .expect("writes to a Vec<u8> are infallible");

                assert_eq!(
                    data.len(),
                    expected_size,
                    "response envelope wrote {} bytes but its size is {}",
                    data.len(),
                    expected_size,
                );
                data
            }
        }
    }
}

/// Everything a worker can send back to the router.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WorkerReply {
    /// The job completed.
    Response(WorkerResponse),
    /// The job failed; the handle resolves with the error.
    Failed {
        /// The failed job's correlation id.
        job_id: u64,
        /// What went wrong.
        error: JobError,
    },
}

impl WorkerReply {
    /// The correlation id the router resolves with this reply.
    pub fn job_id(&self) -> u64 {
        match self {
            WorkerReply::Response(response) => response.job_id(),
            WorkerReply::Failed { job_id, .. } => *job_id,
        }
    }

    /// Decode a reply envelope, as the router does.
    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut reader = bytes;
        let (job_id, kind) = read_header(&mut reader)?;

        match kind {
            MessageKind::DecryptNotesResponse => Ok(WorkerReply::Response(
                WorkerResponse::DecryptNotes(DecryptNotesResponse::deserialize_payload(
                    job_id, reader,
                )?),
            )),
            MessageKind::JobError => Ok(WorkerReply::Failed {
                job_id,
                error: JobError::decode_payload(reader)?,
            }),
            MessageKind::DecryptNotesRequest => Err(SerializationError::Parse(
                "expected a reply envelope, found a request kind",
            )),
        }
    }
}

fn write_header(data: &mut Vec<u8>, job_id: u64, kind: MessageKind) {
    data.write_u64::<LittleEndian>(job_id)
        .expect("writes to a Vec<u8> are infallible");
    data.write_u8(kind.into())
        .expect("writes to a Vec<u8> are infallible");
}

fn read_header<R: io::Read>(reader: &mut R) -> Result<(u64, MessageKind), SerializationError> {
    let job_id = reader.read_u64::<LittleEndian>()?;
    let kind = MessageKind::try_from(reader.read_u8()?)?;
    Ok((job_id, kind))
}
