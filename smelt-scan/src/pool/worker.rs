//! The worker thread loop.
//!
//! Workers receive serialized request envelopes, run the engine, and send
//! serialized reply envelopes back to the router. Failures of any kind,
//! panics included, become an addressed error envelope so the submitting
//! caller's handle always resolves.

use std::panic::{catch_unwind, AssertUnwindSafe};

use byteorder::{ByteOrder, LittleEndian};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, debug_span};

use smelt_chain::serialization::SerializationError;

use crate::{
    message::{JobError, WorkerRequest, WorkerResponse},
    scan,
};

/// Take jobs off the shared channel until the pool closes it.
pub(super) fn run(index: usize, work_rx: Receiver<Vec<u8>>, reply_tx: Sender<Vec<u8>>) {
    debug!(worker = index, "decryption worker started");

    for job in work_rx.iter() {
        let reply = process(index, &job);
        if reply_tx.send(reply).is_err() {
            // The router is gone, so nobody is waiting for results.
            break;
        }
    }

    debug!(worker = index, "decryption worker exiting: work channel closed");
}

fn process(index: usize, job: &[u8]) -> Vec<u8> {
    let job_id = peek_job_id(job);
    let span = debug_span!("job", worker = index, job_id);
    let _entered = span.enter();

    match catch_unwind(AssertUnwindSafe(|| execute(job))) {
        Ok(Ok(reply)) => {
            metrics::counter!("scan.jobs.completed", 1);
            reply
        }
        Ok(Err(error)) => {
            metrics::counter!("scan.jobs.failed", 1);
            debug!(%error, "rejecting undecodable job");
            JobError::new(error.to_string()).encode(job_id)
        }
        Err(panic) => {
            metrics::counter!("scan.jobs.failed", 1);
            let message = panic_message(panic);
            debug!(panic = %message, "job panicked");
            JobError::new(message).encode(job_id)
        }
    }
}

fn execute(job: &[u8]) -> Result<Vec<u8>, SerializationError> {
    match WorkerRequest::decode(job)? {
        WorkerRequest::DecryptNotes(request) => {
            let response = scan::decrypt_notes(&request);
            Ok(WorkerResponse::DecryptNotes(response).encode())
        }
    }
}

/// Read the correlation id from an envelope header without validating the
/// rest, so even an undecodable job produces an addressed error reply.
fn peek_job_id(job: &[u8]) -> u64 {
    if job.len() < 8 {
        return 0;
    }
    LittleEndian::read_u64(&job[..8])
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "decryption job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_survive_undecodable_jobs() {
        smelt_test::init();

        let mut job = 77u64.to_le_bytes().to_vec();
        job.push(0xff);

        let reply = process(0, &job);
        let decoded = crate::message::WorkerReply::decode(&reply)
            .expect("error replies should decode");
        assert_eq!(decoded.job_id(), 77);
        assert!(matches!(decoded, crate::message::WorkerReply::Failed { .. }));
    }

    #[test]
    fn short_jobs_still_produce_a_reply() {
        smelt_test::init();

        let reply = process(0, &[1, 2, 3]);
        let decoded = crate::message::WorkerReply::decode(&reply)
            .expect("error replies should decode");
        assert_eq!(decoded.job_id(), 0);
    }
}
