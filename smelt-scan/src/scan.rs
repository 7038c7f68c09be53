//! The trial-decryption engine.
//!
//! A pure function over an immutable request: no shared state between
//! candidates, idempotent, safe to retry after a worker failure.

use tracing::{debug_span, trace};

use smelt_chain::{
    keys::AccountKeySet,
    note::Nullifier,
    serialization::SmeltSerialize,
};

use crate::{
    request::{DecryptNotesRequest, EncryptedNoteCandidate},
    response::{DecryptNotesResponse, DecryptedNote},
};

/// Trial-decrypt every candidate in `request` against every account.
///
/// The response holds one slot per (account, candidate) pair, laid out in
/// per-account contiguous blocks: the slot for account `k` and candidate
/// `i` is `k * candidates.len() + i`. For each candidate, accounts are
/// attempted in supplied order and the first receiver match wins: the
/// winning account's slot is filled and no further accounts are tried.
/// When no account matches as receiver and `decrypt_for_spender` is set,
/// each account's outgoing view key is tried the same way. Candidates
/// nobody can decrypt leave all their slots empty; that is the expected
/// outcome, not an error.
pub fn decrypt_notes(request: &DecryptNotesRequest) -> DecryptNotesResponse {
    let span = debug_span!(
        "decrypt_notes",
        job_id = request.job_id,
        accounts = request.account_keys.len(),
        candidates = request.candidates.len(),
    );
    let _entered = span.enter();

    let candidate_count = request.candidates.len();
    let mut notes = vec![None; request.account_keys.len() * candidate_count];

    for (candidate_index, candidate) in request.candidates.iter().enumerate() {
        let receiver_match = request
            .account_keys
            .iter()
            .enumerate()
            .find_map(|(account_index, account)| {
                try_decrypt_for_receiver(account, candidate, request.options.skip_note_validation)
                    .map(|note| (account_index, note))
            });

        if let Some((account_index, note)) = receiver_match {
            trace!(candidate_index, account_index, "decrypted note for receiver");
            notes[account_index * candidate_count + candidate_index] = Some(note);
            continue;
        }

        if !request.options.decrypt_for_spender {
            continue;
        }

        let spender_match = request
            .account_keys
            .iter()
            .enumerate()
            .find_map(|(account_index, account)| {
                try_decrypt_for_spender(account, candidate).map(|note| (account_index, note))
            });

        if let Some((account_index, note)) = spender_match {
            trace!(candidate_index, account_index, "decrypted note for spender");
            notes[account_index * candidate_count + candidate_index] = Some(note);
        }
    }

    DecryptNotesResponse::new(notes, request.job_id)
}

/// Attempt receiver-side decryption of one candidate for one account.
fn try_decrypt_for_receiver(
    account: &AccountKeySet,
    candidate: &EncryptedNoteCandidate,
    skip_note_validation: bool,
) -> Option<DecryptedNote> {
    let note = candidate
        .note
        .decrypt_note_for_owner(&account.incoming_view_key)?;

    let hash = candidate.note.commitment();
    if !skip_note_validation && note.commitment() != hash {
        // The plaintext does not match the committed form the container
        // claims, so this account gets no match.
        return None;
    }

    let nullifier = Nullifier::derive(&account.view_key, &hash, candidate.note_index);

    Some(DecryptedNote {
        for_spender: false,
        note_index: candidate.note_index,
        hash,
        nullifier: Some(nullifier),
        serialized_note: note
            .smelt_serialize_to_vec()
            .expect("writes to a Vec<u8> are infallible"),
    })
}

/// Attempt spender-side decryption of one candidate for one account.
///
/// The spender cannot derive the nullifier: that takes the receiver's view
/// key.
fn try_decrypt_for_spender(
    account: &AccountKeySet,
    candidate: &EncryptedNoteCandidate,
) -> Option<DecryptedNote> {
    let note = candidate
        .note
        .decrypt_note_for_spender(&account.outgoing_view_key)?;

    Some(DecryptedNote {
        for_spender: true,
        note_index: candidate.note_index,
        hash: candidate.note.commitment(),
        nullifier: None,
        serialized_note: note
            .smelt_serialize_to_vec()
            .expect("writes to a Vec<u8> are infallible"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::thread_rng;

    use smelt_chain::{
        note::{EncryptedNote, Memo, Note},
        serialization::SmeltDeserialize,
    };

    use crate::request::DecryptOptions;

    /// A note addressed to `receiver`, created by `sender`, and its
    /// encrypted container.
    fn note_for(receiver: &AccountKeySet, sender: &AccountKeySet) -> (Note, EncryptedNote) {
        let mut rng = thread_rng();
        let note = Note::new(
            receiver.incoming_view_key.transmission_key(),
            5_000,
            Memo::from("pay packet"),
            sender.incoming_view_key.transmission_key(),
            &mut rng,
        );
        let encrypted = EncryptedNote::encrypt(&note, &sender.outgoing_view_key, &mut rng);

        (note, encrypted)
    }

    fn request_for(
        account_keys: Vec<AccountKeySet>,
        candidates: Vec<EncryptedNoteCandidate>,
        options: DecryptOptions,
    ) -> DecryptNotesRequest {
        DecryptNotesRequest::new(account_keys, candidates, options, 0)
    }

    #[test]
    fn receiver_decryption_fills_the_account_slot() {
        smelt_test::init();
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let (note, encrypted) = note_for(&receiver, &sender);

        let request = request_for(
            vec![receiver],
            vec![EncryptedNoteCandidate {
                note: encrypted,
                note_index: 2,
            }],
            DecryptOptions::default(),
        );
        let response = decrypt_notes(&request);

        assert_eq!(response.notes.len(), 1);
        let decrypted = response.notes[0].as_ref().expect("receiver should match");
        assert!(!decrypted.for_spender);
        assert_eq!(decrypted.note_index, 2);
        assert_eq!(decrypted.hash, note.commitment());
        assert_eq!(
            decrypted.nullifier,
            Some(Nullifier::derive(&receiver.view_key, &note.commitment(), 2)),
        );

        let plaintext = Note::smelt_deserialize(&decrypted.serialized_note[..])
            .expect("emitted plaintext should parse");
        assert_eq!(plaintext, note);
    }

    #[test]
    fn spender_decryption_emits_no_nullifier() {
        smelt_test::init();
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let (note, encrypted) = note_for(&receiver, &sender);

        let request = request_for(
            vec![sender],
            vec![EncryptedNoteCandidate {
                note: encrypted,
                note_index: 3,
            }],
            DecryptOptions {
                decrypt_for_spender: true,
                ..DecryptOptions::default()
            },
        );
        let response = decrypt_notes(&request);

        let decrypted = response.notes[0].as_ref().expect("spender should match");
        assert!(decrypted.for_spender);
        assert_eq!(decrypted.note_index, 3);
        assert_eq!(decrypted.hash, note.commitment());
        assert_eq!(decrypted.nullifier, None);
    }

    #[test]
    fn spender_decryption_can_be_disabled() {
        smelt_test::init();
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let (_note, encrypted) = note_for(&receiver, &sender);

        let request = request_for(
            vec![sender],
            vec![EncryptedNoteCandidate {
                note: encrypted,
                note_index: 3,
            }],
            DecryptOptions::default(),
        );
        let response = decrypt_notes(&request);

        assert_eq!(response.notes, vec![None]);
    }

    #[test]
    fn unrelated_notes_are_a_clean_non_match() {
        smelt_test::init();
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let stranger = AccountKeySet::generate(&mut rng);
        let (_note, encrypted) = note_for(&receiver, &sender);

        let request = request_for(
            vec![stranger],
            vec![EncryptedNoteCandidate {
                note: encrypted,
                note_index: 0,
            }],
            DecryptOptions {
                decrypt_for_spender: true,
                ..DecryptOptions::default()
            },
        );
        let response = decrypt_notes(&request);

        assert_eq!(response.notes, vec![None]);
    }

    #[test]
    fn first_matching_account_wins() {
        smelt_test::init();
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let (_note, encrypted) = note_for(&receiver, &sender);

        // The same account supplied twice: both could decrypt, only the
        // first is reported.
        let request = request_for(
            vec![receiver, receiver],
            vec![EncryptedNoteCandidate {
                note: encrypted,
                note_index: 0,
            }],
            DecryptOptions::default(),
        );
        let response = decrypt_notes(&request);

        assert_eq!(response.notes.len(), 2);
        assert!(response.notes[0].is_some());
        assert!(response.notes[1].is_none());
    }

    #[test]
    fn slots_land_in_per_account_blocks() {
        smelt_test::init();
        let mut rng = thread_rng();
        let first = AccountKeySet::generate(&mut rng);
        let second = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let (_note_a, encrypted_a) = note_for(&first, &sender);
        let (_note_b, encrypted_b) = note_for(&second, &sender);

        let request = request_for(
            vec![first, second],
            vec![
                EncryptedNoteCandidate {
                    note: encrypted_a,
                    note_index: 10,
                },
                EncryptedNoteCandidate {
                    note: encrypted_b,
                    note_index: 11,
                },
            ],
            DecryptOptions::default(),
        );
        let response = decrypt_notes(&request);

        // Account 0's block covers candidates 0..2, account 1's 2..4.
        assert_eq!(response.notes.len(), 4);
        assert!(response.notes[0].is_some());
        assert!(response.notes[1].is_none());
        assert!(response.notes[2].is_none());
        assert!(response.notes[3].is_some());

        let map = response.map_to_accounts(&["first", "second"]);
        assert!(map["first"][0].is_some());
        assert!(map["second"][1].is_some());
    }

    #[test]
    fn validation_rejects_a_tampered_commitment_unless_skipped() {
        smelt_test::init();
        let mut rng = thread_rng();
        let receiver = AccountKeySet::generate(&mut rng);
        let sender = AccountKeySet::generate(&mut rng);
        let (_note, mut tampered) = note_for(&receiver, &sender);
        tampered.0[0] ^= 1;

        let candidate = EncryptedNoteCandidate {
            note: tampered,
            note_index: 0,
        };

        let strict = decrypt_notes(&request_for(
            vec![receiver],
            vec![candidate.clone()],
            DecryptOptions::default(),
        ));
        assert_eq!(strict.notes, vec![None]);

        let trusting = decrypt_notes(&request_for(
            vec![receiver],
            vec![candidate],
            DecryptOptions {
                skip_note_validation: true,
                ..DecryptOptions::default()
            },
        ));
        let decrypted = trusting.notes[0]
            .as_ref()
            .expect("skipping validation should surface the decryption");
        assert_eq!(decrypted.hash, tampered.commitment());
    }

    #[test]
    fn empty_requests_produce_empty_responses() {
        smelt_test::init();

        let request = request_for(Vec::new(), Vec::new(), DecryptOptions::default());
        let response = decrypt_notes(&request);
        assert!(response.notes.is_empty());
    }
}
