//! The decryption job response model, its wire payload, and per-account
//! attribution of the flat result list.

use std::{collections::HashMap, hash::Hash, io};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use smelt_chain::{
    note::{NoteCommitment, Nullifier},
    serialization::{
        smelt_serialize_bytes, smelt_serialized_bytes_size, ReadSmeltExt, SerializationError,
        SmeltDeserialize, SmeltSerialize, WriteSmeltExt, MAX_JOB_MESSAGE_LEN,
    },
};

/// A successfully decrypted candidate note.
///
/// `nullifier` is present exactly when `for_spender` is false: deriving it
/// requires the receiver's view key, which the spender path never has.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecryptedNote {
    /// True when the spender path decrypted this note.
    pub for_spender: bool,
    /// The candidate's position in the global commitment sequence.
    pub note_index: u64,
    /// The note's committed form, usable as its identifier.
    pub hash: NoteCommitment,
    /// The spend tag, receiver path only.
    pub nullifier: Option<Nullifier>,
    /// The decrypted note plaintext encoding.
    pub serialized_note: Vec<u8>,
}

impl SmeltSerialize for DecryptedNote {
    fn wire_size(&self) -> usize {
        let nullifier_size = if self.nullifier.is_some() { 32 } else { 0 };
        1 + 8 + 32 + 1 + nullifier_size + smelt_serialized_bytes_size(&self.serialized_note)
    }

    fn smelt_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_flag(self.for_spender)?;
        writer.write_u64::<LittleEndian>(self.note_index)?;
        writer.write_32_bytes(&self.hash.0)?;
        match self.nullifier {
            Some(nullifier) => {
                writer.write_flag(true)?;
                nullifier.smelt_serialize(&mut writer)?;
            }
            None => writer.write_flag(false)?,
        }
        smelt_serialize_bytes(&self.serialized_note, &mut writer)?;
        Ok(())
    }
}

impl SmeltDeserialize for DecryptedNote {
    fn smelt_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let for_spender = reader.read_flag()?;
        let note_index = reader.read_u64::<LittleEndian>()?;
        let hash = NoteCommitment::smelt_deserialize(&mut reader)?;
        let nullifier = if reader.read_flag()? {
            Some(Nullifier::smelt_deserialize(&mut reader)?)
        } else {
            None
        };
        let serialized_note = Vec::smelt_deserialize(&mut reader)?;

        Ok(Self {
            for_spender,
            note_index,
            hash,
            nullifier,
            serialized_note,
        })
    }
}

/// The results of one decryption job, one slot per (account, candidate)
/// pair in per-account contiguous blocks.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecryptNotesResponse {
    /// The request's correlation id, carried unchanged.
    pub job_id: u64,
    /// One slot per decrypt attempt; `None` marks the expected non-match.
    pub notes: Vec<Option<DecryptedNote>>,
}

impl DecryptNotesResponse {
    /// Build a response around a flat result list.
    pub fn new(notes: Vec<Option<DecryptedNote>>, job_id: u64) -> Self {
        Self { job_id, notes }
    }

    /// The exact payload length in bytes, excluding the envelope header.
    ///
    /// A wide `u32` slot count, then per slot a presence flag byte followed
    /// by the note encoding when the slot is occupied.
    pub fn payload_size(&self) -> usize {
        4 + self
            .notes
            .iter()
            .map(|slot| match slot {
                Some(note) => 1 + note.wire_size(),
                None => 1,
            })
            .sum::<usize>()
    }

    /// Write the payload. The envelope carries `job_id`, so it is not
    /// written here.
    pub fn serialize_payload<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_count(self.notes.len())?;
        for slot in &self.notes {
            match slot {
                Some(note) => {
                    writer.write_flag(true)?;
                    note.smelt_serialize(&mut writer)?;
                }
                None => writer.write_flag(false)?,
            }
        }
        Ok(())
    }

    /// Read a payload back, reattaching the envelope's `job_id`.
    pub fn deserialize_payload<R: io::Read>(
        job_id: u64,
        mut reader: R,
    ) -> Result<Self, SerializationError> {
        let len = reader.read_count_usize()?;

        // An absent slot is a single presence byte, so this is the most
        // slots that fit in a job message after its count field.
        if len > MAX_JOB_MESSAGE_LEN - 4 {
            return Err(SerializationError::Parse(
                "Vector longer than max_allocation",
            ));
        }

        let mut notes = Vec::with_capacity(len);
        for _ in 0..len {
            let slot = if reader.read_flag()? {
                Some(DecryptedNote::smelt_deserialize(&mut reader)?)
            } else {
                None
            };
            notes.push(slot);
        }

        Ok(Self { job_id, notes })
    }

    /// Partition the flat result list back to the accounts supplied to the
    /// originating request, in account order.
    ///
    /// The k-th contiguous chunk of `notes.len() / accounts.len()` slots
    /// belongs to the k-th account, with `None` entries preserved.
    ///
    /// # Panics
    ///
    /// If `notes.len()` is not a multiple of `accounts.len()`, which means
    /// the response and account list do not come from the same request.
    pub fn map_to_accounts<A>(&self, accounts: &[A]) -> HashMap<A, Vec<Option<DecryptedNote>>>
    where
        A: Clone + Eq + Hash,
    {
        if accounts.is_empty() {
            assert!(
                self.notes.is_empty(),
                "{} response notes cannot be attributed to zero accounts",
                self.notes.len(),
            );
            return HashMap::new();
        }

        assert_eq!(
            self.notes.len() % accounts.len(),
            0,
            "{} response notes cannot be split evenly across {} accounts",
            self.notes.len(),
            accounts.len(),
        );

        let chunk_size = self.notes.len() / accounts.len();
        if chunk_size == 0 {
            return accounts.iter().cloned().map(|a| (a, Vec::new())).collect();
        }

        accounts
            .iter()
            .cloned()
            .zip(self.notes.chunks(chunk_size).map(<[_]>::to_vec))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use smelt_chain::note::PLAINTEXT_NOTE_SIZE;

    fn decrypted_fixture(for_spender: bool) -> DecryptedNote {
        DecryptedNote {
            for_spender,
            note_index: 1,
            hash: NoteCommitment([1u8; 32]),
            nullifier: (!for_spender).then(|| Nullifier::from([1u8; 32])),
            serialized_note: vec![1u8; PLAINTEXT_NOTE_SIZE],
        }
    }

    fn round_trip(response: &DecryptNotesResponse) -> DecryptNotesResponse {
        let mut data = Vec::new();
        response
            .serialize_payload(&mut data)
            .expect("payload should serialize");
        assert_eq!(data.len(), response.payload_size());

        DecryptNotesResponse::deserialize_payload(response.job_id, &data[..])
            .expect("payload should deserialize")
    }

    #[test]
    fn payload_round_trips() {
        let response =
            DecryptNotesResponse::new(vec![Some(decrypted_fixture(false)), None], 0);
        assert_eq!(round_trip(&response), response);
    }

    #[test]
    fn spender_slots_round_trip_without_a_nullifier() {
        let response = DecryptNotesResponse::new(vec![Some(decrypted_fixture(true))], 7);
        let parsed = round_trip(&response);

        assert_eq!(parsed, response);
        assert_eq!(parsed.notes[0].as_ref().unwrap().nullifier, None);
    }

    #[test]
    fn payload_round_trips_at_many_list_lengths() {
        for len in [0usize, 1, 255, 256] {
            let response = DecryptNotesResponse::new(
                (0..len)
                    .map(|i| (i % 3 != 2).then(|| decrypted_fixture(i % 2 == 0)))
                    .collect(),
                4,
            );

            let parsed = round_trip(&response);
            assert_eq!(parsed.notes.len(), len);
            assert_eq!(parsed, response);
        }
    }

    #[test]
    fn payload_round_trips_over_255_notes() {
        let response = DecryptNotesResponse::new(
            (0..600).map(|_| Some(decrypted_fixture(false))).collect(),
            0,
        );

        let parsed = round_trip(&response);
        assert_eq!(parsed.notes.len(), 600);
        assert_eq!(parsed, response);
    }

    #[test]
    fn empty_payload_round_trips() {
        let response = DecryptNotesResponse::new(Vec::new(), 3);
        assert_eq!(round_trip(&response), response);
    }

    #[test]
    fn map_to_accounts_links_each_account_to_its_notes() {
        let accounts: Vec<char> = ('a'..='z').collect();
        let notes_per_account = 100;

        let response = DecryptNotesResponse::new(
            (0..accounts.len() * notes_per_account)
                .map(|i| (i % 3 != 2).then(|| decrypted_fixture(false)))
                .collect(),
            0,
        );

        let accounts_to_notes = response.map_to_accounts(&accounts);
        assert_eq!(accounts_to_notes.len(), accounts.len());

        for account in &accounts {
            let notes = &accounts_to_notes[account];
            assert_eq!(notes.len(), notes_per_account);
        }

        // Intra-chunk order is preserved.
        let first_chunk = &accounts_to_notes[&'a'];
        assert_eq!(first_chunk[..], response.notes[..notes_per_account]);
    }

    #[test]
    fn map_to_accounts_with_no_notes_gives_every_account_an_empty_list() {
        let response = DecryptNotesResponse::new(Vec::new(), 0);
        let accounts_to_notes = response.map_to_accounts(&["primary", "secondary"]);

        assert_eq!(accounts_to_notes.len(), 2);
        assert!(accounts_to_notes.values().all(Vec::is_empty));
    }

    #[test]
    #[should_panic(expected = "cannot be split evenly")]
    fn map_to_accounts_rejects_uneven_splits() {
        let response = DecryptNotesResponse::new(vec![None; 5], 0);
        response.map_to_accounts(&["primary", "secondary"]);
    }

    #[test]
    #[should_panic(expected = "zero accounts")]
    fn map_to_accounts_rejects_notes_without_accounts() {
        let response = DecryptNotesResponse::new(vec![None; 5], 0);
        response.map_to_accounts(&[] as &[&str]);
    }
}
