//! Proptest generators for property-based testing.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use proptest::prelude::*;

use warden_core::{ByteRepr, IdentityDigest, Keypair, Record, RecordId, RecordRow, Role, Status};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate an email-like identity string.
pub fn identity() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._+-]{0,15}@[a-z][a-z0-9-]{0,10}\\.(com|org|io|net)".prop_map(String::from)
}

/// Generate a Role.
pub fn role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::Manager), Just(Role::User)]
}

/// Generate a Status.
pub fn status() -> impl Strategy<Value = Status> {
    prop_oneof![Just(Status::Active), Just(Status::Inactive)]
}

/// Generate a millisecond timestamp the decoder leaves unscaled.
pub fn timestamp_ms() -> impl Strategy<Value = i64> {
    100_000_000_000i64..=4_102_444_800_000i64
}

/// Generate a digest over an arbitrary identity.
pub fn digest() -> impl Strategy<Value = IdentityDigest> {
    any::<String>().prop_map(|s| IdentityDigest::hash(s.as_bytes()))
}

/// Every representation a producer might hold `bytes` in.
pub fn byte_reprs(bytes: &[u8]) -> Vec<ByteRepr> {
    vec![
        ByteRepr::Raw(Bytes::copy_from_slice(bytes)),
        ByteRepr::Array(bytes.to_vec()),
        ByteRepr::Text(hex::encode(bytes)),
        ByteRepr::Text(hex::encode_upper(bytes)),
        ByteRepr::Text(STANDARD.encode(bytes)),
    ]
}

/// Pick one representation of `bytes`.
pub fn byte_repr_of(bytes: Vec<u8>) -> impl Strategy<Value = ByteRepr> {
    let reprs = byte_reprs(&bytes);
    (0..reprs.len()).prop_map(move |i| reprs[i].clone())
}

/// Parameters for generating a record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub keypair: Keypair,
    pub id: i64,
    pub identity: String,
    pub role: Role,
    pub status: Status,
    pub created_at: i64,
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(), // seed
            1i64..=i64::MAX,
            identity(),
            role(),
            status(),
            timestamp_ms(),
        )
            .prop_map(|(seed, id, identity, role, status, created_at)| RecordParams {
                keypair: Keypair::from_seed(&seed),
                id,
                identity,
                role,
                status,
                created_at,
            })
            .boxed()
    }
}

/// Generate a signed record from parameters.
pub fn record_from_params(params: &RecordParams) -> Record {
    let digest = IdentityDigest::hash(params.identity.as_bytes());
    Record {
        id: RecordId(params.id),
        identity: params.identity.clone(),
        digest,
        role: params.role,
        status: params.status,
        created_at: params.created_at,
        signature: params.keypair.sign(digest.as_ref()),
    }
}

/// Generate a batch of signed records under one key, with distinct ids.
pub fn signed_batch(max_len: usize) -> impl Strategy<Value = (Keypair, Vec<Record>)> {
    (
        keypair(),
        prop::collection::vec((identity(), role(), status(), timestamp_ms()), 0..=max_len),
    )
        .prop_map(|(keypair, entries)| {
            let records = entries
                .into_iter()
                .enumerate()
                .map(|(i, (identity, role, status, created_at))| {
                    let digest = IdentityDigest::hash(identity.as_bytes());
                    Record {
                        id: RecordId(i as i64 + 1),
                        identity,
                        digest,
                        role,
                        status,
                        created_at,
                        signature: keypair.sign(digest.as_ref()),
                    }
                })
                .collect();
            (keypair, records)
        })
}

/// A producer row for `record` with binary fields in arbitrary representations.
pub fn row_from_record(record: Record) -> impl Strategy<Value = RecordRow> {
    let digest = record.digest.as_bytes().to_vec();
    let signature = record.signature.as_bytes().to_vec();
    (byte_repr_of(digest), byte_repr_of(signature)).prop_map(move |(digest, signature)| {
        RecordRow {
            digest,
            signature,
            ..RecordRow::from(&record)
        }
    })
}
