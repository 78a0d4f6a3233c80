//! Golden test vectors for deterministic verification.
//!
//! Each vector fixes a key seed and a record set, and pins the digests,
//! signatures and encoded batch bytes they must produce. Ed25519 signing and
//! the batch encoding are both deterministic, so any drift is a wire break.

use serde::{Deserialize, Serialize};

use warden_core::{
    encode_records, IdentityDigest, Keypair, Record, RecordId, RecordSignature, Role, Status,
};

const VECTORS_JSON: &str = include_str!("../vectors/records.json");

/// A golden test vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: String,
    /// Seed for deterministic key generation (32 bytes hex).
    pub seed: String,
    /// Expected verification key (32 bytes hex).
    pub public_key: String,
    pub records: Vec<GoldenRecord>,
    /// Expected encoded batch (hex).
    pub batch: String,
}

/// One record of a golden vector, with its expected attestation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenRecord {
    pub id: i64,
    pub identity: String,
    pub role: Role,
    pub status: Status,
    pub created_at: i64,
    /// Expected SHA-384 digest (48 bytes hex).
    pub digest: String,
    /// Expected signature (64 bytes hex).
    pub signature: String,
}

/// Get all golden test vectors.
pub fn all_vectors() -> serde_json::Result<Vec<GoldenVector>> {
    serde_json::from_str(VECTORS_JSON)
}

/// The vector's seed as bytes.
pub fn seed_of(vector: &GoldenVector) -> Result<[u8; 32], String> {
    let bytes = hex::decode(&vector.seed).map_err(|e| format!("bad seed hex: {}", e))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("seed is {} bytes, want 32", b.len()))
}

/// Recompute the vector's records from its seed and inputs.
pub fn records_from_vector(vector: &GoldenVector) -> Result<Vec<Record>, String> {
    let keypair = Keypair::from_seed(&seed_of(vector)?);
    Ok(vector
        .records
        .iter()
        .map(|r| {
            let digest = IdentityDigest::hash(r.identity.as_bytes());
            Record {
                id: RecordId(r.id),
                identity: r.identity.clone(),
                digest,
                role: r.role,
                status: r.status,
                created_at: r.created_at,
                signature: keypair.sign(digest.as_ref()),
            }
        })
        .collect())
}

/// The vector's records exactly as pinned, without recomputing anything.
pub fn expected_records(vector: &GoldenVector) -> Result<Vec<Record>, String> {
    vector
        .records
        .iter()
        .map(|r| {
            let digest = IdentityDigest::from_hex(&r.digest)
                .map_err(|e| format!("record {}: bad digest hex: {}", r.id, e))?;
            let signature = hex::decode(&r.signature)
                .map_err(|e| format!("record {}: bad signature hex: {}", r.id, e))?;
            Ok(Record {
                id: RecordId(r.id),
                identity: r.identity.clone(),
                digest,
                role: r.role,
                status: r.status,
                created_at: r.created_at,
                signature: RecordSignature::from(signature),
            })
        })
        .collect()
}

fn check_vector(vector: &GoldenVector) -> Result<(), String> {
    let keypair = Keypair::from_seed(&seed_of(vector)?);
    let public_key = keypair.verification_key().to_hex();
    if public_key != vector.public_key {
        return Err(format!("public key {} != {}", public_key, vector.public_key));
    }

    let computed = records_from_vector(vector)?;
    let expected = expected_records(vector)?;
    for (c, e) in computed.iter().zip(&expected) {
        if c.digest != e.digest {
            return Err(format!("record {}: digest {} != {}", c.id, c.digest.to_hex(), e.digest.to_hex()));
        }
        if c.signature != e.signature {
            return Err(format!(
                "record {}: signature {} != {}",
                c.id,
                c.signature.to_hex(),
                e.signature.to_hex()
            ));
        }
    }

    let batch = hex::encode(encode_records(&computed));
    if batch != vector.batch {
        return Err(format!("batch {} != {}", batch, vector.batch));
    }

    Ok(())
}

/// Check every vector. Returns `(name, passed, detail)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    match all_vectors() {
        Ok(vectors) => vectors
            .iter()
            .map(|v| match check_vector(v) {
                Ok(()) => (v.name.clone(), true, "ok".to_string()),
                Err(detail) => (v.name.clone(), false, detail),
            })
            .collect(),
        Err(e) => vec![("parse".to_string(), false, e.to_string())],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{decode_batch, import_verification_key, verify_record};

    #[test]
    fn test_all_vectors_pass() {
        let results = verify_all_vectors();
        assert!(!results.is_empty());
        for (name, ok, detail) in results {
            assert!(ok, "{}: {}", name, detail);
        }
    }

    #[test]
    fn test_pinned_batches_decode_and_verify() {
        for vector in all_vectors().unwrap() {
            let bytes = hex::decode(&vector.batch).unwrap();
            let decoded = decode_batch(&bytes).unwrap();
            assert_eq!(decoded, expected_records(&vector).unwrap(), "{}", vector.name);

            let keypair = Keypair::from_seed(&seed_of(&vector).unwrap());
            let key = import_verification_key(&keypair.verification_key().to_pem().unwrap()).unwrap();
            assert!(decoded.iter().all(|r| verify_record(r, &key)), "{}", vector.name);
        }
    }

    #[test]
    fn test_empty_vector_bytes() {
        let vectors = all_vectors().unwrap();
        let empty = vectors.iter().find(|v| v.records.is_empty()).unwrap();
        assert_eq!(empty.batch, "a200010180");
    }

    #[test]
    fn test_vectors_json_roundtrip() {
        let vectors = all_vectors().unwrap();
        let json = serde_json::to_string(&vectors).unwrap();
        let reparsed: Vec<GoldenVector> = serde_json::from_str(&json).unwrap();
        assert_eq!(reparsed.len(), vectors.len());
    }
}
