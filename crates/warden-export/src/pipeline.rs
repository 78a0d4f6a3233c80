//! Export pipeline state machine.
//!
//! One run fetches the public key, fetches the encoded batch, decodes it and
//! verifies every record, returning only the records that verify:
//!
//! ```text
//! Idle -> KeyFetchInFlight -> ExportFetchInFlight -> Decoding -> Verifying
//!      -> Settled(Verified | Failed)
//! ```
//!
//! Transitions are strictly sequential and a run never retries. Any error
//! moves straight to `Settled(Failed)` and no records are returned.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use warden_core::{
    decode_entries, import_verification_key, malformed_verdict, verdict, BatchEntry, Record,
    RecordId, VerificationFailure, VerificationKey, Verdict,
};

use crate::error::{ExportError, Result};
use crate::source::ExportSource;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Every step completed; the report holds the verified subset.
    Verified,
    /// A step failed or the run was cancelled.
    Failed,
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    KeyFetchInFlight,
    ExportFetchInFlight,
    Decoding,
    Verifying,
    Settled(Settlement),
}

/// Configuration for export runs.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Include a per-record verdict in the report.
    pub per_record_detail: bool,
    /// Maximum verifications in flight at once. Zero is treated as one.
    pub max_concurrency: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            per_record_detail: false,
            max_concurrency: 64,
        }
    }
}

/// Verdict for one batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Position in the decoded batch.
    pub index: usize,
    /// `None` for a malformed entry whose id could not be read.
    pub id: Option<RecordId>,
    pub verdict: Verdict,
}

/// Result of a settled run.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Records whose signature verified, in decoded order.
    pub verified: Vec<Record>,
    /// Number of entries in the batch, malformed ones included.
    pub total: usize,
    /// Number of records rejected.
    pub rejected: usize,
    /// Per-record verdicts, when requested.
    pub outcomes: Option<Vec<RecordOutcome>>,
}

/// Fetch, decode and verify one export.
pub struct ExportPipeline<T: ExportSource> {
    source: T,
    config: ExportConfig,
    state: ExportState,
    history: Vec<ExportState>,
}

impl<T: ExportSource> ExportPipeline<T> {
    /// Create a new pipeline with default configuration.
    pub fn new(source: T) -> Self {
        Self::with_config(source, ExportConfig::default())
    }

    /// Create a new pipeline with custom configuration.
    pub fn with_config(source: T, config: ExportConfig) -> Self {
        Self {
            source,
            config,
            state: ExportState::Idle,
            history: vec![ExportState::Idle],
        }
    }

    /// The current state.
    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Every state this pipeline has been in, oldest first.
    pub fn history(&self) -> &[ExportState] {
        &self.history
    }

    /// Run the pipeline to settlement.
    ///
    /// A pipeline runs once. Calling this on a pipeline that has left `Idle`
    /// fails with [`ExportError::Internal`].
    pub async fn run(&mut self) -> Result<ExportReport> {
        if self.state != ExportState::Idle {
            return Err(ExportError::Internal(format!(
                "export pipeline already ran (state {:?})",
                self.state
            )));
        }

        match self.execute().await {
            Ok(report) => {
                self.transition(ExportState::Settled(Settlement::Verified));
                tracing::info!(
                    total = report.total,
                    verified = report.verified.len(),
                    rejected = report.rejected,
                    "export settled"
                );
                Ok(report)
            }
            Err(e) => {
                self.transition(ExportState::Settled(Settlement::Failed));
                tracing::warn!(error = %e, "export failed");
                Err(e)
            }
        }
    }

    /// Run the pipeline, giving up if `cancel` completes first.
    ///
    /// On cancellation the run settles as failed and no records are returned.
    pub async fn run_until<C>(&mut self, cancel: C) -> Result<ExportReport>
    where
        C: Future<Output = ()>,
    {
        let outcome = tokio::select! {
            biased;
            _ = cancel => None,
            result = self.run() => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                if !matches!(self.state, ExportState::Settled(_)) {
                    self.transition(ExportState::Settled(Settlement::Failed));
                }
                tracing::debug!("export cancelled");
                Err(ExportError::Cancelled)
            }
        }
    }

    async fn execute(&mut self) -> Result<ExportReport> {
        self.transition(ExportState::KeyFetchInFlight);
        let key_blob = self.source.fetch_public_key().await?;
        let key = Arc::new(import_verification_key(&key_blob)?);

        self.transition(ExportState::ExportFetchInFlight);
        let bytes = self.source.fetch_export().await?;
        tracing::debug!(len = bytes.len(), "fetched export");

        self.transition(ExportState::Decoding);
        let entries = decode_entries(&bytes)?;

        self.transition(ExportState::Verifying);
        let verdicts = verify_all(&entries, key, self.config.max_concurrency).await;

        Ok(self.settle(entries, verdicts))
    }

    /// Filter decoded entries by verdict, keeping decoded order.
    fn settle(&self, entries: Vec<BatchEntry>, verdicts: Vec<Verdict>) -> ExportReport {
        let total = entries.len();
        let mut verified = Vec::with_capacity(total);
        let mut outcomes = self.config.per_record_detail.then(|| Vec::with_capacity(total));
        let mut rejected = 0;

        for (index, (entry, verdict)) in entries.into_iter().zip(verdicts).enumerate() {
            let id = match &entry {
                BatchEntry::Record(record) => Some(record.id),
                BatchEntry::Malformed(bad) => bad.id,
            };
            if let Some(outcomes) = outcomes.as_mut() {
                outcomes.push(RecordOutcome { index, id, verdict });
            }

            match (entry, verdict) {
                (BatchEntry::Record(record), Verdict::Verified) => verified.push(record),
                (_, verdict) => {
                    rejected += 1;
                    tracing::warn!(?id, index, ?verdict, "record failed verification");
                }
            }
        }

        ExportReport {
            verified,
            total,
            rejected,
            outcomes,
        }
    }

    fn transition(&mut self, next: ExportState) {
        tracing::debug!(from = ?self.state, to = ?next, "export state");
        self.state = next;
        self.history.push(next);
    }
}

/// Verify every record on the blocking pool, at most `limit` at a time.
///
/// Malformed entries are rejected without a task. Settles all tasks before
/// returning. A task that never reports back leaves its record rejected as
/// [`VerificationFailure::Aborted`].
async fn verify_all(
    entries: &[BatchEntry],
    key: Arc<VerificationKey>,
    limit: usize,
) -> Vec<Verdict> {
    let limit = limit.max(1);
    let mut verdicts = vec![Verdict::Rejected(VerificationFailure::Aborted); entries.len()];
    let mut tasks = JoinSet::new();

    for (index, entry) in entries.iter().enumerate() {
        let record = match entry {
            BatchEntry::Record(record) => record,
            BatchEntry::Malformed(bad) => {
                verdicts[index] = malformed_verdict(bad);
                continue;
            }
        };

        if tasks.len() >= limit {
            collect_one(&mut tasks, &mut verdicts).await;
        }

        let record = record.clone();
        let key = Arc::clone(&key);
        tasks.spawn_blocking(move || (index, verdict(&record, &key)));
    }

    while !tasks.is_empty() {
        collect_one(&mut tasks, &mut verdicts).await;
    }

    verdicts
}

async fn collect_one(tasks: &mut JoinSet<(usize, Verdict)>, verdicts: &mut [Verdict]) {
    match tasks.join_next().await {
        Some(Ok((index, verdict))) => verdicts[index] = verdict,
        Some(Err(e)) => tracing::warn!(error = %e, "verification task failed"),
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use async_trait::async_trait;
    use bytes::Bytes;
    use warden_core::{encode_records, IdentityDigest, Keypair, RecordSignature, Role, Status};

    fn signed(keypair: &Keypair, id: i64, identity: &str) -> Record {
        let digest = IdentityDigest::hash(identity.as_bytes());
        Record {
            id: RecordId(id),
            identity: identity.to_string(),
            digest,
            role: Role::User,
            status: Status::Active,
            created_at: 1_736_870_400_000 + id,
            signature: keypair.sign(digest.as_ref()),
        }
    }

    fn batch(keypair: &Keypair, n: i64) -> Vec<Record> {
        (1..=n)
            .map(|i| signed(keypair, i, &format!("user{}@example.com", i)))
            .collect()
    }

    fn source_for(keypair: &Keypair, records: &[Record]) -> MemorySource {
        MemorySource::new(
            keypair.verification_key().to_pem().unwrap(),
            encode_records(records),
        )
    }

    #[tokio::test]
    async fn test_all_records_verify() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let records = batch(&keypair, 5);
        let mut pipeline = ExportPipeline::new(source_for(&keypair, &records));

        let report = pipeline.run().await.unwrap();
        assert_eq!(report.verified, records);
        assert_eq!(report.total, 5);
        assert_eq!(report.rejected, 0);
        assert!(report.outcomes.is_none());
        assert_eq!(
            pipeline.history(),
            &[
                ExportState::Idle,
                ExportState::KeyFetchInFlight,
                ExportState::ExportFetchInFlight,
                ExportState::Decoding,
                ExportState::Verifying,
                ExportState::Settled(Settlement::Verified),
            ]
        );
    }

    #[tokio::test]
    async fn test_one_flipped_signature_is_dropped() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let mut records = batch(&keypair, 4);
        let mut sig = records[2].signature.as_bytes().to_vec();
        sig[0] ^= 0xff;
        records[2].signature = RecordSignature::from(sig);

        let config = ExportConfig {
            per_record_detail: true,
            max_concurrency: 2,
        };
        let mut pipeline = ExportPipeline::with_config(source_for(&keypair, &records), config);
        let report = pipeline.run().await.unwrap();

        let ids: Vec<i64> = report.verified.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 4]);
        assert_eq!(report.rejected, 1);

        let outcomes = report.outcomes.unwrap();
        assert_eq!(outcomes.len(), 4);
        assert_eq!(
            outcomes[2].verdict,
            Verdict::Rejected(VerificationFailure::Mismatch)
        );
        assert!(outcomes.iter().enumerate().all(|(i, o)| o.index == i));
    }

    #[tokio::test]
    async fn test_wrong_key_rejects_everything() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let other = Keypair::from_seed(&[0x22; 32]);
        let records = batch(&keypair, 3);
        let source = source_for(&keypair, &records)
            .with_public_key(other.verification_key().to_pem().unwrap());

        let report = ExportPipeline::new(source).run().await.unwrap();
        assert!(report.verified.is_empty());
        assert_eq!(report.rejected, 3);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let report = ExportPipeline::new(source_for(&keypair, &[]))
            .run()
            .await
            .unwrap();
        assert!(report.verified.is_empty());
        assert_eq!(report.total, 0);
    }

    #[tokio::test]
    async fn test_corrupt_batch_fails_whole_run() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let mut bytes = encode_records(&batch(&keypair, 3));
        bytes.truncate(bytes.len() / 2);
        let source = source_for(&keypair, &[]).with_export(bytes);

        let mut pipeline = ExportPipeline::new(source);
        let result = pipeline.run().await;
        assert!(matches!(
            result,
            Err(ExportError::Core(warden_core::CoreError::Decode(_)))
        ));
        assert_eq!(pipeline.state(), ExportState::Settled(Settlement::Failed));
        assert_eq!(pipeline.history()[pipeline.history().len() - 2], ExportState::Decoding);
    }

    #[tokio::test]
    async fn test_bad_key_fails_before_export_fetch() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let source = source_for(&keypair, &batch(&keypair, 1)).with_public_key("not a key");

        let mut pipeline = ExportPipeline::new(source);
        assert!(matches!(
            pipeline.run().await,
            Err(ExportError::Core(warden_core::CoreError::InvalidKeyMaterial(_)))
        ));
        assert!(!pipeline.history().contains(&ExportState::ExportFetchInFlight));
    }

    #[tokio::test]
    async fn test_runs_once() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let mut pipeline = ExportPipeline::new(source_for(&keypair, &batch(&keypair, 1)));
        pipeline.run().await.unwrap();
        assert!(matches!(pipeline.run().await, Err(ExportError::Internal(_))));
    }

    /// Serves the key, then never finishes the export fetch. Signals once the
    /// export fetch has started.
    struct StalledSource {
        key: String,
        fetching: std::sync::Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl ExportSource for StalledSource {
        async fn fetch_public_key(&self) -> Result<String> {
            Ok(self.key.clone())
        }

        async fn fetch_export(&self) -> Result<Bytes> {
            let started = self.fetching.lock().unwrap().take();
            if let Some(tx) = started {
                let _ = tx.send(());
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancel_while_fetching() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let source = StalledSource {
            key: keypair.verification_key().to_pem().unwrap(),
            fetching: std::sync::Mutex::new(Some(tx)),
        };
        let mut pipeline = ExportPipeline::new(source);

        // Cancel only once the run is parked inside the export fetch.
        let cancel = async move {
            let _ = rx.await;
        };

        let result = pipeline.run_until(cancel).await;
        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert!(pipeline.history().contains(&ExportState::ExportFetchInFlight));
        assert!(!pipeline.history().contains(&ExportState::Decoding));
        assert_eq!(pipeline.state(), ExportState::Settled(Settlement::Failed));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let mut pipeline = ExportPipeline::new(source_for(&keypair, &batch(&keypair, 2)));

        let result = pipeline.run_until(std::future::ready(())).await;
        assert!(matches!(result, Err(ExportError::Cancelled)));
        assert_eq!(
            pipeline.history(),
            &[ExportState::Idle, ExportState::Settled(Settlement::Failed)]
        );
    }

    fn cbor_record(record: &Record, digest: Vec<u8>) -> ciborium::Value {
        use ciborium::Value;
        Value::Map(vec![
            (Value::Integer(0.into()), Value::Integer(record.id.0.into())),
            (Value::Integer(1.into()), Value::Text(record.identity.clone())),
            (Value::Integer(2.into()), Value::Bytes(digest)),
            (Value::Integer(3.into()), Value::Integer(2.into())),
            (Value::Integer(4.into()), Value::Integer(0.into())),
            (Value::Integer(5.into()), Value::Integer(record.created_at.into())),
            (
                Value::Integer(6.into()),
                Value::Bytes(record.signature.as_bytes().to_vec()),
            ),
        ])
    }

    #[tokio::test]
    async fn test_empty_digest_drops_only_that_record() {
        use ciborium::Value;

        let keypair = Keypair::from_seed(&[0x21; 32]);
        let records = batch(&keypair, 2);
        let value = Value::Map(vec![
            (Value::Integer(0.into()), Value::Integer(1.into())),
            (
                Value::Integer(1.into()),
                Value::Array(vec![
                    cbor_record(&records[0], records[0].digest.as_ref().to_vec()),
                    cbor_record(&records[1], Vec::new()),
                ]),
            ),
        ]);
        let mut bytes = Vec::new();
        ciborium::into_writer(&value, &mut bytes).unwrap();

        let config = ExportConfig {
            per_record_detail: true,
            ..Default::default()
        };
        let source = source_for(&keypair, &[]).with_export(bytes);
        let mut pipeline = ExportPipeline::with_config(source, config);
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.verified, vec![records[0].clone()]);
        assert_eq!(report.total, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(pipeline.state(), ExportState::Settled(Settlement::Verified));

        let outcomes = report.outcomes.unwrap();
        assert_eq!(outcomes[1].id, Some(RecordId(2)));
        assert_eq!(
            outcomes[1].verdict,
            Verdict::Rejected(VerificationFailure::EmptyDigest)
        );
    }

    #[tokio::test]
    async fn test_uncancelled_run_completes() {
        let keypair = Keypair::from_seed(&[0x21; 32]);
        let mut pipeline = ExportPipeline::new(source_for(&keypair, &batch(&keypair, 2)));
        let report = pipeline
            .run_until(std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(report.verified.len(), 2);
    }
}
