//! The bounded producer/consumer import pipeline (§4.2).
//!
//! Parser workers stream each discovered file into batches and hand them to
//! a bounded `crossbeam-channel` queue; one writer thread per primary
//! component type drains its queue and commits batches to the [`Store`],
//! performing the effective-time reconciliation described in
//! `snomed_store::record::should_replace`. The channel's bound is the
//! backpressure mechanism: a writer that falls behind simply fills its
//! queue and stalls its producers, rather than unbounded memory growth.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::bounded;
use snomed_store::{RefsetItem, Store};
use snomed_types::{Rf2Concept, Rf2Description, Rf2Relationship};

use crate::parser::Rf2Parser;
use crate::refset::parse_generic_refset_file;
use crate::types::{Rf2Config, Rf2Error, Rf2Files, Rf2Result};

/// How many already-parsed batches may queue up for a single writer before
/// its producers block. Small on purpose: the point is backpressure, not
/// throughput tuning.
const CHANNEL_DEPTH: usize = 4;

/// Summary of one [`import`] run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Number of RF2 files that were scheduled for parsing.
    pub files_processed: usize,
    /// Concept rows that changed the store's state.
    pub concepts_written: usize,
    /// Description rows that changed the store's state.
    pub descriptions_written: usize,
    /// Relationship rows that changed the store's state.
    pub relationships_written: usize,
    /// Refset item rows that changed the store's state.
    pub refset_items_written: usize,
}

/// One file queued for a parser worker, tagged with which writer channel
/// its batches belong on.
enum FileJob {
    Concepts(PathBuf),
    Descriptions(PathBuf),
    Relationships(PathBuf),
    SimpleRefsets(PathBuf),
    LanguageRefsets(PathBuf),
    AssociationRefsets(PathBuf),
    OwlExpressions(PathBuf),
    GenericRefsets(PathBuf),
}

fn collect_jobs(files: &Rf2Files) -> Vec<FileJob> {
    let mut jobs = Vec::new();
    if let Some(p) = &files.concept_file {
        jobs.push(FileJob::Concepts(p.clone()));
    }
    if let Some(p) = &files.description_file {
        jobs.push(FileJob::Descriptions(p.clone()));
    }
    if let Some(p) = &files.text_definition_file {
        jobs.push(FileJob::Descriptions(p.clone()));
    }
    if let Some(p) = &files.relationship_file {
        jobs.push(FileJob::Relationships(p.clone()));
    }
    if let Some(p) = &files.stated_relationship_file {
        jobs.push(FileJob::Relationships(p.clone()));
    }
    for p in &files.simple_refset_files {
        jobs.push(FileJob::SimpleRefsets(p.clone()));
    }
    for p in &files.language_refset_files {
        jobs.push(FileJob::LanguageRefsets(p.clone()));
    }
    for p in &files.association_refset_files {
        jobs.push(FileJob::AssociationRefsets(p.clone()));
    }
    for p in &files.owl_expression_files {
        jobs.push(FileJob::OwlExpressions(p.clone()));
    }
    for p in &files.generic_refset_files {
        jobs.push(FileJob::GenericRefsets(p.clone()));
    }
    jobs
}

/// Imports every file in `files` into `store`.
///
/// `config.batch_size` governs the writer batch size; `config.active_only`
/// is ignored here regardless of its value -- effective-time reconciliation
/// (§3, §4.2) requires seeing inactive rows too (an inactive row can be the
/// authoritative one, per the invariant that the greatest `effectiveTime`
/// wins), so every row is parsed and handed to the store, which performs
/// its own active/inactive tie-break.
pub fn import(store: &Store, files: &Rf2Files, config: &Rf2Config) -> Rf2Result<ImportReport> {
    import_cancellable(store, files, config, &Arc::new(AtomicBool::new(false)))
}

/// As [`import`], but checks `cancel` between batch boundaries (§5:
/// cooperative cancellation, in-flight batches always complete). On
/// cancellation, already-committed batches remain in the store, which the
/// caller should treat as dirty until a successful reimport and `index`.
pub fn import_cancellable(
    store: &Store,
    files: &Rf2Files,
    config: &Rf2Config,
    cancel: &Arc<AtomicBool>,
) -> Rf2Result<ImportReport> {
    let jobs = collect_jobs(files);
    let files_processed = jobs.len();
    let parse_config = Rf2Config {
        active_only: false,
        batch_size: config.batch_size,
    };

    let (concept_tx, concept_rx) = bounded::<Vec<Rf2Concept>>(CHANNEL_DEPTH);
    let (description_tx, description_rx) = bounded::<Vec<Rf2Description>>(CHANNEL_DEPTH);
    let (relationship_tx, relationship_rx) = bounded::<Vec<Rf2Relationship>>(CHANNEL_DEPTH);
    let (refset_tx, refset_rx) = bounded::<Vec<RefsetItem>>(CHANNEL_DEPTH);

    let first_error: Mutex<Option<Rf2Error>> = Mutex::new(None);
    let record_error = |e: Rf2Error| {
        let mut slot = first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(e);
        }
        cancel.store(true, Ordering::Relaxed);
    };

    let concepts_written = AtomicUsize::new(0);
    let descriptions_written = AtomicUsize::new(0);
    let relationships_written = AtomicUsize::new(0);
    let refset_items_written = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for batch in concept_rx.iter() {
                match store.put_concepts(&batch) {
                    Ok(n) => {
                        concepts_written.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => record_error(e.into()),
                }
            }
        });
        scope.spawn(|| {
            for batch in description_rx.iter() {
                match store.put_descriptions(&batch) {
                    Ok(n) => {
                        descriptions_written.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => record_error(e.into()),
                }
            }
        });
        scope.spawn(|| {
            for batch in relationship_rx.iter() {
                match store.put_relationships(&batch) {
                    Ok(n) => {
                        relationships_written.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => record_error(e.into()),
                }
            }
        });
        scope.spawn(|| {
            for batch in refset_rx.iter() {
                match store.put_refset_items(&batch) {
                    Ok(n) => {
                        refset_items_written.fetch_add(n, Ordering::Relaxed);
                    }
                    Err(e) => record_error(e.into()),
                }
            }
        });

        run_workers(
            jobs,
            &parse_config,
            cancel,
            &concept_tx,
            &description_tx,
            &relationship_tx,
            &refset_tx,
            &record_error,
        );

        drop(concept_tx);
        drop(description_tx);
        drop(relationship_tx);
        drop(refset_tx);
    });

    if let Some(e) = first_error.into_inner().unwrap() {
        return Err(e);
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(Rf2Error::Cancelled);
    }

    Ok(ImportReport {
        files_processed,
        concepts_written: concepts_written.load(Ordering::Relaxed),
        descriptions_written: descriptions_written.load(Ordering::Relaxed),
        relationships_written: relationships_written.load(Ordering::Relaxed),
        refset_items_written: refset_items_written.load(Ordering::Relaxed),
    })
}

type ConceptTx = crossbeam_channel::Sender<Vec<Rf2Concept>>;
type DescriptionTx = crossbeam_channel::Sender<Vec<Rf2Description>>;
type RelationshipTx = crossbeam_channel::Sender<Vec<Rf2Relationship>>;
type RefsetTx = crossbeam_channel::Sender<Vec<RefsetItem>>;

#[allow(clippy::too_many_arguments)]
fn run_workers(
    jobs: Vec<FileJob>,
    config: &Rf2Config,
    cancel: &Arc<AtomicBool>,
    concept_tx: &ConceptTx,
    description_tx: &DescriptionTx,
    relationship_tx: &RelationshipTx,
    refset_tx: &RefsetTx,
    record_error: &dyn Fn(Rf2Error),
) {
    let process = |job: FileJob| {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let result = process_job(job, config, cancel, concept_tx, description_tx, relationship_tx, refset_tx);
        if let Err(e) = result {
            record_error(e);
        }
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        jobs.into_par_iter().for_each(process);
    }
    #[cfg(not(feature = "parallel"))]
    {
        for job in jobs {
            process(job);
        }
    }
}

fn process_job(
    job: FileJob,
    config: &Rf2Config,
    cancel: &Arc<AtomicBool>,
    concept_tx: &ConceptTx,
    description_tx: &DescriptionTx,
    relationship_tx: &RelationshipTx,
    refset_tx: &RefsetTx,
) -> Rf2Result<()> {
    match job {
        FileJob::Concepts(path) => {
            let parser = Rf2Parser::<_, Rf2Concept>::from_path(&path, config.clone())?;
            send_batches(parser, cancel, concept_tx)
        }
        FileJob::Descriptions(path) => {
            let parser = Rf2Parser::<_, Rf2Description>::from_path(&path, config.clone())?;
            send_batches(parser, cancel, description_tx)
        }
        FileJob::Relationships(path) => {
            let parser = Rf2Parser::<_, Rf2Relationship>::from_path(&path, config.clone())?;
            send_batches(parser, cancel, relationship_tx)
        }
        FileJob::SimpleRefsets(path) => {
            let parser =
                Rf2Parser::<_, snomed_types::refset::Rf2SimpleRefsetMember>::from_path(&path, config.clone())?;
            send_batches_mapped(parser, cancel, refset_tx, RefsetItem::Simple)
        }
        FileJob::LanguageRefsets(path) => {
            let parser = Rf2Parser::<_, snomed_types::refset::Rf2LanguageRefsetMember>::from_path(
                &path,
                config.clone(),
            )?;
            send_batches_mapped(parser, cancel, refset_tx, RefsetItem::Language)
        }
        FileJob::AssociationRefsets(path) => {
            let parser = Rf2Parser::<_, snomed_types::refset::Rf2AssociationRefsetMember>::from_path(
                &path,
                config.clone(),
            )?;
            send_batches_mapped(parser, cancel, refset_tx, RefsetItem::Association)
        }
        FileJob::OwlExpressions(path) => {
            let parser =
                Rf2Parser::<_, snomed_types::Rf2OwlExpression>::from_path(&path, config.clone())?;
            send_batches_mapped(parser, cancel, refset_tx, RefsetItem::OwlExpression)
        }
        FileJob::GenericRefsets(path) => {
            let (_names, items) = parse_generic_refset_file(&path, config)?;
            for chunk in items.chunks(config.batch_size.max(1)) {
                if cancel.load(Ordering::Relaxed) {
                    return Err(Rf2Error::Cancelled);
                }
                let batch: Vec<RefsetItem> = chunk.iter().cloned().map(RefsetItem::Generic).collect();
                if refset_tx.send(batch).is_err() {
                    return Err(Rf2Error::Cancelled);
                }
            }
            Ok(())
        }
    }
}

/// Drives `parser` to completion, sending each batch on `tx` and checking
/// `cancel` before every send so an in-progress batch always finishes
/// before the pipeline stops.
fn send_batches<R: std::io::Read, T: crate::parser::Rf2Record>(
    parser: Rf2Parser<R, T>,
    cancel: &Arc<AtomicBool>,
    tx: &crossbeam_channel::Sender<Vec<T>>,
) -> Rf2Result<()> {
    parser.parse_batched(|batch| {
        if cancel.load(Ordering::Relaxed) {
            return Err(Rf2Error::Cancelled);
        }
        tx.send(batch).map_err(|_| Rf2Error::Cancelled)
    })?;
    Ok(())
}

/// As [`send_batches`], mapping each parsed record into the store's
/// `RefsetItem` variant before sending.
fn send_batches_mapped<R: std::io::Read, T: crate::parser::Rf2Record, F: Fn(T) -> RefsetItem>(
    parser: Rf2Parser<R, T>,
    cancel: &Arc<AtomicBool>,
    tx: &RefsetTx,
    wrap: F,
) -> Rf2Result<()> {
    parser.parse_batched(|batch| {
        if cancel.load(Ordering::Relaxed) {
            return Err(Rf2Error::Cancelled);
        }
        let mapped: Vec<RefsetItem> = batch.into_iter().map(&wrap).collect();
        tx.send(mapped).map_err(|_| Rf2Error::Cancelled)
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use snomed_store::StoreOptions;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_concepts(path: &std::path::Path, rows: &[(u64, &str, &str)]) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(f, "id\teffectiveTime\tactive\tmoduleId\tdefinitionStatusId").unwrap();
        for (id, effective_time, active) in rows {
            writeln!(
                f,
                "{id}\t{effective_time}\t{active}\t900000000000207008\t900000000000074008"
            )
            .unwrap();
        }
    }

    fn write_descriptions(path: &std::path::Path, rows: &[(u64, &str, &str, u64)]) {
        let mut f = std::fs::File::create(path).unwrap();
        writeln!(
            f,
            "id\teffectiveTime\tactive\tmoduleId\tconceptId\tlanguageCode\ttypeId\tterm\tcaseSignificanceId"
        )
        .unwrap();
        for (id, effective_time, active, concept_id) in rows {
            writeln!(
                f,
                "{id}\t{effective_time}\t{active}\t900000000000207008\t{concept_id}\ten\t900000000000013009\tterm {id}\t900000000000448009"
            )
            .unwrap();
        }
    }

    #[test]
    fn test_import_reconciles_effective_time_across_batches() {
        let tmp = tempdir().unwrap();
        let concept_path = tmp.path().join("sct2_Concept_Snapshot_INT_20251201.txt");
        write_concepts(
            &concept_path,
            &[(100, "20200101", "1"), (100, "20210101", "0")],
        );
        let description_path = tmp.path().join("sct2_Description_Snapshot_INT_20251201.txt");
        write_descriptions(&description_path, &[(1, "20200101", "1", 100)]);

        let mut files = Rf2Files::new();
        files.concept_file = Some(concept_path);
        files.description_file = Some(description_path);

        let store_dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(store_dir.path())).unwrap();

        let report = import(&store, &files, &Rf2Config::default()).unwrap();
        assert_eq!(report.concepts_written, 1);
        assert_eq!(report.descriptions_written, 1);

        let concept = store.get_concept(100).unwrap().unwrap();
        assert_eq!(concept.effective_time, 20210101);
        assert!(!concept.active);
    }

    #[test]
    fn test_reimport_same_files_is_idempotent() {
        let tmp = tempdir().unwrap();
        let concept_path = tmp.path().join("sct2_Concept_Snapshot_INT_20251201.txt");
        write_concepts(&concept_path, &[(100, "20200101", "1")]);

        let mut files = Rf2Files::new();
        files.concept_file = Some(concept_path);

        let store_dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(store_dir.path())).unwrap();

        let first = import(&store, &files, &Rf2Config::default()).unwrap();
        let second = import(&store, &files, &Rf2Config::default()).unwrap();
        assert_eq!(first.concepts_written, 1);
        assert_eq!(second.concepts_written, 0);
    }

    #[test]
    fn test_import_empty_files_yields_empty_report() {
        let files = Rf2Files::new();
        let store_dir = tempdir().unwrap();
        let store = Store::open(StoreOptions::new(store_dir.path())).unwrap();

        let report = import(&store, &files, &Rf2Config::default()).unwrap();
        assert_eq!(report.files_processed, 0);
        assert_eq!(report.concepts_written, 0);
    }
}
