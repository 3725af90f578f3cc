//! Integration tests for the concrete scenarios seeded by spec.md §8
//! (S1-S8). Unit tests inside each module already cover much of the same
//! ground in isolation; these exercise the same behaviour end to end,
//! wiring a registry, a pool, a context, and (where relevant) the undo
//! manager together the way a real caller would.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use filecore::node::DirectoryNode;
use filecore::operations::compress::{compress, ArchiveFormat};
use filecore::operations::extract::extract;
use filecore::operations::link::{link_into, unlink};
use filecore::operations::progress::ProgressInfo;
use filecore::search::{Query, SearchEngine, SearchProvider};
use filecore::search::filesystem::FilesystemProvider;
use filecore::task::runner::{Context, PoolRunner};
use filecore::task::Cancellable;
use filecore::undo::{UndoApplier, UndoManager, UndoRecord};
use filecore::{ChangeBus, FileRegistry, Location};

fn harness(name: &str) -> (Arc<FileRegistry>, Arc<PoolRunner>, Context) {
    (FileRegistry::new(), PoolRunner::named(name, 4), Context::named(name))
}

fn recv<T>(rx: std::sync::mpsc::Receiver<T>) -> T {
    rx.recv_timeout(Duration::from_secs(5)).expect("task did not complete in time")
}

/// S1: Identity. `get_or_create` on the same location twice returns the
/// same handle; a different location returns a distinct one.
#[test]
fn s1_identity() {
    let dir = tempfile::tempdir().unwrap();
    let a_path = dir.path().join("a");
    let b_path = dir.path().join("b");
    std::fs::write(&a_path, b"a").unwrap();
    std::fs::write(&b_path, b"b").unwrap();

    let registry = FileRegistry::new();
    let first = registry.get_or_create(Location::from_path(&a_path), false);
    let second = registry.get_or_create(Location::from_path(&a_path), false);
    assert!(first.is_same_node(&second));

    let other = registry.get_or_create(Location::from_path(&b_path), false);
    assert!(!first.is_same_node(&other));
}

/// S2: Query info. Display name, content type, and size resolve correctly.
#[test]
fn s2_query_info() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.txt");
    std::fs::write(&path, b"hello world").unwrap();

    let (registry, pool, ctx) = harness("s2");
    let node = registry.get_or_create(Location::from_path(&path), false);
    let (tx, rx) = std::sync::mpsc::channel();
    node.query_info(&pool, &ctx, move |result| tx.send(result).unwrap());
    let info = recv(rx).unwrap();
    assert_eq!(info.display_name, "hello.txt");
    assert!(info.content_type.starts_with("text/"));
    assert_eq!(info.size, 11);
}

/// S3: Enumerate children. Two children come back, and both have a Valid
/// Info slot without a second round-trip.
#[test]
fn s3_enumerate_children() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("child_1"), b"a").unwrap();
    std::fs::write(dir.path().join("child_2"), b"bb").unwrap();

    let (registry, pool, ctx) = harness("s3");
    let node = registry.get_or_create(Location::from_path(dir.path()), true);
    let dir_node = DirectoryNode::new(node);
    let (tx, rx) = std::sync::mpsc::channel();
    dir_node.enumerate_children(&pool, &ctx, move |result| tx.send(result).unwrap());
    let mut children = recv(rx).unwrap();
    children.sort_by_key(|c| c.location().basename());

    assert_eq!(children.len(), 2);
    assert_eq!(children[0].location(), Location::from_path(dir.path().join("child_1")));
    assert_eq!(children[1].location(), Location::from_path(dir.path().join("child_2")));

    // Each child's Info slot was already populated by the enumeration, so a
    // fresh query_info resolves without re-reading the filesystem — probed
    // here by renaming the backing file away and confirming the cached
    // info is still served correctly.
    for child in &children {
        let expected_name = child.location().basename();
        std::fs::remove_file(child.location().path()).unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        child.query_info(&pool, &ctx, move |result| tx.send(result).unwrap());
        let info = recv(rx).unwrap();
        assert_eq!(info.display_name, expected_name);
    }
}

/// S4: Rename. `children-changed` fires on the parent, the handle's
/// location moves, and the old key disappears from the registry.
#[test]
fn s4_rename() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("d")).unwrap();
    let child_path = dir.path().join("d/child_1");
    std::fs::write(&child_path, b"x").unwrap();

    let (registry, pool, ctx) = harness("s4");
    let bus = ChangeBus::new(registry.clone());
    let node = registry.get_or_create(Location::from_path(&child_path), false);
    let parent = node.get_parent().unwrap();

    let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let flag = fired.clone();
    parent.on_children_changed(move || flag.store(true, std::sync::atomic::Ordering::SeqCst));

    let (tx, rx) = std::sync::mpsc::channel();
    node.rename(&pool, &ctx, bus, "renamed".to_string(), move |r| tx.send(r).unwrap());
    let new_location = recv(rx).unwrap();

    assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    assert_eq!(new_location, Location::from_path(dir.path().join("d/renamed")));
    assert!(registry.lookup(&Location::from_path(&child_path)).is_none());
}

/// Undoes/redoes a [`link_into`] call. The source is fixed at construction
/// time rather than parsed back out of the link's (possibly-uniquified)
/// name, since "Link to X (2)" does not losslessly decompose into "X".
struct LinkApplier {
    source: PathBuf,
    dest_dir: PathBuf,
}

impl UndoApplier for LinkApplier {
    fn undo(&self, record: &UndoRecord) -> filecore::Result<UndoRecord> {
        match record {
            UndoRecord::Link { created } => {
                unlink(created.path())?;
                Ok(UndoRecord::Link { created: created.clone() })
            }
            _ => unreachable!(),
        }
    }

    fn redo(&self, _record: &UndoRecord) -> filecore::Result<UndoRecord> {
        let dest = link_into(&self.source, &self.dest_dir)?;
        Ok(UndoRecord::Link { created: Location::from_path(dest) })
    }
}

/// S5: Link. Two links get uniquified names; undoing twice removes both,
/// redoing twice restores both.
#[test]
fn s5_link_undo_redo() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("file_1");
    std::fs::write(&source, b"x").unwrap();

    let manager = UndoManager::new();
    let applier = LinkApplier { source: source.clone(), dest_dir: dir.path().to_path_buf() };

    let first = link_into(&source, dir.path()).unwrap();
    manager.record(UndoRecord::Link { created: Location::from_path(&first) });
    let second = link_into(&source, dir.path()).unwrap();
    manager.record(UndoRecord::Link { created: Location::from_path(&second) });

    assert_eq!(first.file_name().unwrap(), "Link to file_1");
    assert_eq!(second.file_name().unwrap(), "Link to file_1 (2)");

    manager.undo(&applier).unwrap().unwrap();
    manager.undo(&applier).unwrap().unwrap();
    assert!(!first.exists() && !second.exists());

    manager.redo(&applier).unwrap().unwrap();
    manager.redo(&applier).unwrap().unwrap();
    assert!(first.exists() && second.exists());
}

struct ArchiveApplier {
    archive: PathBuf,
    dest_dir: PathBuf,
}

impl UndoApplier for ArchiveApplier {
    fn undo(&self, record: &UndoRecord) -> filecore::Result<UndoRecord> {
        match record {
            UndoRecord::Extract { created } => {
                for location in created {
                    remove_path(location.path());
                }
                Ok(UndoRecord::Compress { archive: Location::from_path(&self.archive) })
            }
            _ => unreachable!(),
        }
    }

    fn redo(&self, _record: &UndoRecord) -> filecore::Result<UndoRecord> {
        let cancellable = Cancellable::new();
        let progress = ProgressInfo::new(cancellable.clone());
        let outcome = extract(&self.archive, &self.dest_dir, &cancellable, &progress)?;
        Ok(UndoRecord::Extract { created: outcome.created.into_iter().map(Location::from_path).collect() })
    }
}

fn remove_path(path: &Path) {
    if path.is_dir() {
        let _ = std::fs::remove_dir_all(path);
    } else {
        let _ = std::fs::remove_file(path);
    }
}

/// S6: Compress + Extract round-trip, including undo/redo of the extract.
#[test]
fn s6_compress_extract_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir(tmp.path().join("src")).unwrap();
    std::fs::write(tmp.path().join("src/file.txt"), b"0123456789012345").unwrap();

    let archive = tmp.path().join("out.zip");
    let cancellable = Cancellable::new();
    let progress = ProgressInfo::new(cancellable.clone());
    compress(&[tmp.path().join("src")], &archive, ArchiveFormat::Zip, None, &cancellable, &progress).unwrap();

    std::fs::remove_dir_all(tmp.path().join("src")).unwrap();

    let outcome = extract(&archive, tmp.path(), &cancellable, &progress).unwrap();
    assert!(tmp.path().join("src").exists());
    assert_eq!(std::fs::read(tmp.path().join("src/file.txt")).unwrap(), b"0123456789012345");

    let manager = UndoManager::new();
    let applier = ArchiveApplier { archive: archive.clone(), dest_dir: tmp.path().to_path_buf() };
    manager.record(UndoRecord::Extract { created: outcome.created.into_iter().map(Location::from_path).collect() });

    manager.undo(&applier).unwrap().unwrap();
    assert!(!tmp.path().join("src").exists());

    manager.redo(&applier).unwrap().unwrap();
    assert!(tmp.path().join("src").exists());
    assert_eq!(std::fs::read(tmp.path().join("src/file.txt")).unwrap(), b"0123456789012345");
}

/// S7: Compress with passphrase. The archive is a valid zip, but opening
/// an entry without the passphrase fails.
#[test]
fn s7_compress_with_passphrase() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("secret.txt"), b"top secret payload").unwrap();

    let archive = tmp.path().join("out.zip");
    let cancellable = Cancellable::new();
    let progress = ProgressInfo::new(cancellable.clone());
    compress(
        &[tmp.path().join("secret.txt")],
        &archive,
        ArchiveFormat::Zip,
        Some("correct horse battery staple"),
        &cancellable,
        &progress,
    )
    .unwrap();

    let file = std::fs::File::open(&archive).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    assert!(zip.by_index(0).is_err(), "reading an AES-encrypted entry without a password should fail");
}

/// S8: Search aggregation. Exactly three distinct URIs are emitted across
/// the lifetime of the run, even though the filesystem and model providers
/// could in principle see overlapping entries.
#[test]
fn s8_search_aggregation() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("engine_all_engines_1"), b"").unwrap();
    std::fs::write(tmp.path().join("engine_all_engines_2"), b"").unwrap();
    std::fs::create_dir(tmp.path().join("engine_all_engines_dir")).unwrap();
    std::fs::write(tmp.path().join("unrelated"), b"").unwrap();

    let providers: Vec<Arc<dyn SearchProvider>> = vec![Arc::new(FilesystemProvider), Arc::new(FilesystemProvider)];
    let engine = SearchEngine::new(providers);
    let pool = PoolRunner::named("s8", 4);
    let context = Context::named("s8");

    let query = Query::new("engine_all_engines").with_root(tmp.path().to_path_buf()).recursive(true);
    let collected = Arc::new(std::sync::Mutex::new(Vec::new()));
    let c = collected.clone();
    let (tx, rx) = std::sync::mpsc::channel();
    engine.start(
        query,
        &pool,
        &context,
        move |hits| c.lock().unwrap().extend(hits.into_iter().map(|h| h.uri)),
        move |_status| tx.send(()).unwrap(),
    );
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let mut uris = collected.lock().unwrap().clone();
    uris.sort();
    uris.dedup();
    assert_eq!(collected.lock().unwrap().len(), 3, "no duplicate URIs across providers within one run");
    assert_eq!(uris.len(), 3);
}
