//! End-to-end scenarios (spec.md §8).

use std::io::Cursor;

use chrono::{Duration, Utc};
use sunburst::{
    runtime::{PeerFactory, RuntimeContext, StaticServiceLoader},
    Blob, Hash, HashAlgorithm, Inventory, InventoryConfig, Package, PackageEntry, PackageIdentifier, Path, Peer,
    SunburstErrorKind, Version,
};
use tempfile::TempDir;

fn open_inventory() -> (Inventory, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = InventoryConfig::new(dir.path());
    (Inventory::open_read_write(&config).unwrap(), dir)
}

/// Scenario 1: hello blob.
#[test]
fn hello_blob() {
    let (mut inventory, dir) = open_inventory();
    let data = b"Hello.";
    let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, data);
    assert_eq!(
        hash.to_string(),
        "SHA2_256:2D8BD7D9BB5F85BA643F0110D50CB506A1FE439E769A22503193EA6046BB87F7"
    );

    let blob = Blob::new(data.len() as u64, "text/plain", hash.clone());
    let tx = inventory.begin().unwrap();
    tx.add_blob(&blob, Cursor::new(data)).unwrap();
    tx.commit().unwrap();
    inventory.close();

    let config = InventoryConfig::new(dir.path());
    let mut reader = Inventory::open_read_only(&config).unwrap();
    let tx = reader.begin().unwrap();
    let fetched = tx.blob_get(&hash).unwrap().unwrap();
    assert_eq!(fetched, blob);
}

/// Scenario 2: corrupted upload.
#[test]
fn corrupted_upload_leaves_no_trace() {
    let (mut inventory, dir) = open_inventory();
    let data = b"Hello.";
    let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, data);
    let blob = Blob::new(data.len() as u64, "text/plain", hash.clone());

    let tx = inventory.begin().unwrap();
    let err = tx.add_blob(&blob, Cursor::new(&data[..2])).unwrap_err();
    assert_eq!(err.kind(), SunburstErrorKind::HashMismatch);
    tx.commit().unwrap();
    inventory.close();

    let config = InventoryConfig::new(dir.path());
    let mut reader = Inventory::open_read_only(&config).unwrap();
    let tx = reader.begin().unwrap();
    assert!(tx.blob_list().unwrap().is_empty());

    let committed = dir.path().join("blob/SHA2_256/2D/8BD7D9BB5F85BA643F0110D50CB506A1FE439E769A22503193EA6046BB87F7.b");
    assert!(!committed.exists());
}

/// Scenario 3: missing blobs.
#[test]
fn putting_a_package_with_missing_blobs_fails() {
    let (mut inventory, _dir) = open_inventory();
    let identifier = PackageIdentifier::parse("com.io7m.example.main:1.0.0").unwrap();
    let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, b"twenty three bytes....");
    let entry = PackageEntry::new(Path::parse("/a/b/c").unwrap(), Blob::new(23, "application/octet-stream", hash));
    let package = Package::new(identifier).with_entry(entry);

    let tx = inventory.begin().unwrap();
    let err = tx.put_package(&package, Utc::now()).unwrap_err();
    assert_eq!(err.kind(), SunburstErrorKind::PackageMissingBlobs);
}

fn random_blob(seed: u64) -> (Blob, Vec<u8>) {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; 64];
    rng.fill(&mut data[..]);
    let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, &data);
    (Blob::new(data.len() as u64, "application/octet-stream", hash), data)
}

/// Scenario 4: snapshot update.
#[test]
fn snapshot_update_replaces_contents() {
    let (mut inventory, _dir) = open_inventory();
    let identifier = PackageIdentifier::parse("com.io7m.example.main:1.0.0-SNAPSHOT").unwrap();

    let first_blobs: Vec<_> = (0..1000).map(random_blob).collect();
    let tx = inventory.begin().unwrap();
    let mut package = Package::new(identifier.clone());
    for (index, (blob, data)) in first_blobs.iter().enumerate() {
        tx.add_blob(blob, Cursor::new(data)).unwrap();
        let path = Path::parse(&format!("/blob-{index:04}")).unwrap();
        package = package.with_entry(PackageEntry::new(path, blob.clone()));
    }
    tx.put_package(&package, Utc::now()).unwrap();
    tx.commit().unwrap();

    let second_blobs: Vec<_> = (500..1500).map(random_blob).collect();
    let tx = inventory.begin().unwrap();
    let mut package = Package::new(identifier.clone());
    for (index, (blob, data)) in second_blobs.iter().enumerate() {
        tx.add_blob(blob, Cursor::new(data)).unwrap();
        let path = Path::parse(&format!("/blob-{:04}", index + 500)).unwrap();
        package = package.with_entry(PackageEntry::new(path, blob.clone()));
    }
    tx.put_package(&package, Utc::now()).unwrap();

    let packages = tx.packages().unwrap();
    assert_eq!(packages.len(), 1);
    assert_eq!(packages[0], identifier);

    let unreferenced = tx.blobs_unreferenced().unwrap();
    assert_eq!(unreferenced.len(), 500);

    let yesterday = Utc::now() - Duration::days(1);
    let tomorrow = Utc::now() + Duration::days(1);
    assert_eq!(tx.packages_updated_since(yesterday).unwrap(), vec![identifier]);
    assert!(tx.packages_updated_since(tomorrow).unwrap().is_empty());

    tx.commit().unwrap();
}

/// Scenario 5: blob referenced.
#[test]
fn removing_a_referenced_blob_fails() {
    let (mut inventory, _dir) = open_inventory();
    let identifier = PackageIdentifier::parse("a.b.c:1.0.0").unwrap();
    let data = b"referenced bytes";
    let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, data);
    let blob = Blob::new(data.len() as u64, "application/octet-stream", hash.clone());

    let tx = inventory.begin().unwrap();
    tx.add_blob(&blob, Cursor::new(data)).unwrap();
    let package = Package::new(identifier).with_entry(PackageEntry::new(Path::parse("/x").unwrap(), blob.clone()));
    tx.put_package(&package, Utc::now()).unwrap();

    let err = tx.remove_blob(&hash).unwrap_err();
    assert_eq!(err.kind(), SunburstErrorKind::BlobReferenced);
    assert!(tx.blob_get(&hash).unwrap().is_some());
    tx.commit().unwrap();
}

struct FixedFactory(Peer);

impl PeerFactory for FixedFactory {
    fn open_peer(&self) -> anyhow::Result<Peer> {
        Ok(self.0.clone())
    }
}

/// Scenario 6: runtime resolve.
#[test]
fn runtime_resolve() {
    let (mut inventory, _dir) = open_inventory();
    let identifier = PackageIdentifier::parse("a.b.c:1.0.0").unwrap();
    let data = b"the entry's bytes";
    let hash = Hash::of_bytes(HashAlgorithm::Sha2_256, data);
    let blob = Blob::new(data.len() as u64, "application/octet-stream", hash.clone());

    let tx = inventory.begin().unwrap();
    tx.add_blob(&blob, Cursor::new(data)).unwrap();
    let package = Package::new(identifier).with_entry(PackageEntry::new(Path::parse("/x").unwrap(), blob.clone()));
    tx.put_package(&package, Utc::now()).unwrap();
    tx.commit().unwrap();

    let peer = Peer::new("com.io7m.sunburst.tests").with_import("a.b.c", Version::parse("1.0.0").unwrap());
    let loader = StaticServiceLoader::new().with_factory(move || Ok(Box::new(FixedFactory(peer.clone())) as Box<dyn PeerFactory>));

    let context = RuntimeContext::open(&mut inventory, &loader).unwrap();
    assert!(!context.is_failed());

    let path = Path::parse("/x").unwrap();
    let resolved = context
        .find_file(&mut inventory, "com.io7m.sunburst.tests", "a.b.c", &path)
        .unwrap();
    let resolved_bytes = std::fs::read(resolved).unwrap();
    assert_eq!(Hash::of_bytes(HashAlgorithm::Sha2_256, &resolved_bytes), hash);

    let err = context
        .find_file(&mut inventory, "not.imported", "a.b.c", &path)
        .unwrap_err();
    assert_eq!(err.kind(), SunburstErrorKind::PeerMissing);

    let err = context
        .find_file(&mut inventory, "com.io7m.sunburst.tests", "not.a.b.c", &path)
        .unwrap_err();
    assert_eq!(err.kind(), SunburstErrorKind::PeerImportMissing);
}
