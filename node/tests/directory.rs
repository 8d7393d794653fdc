//! Peer directory persistence against an in-memory record store.

use link_network::PeerDirectory;
use link_nullables::NullStore;
use link_store::{link_key, StoreError};
use link_types::{PeerAddrInfo, PeerFlags, PeerId};

fn peer(id: &str) -> PeerId {
    PeerId::parse(id).unwrap()
}

fn info(id: &str) -> PeerAddrInfo {
    PeerAddrInfo::new(peer(id), vec!["/ip4/10.0.0.1/tcp/4001".to_string()])
}

fn evict(dir: &PeerDirectory, id: &PeerId) {
    for _ in 0..=dir.max_attempts() {
        dir.record_failure(id);
    }
    assert!(!dir.contains(id));
}

#[test]
fn flush_then_restore_keeps_entries_and_flags() {
    let store = NullStore::new();
    let dir = PeerDirectory::new(3);
    dir.upsert(info("QmPeerA"));
    dir.upsert(info("QmPeerB"));
    dir.update_flags(&peer("QmPeerB"), |f| f.join = true);
    assert_eq!(dir.flush_to(&store).unwrap(), 2);

    let restored = PeerDirectory::new(3);
    assert_eq!(restored.restore_from(&store).unwrap(), 2);
    assert_eq!(restored.snapshot(), dir.snapshot());
    assert_eq!(
        restored.entry(&peer("QmPeerB")).unwrap().flags,
        PeerFlags {
            join: true,
            ..PeerFlags::default()
        }
    );
}

#[test]
fn flush_deletes_rows_of_evicted_peers() {
    let store = NullStore::new();
    let dir = PeerDirectory::new(1);
    dir.upsert(info("QmPeerA"));
    dir.upsert(info("QmPeerB"));
    dir.flush_to(&store).unwrap();

    evict(&dir, &peer("QmPeerA"));
    assert_eq!(dir.flush_to(&store).unwrap(), 1);
    assert_eq!(store.keys(), vec![link_key(&peer("QmPeerB"))]);
}

#[test]
fn relearned_peer_keeps_its_row() {
    let store = NullStore::new();
    let dir = PeerDirectory::new(1);
    dir.upsert(info("QmPeerA"));
    dir.flush_to(&store).unwrap();

    evict(&dir, &peer("QmPeerA"));
    assert!(dir.learn(info("QmPeerA")));
    dir.flush_to(&store).unwrap();
    assert_eq!(store.keys(), vec![link_key(&peer("QmPeerA"))]);
}

#[test]
fn failed_delete_is_retried_on_next_flush() {
    let store = NullStore::new();
    let dir = PeerDirectory::new(1);
    dir.upsert(info("QmPeerA"));
    dir.upsert(info("QmPeerB"));
    dir.flush_to(&store).unwrap();
    evict(&dir, &peer("QmPeerA"));

    store.set_unavailable(true);
    assert!(matches!(dir.flush_to(&store), Err(StoreError::Backend(_))));
    store.set_unavailable(false);

    assert_eq!(dir.flush_to(&store).unwrap(), 1);
    assert_eq!(store.keys(), vec![link_key(&peer("QmPeerB"))]);
}
