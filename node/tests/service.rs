//! End-to-end tests for the link service lifecycle over nullable
//! infrastructure.

use std::sync::Arc;
use std::time::Duration;

use link_network::Transport;
use link_node::{LinkConfig, LinkService, NodeError, StoreSet, CONFIG_FILE};
use link_nullables::{NullStore, NullTransport};
use link_protocol::{decode_hash, decode_peer, read_records, ProtocolId, MAX_RECORDS};
use link_store::RecordStore;
use link_types::{PeerAddrInfo, PeerId};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn peer(id: &str) -> PeerId {
    PeerId::parse(id).unwrap()
}

fn info(id: &str, ip: &str) -> PeerAddrInfo {
    PeerAddrInfo::new(peer(id), vec![format!("/ip4/{ip}/tcp/4001")])
}

struct Harness {
    transport: Arc<NullTransport>,
    records: Arc<NullStore>,
    peers: Arc<NullStore>,
    pins: Arc<NullStore>,
    service: LinkService,
}

fn harness(config: LinkConfig) -> Harness {
    let transport = Arc::new(NullTransport::new(peer("QmHome")));
    let records = Arc::new(NullStore::new());
    let peers = Arc::new(NullStore::new());
    let pins = Arc::new(NullStore::new());
    let stores = StoreSet {
        records: Arc::clone(&records) as Arc<dyn RecordStore>,
        peers: Arc::clone(&peers) as Arc<dyn RecordStore>,
        channels: Arc::new(NullStore::new()),
        pins: Arc::clone(&pins) as Arc<dyn RecordStore>,
    };
    let service = LinkService::new(config, stores, Arc::clone(&transport) as Arc<dyn Transport>);
    Harness {
        transport,
        records,
        peers,
        pins,
        service,
    }
}

async fn read_inbound(transport: &NullTransport, protocol: &ProtocolId) -> Vec<Vec<u8>> {
    let stream = transport
        .dispatch(protocol, peer("QmRemote"))
        .expect("handler registered");
    read_records(stream, MAX_RECORDS).await.expect("records")
}

// ---------------------------------------------------------------------------
// Start / handlers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_registers_both_protocols() {
    let h = harness(LinkConfig::default());
    let running = h.service.start().await.unwrap();

    assert!(h.transport.has_handler(&ProtocolId::peers()));
    assert!(h.transport.has_handler(&ProtocolId::hash()));
    assert!(!h.transport.has_handler(&ProtocolId::address()));

    running.shutdown().await.unwrap();
    assert_eq!(h.transport.handler_count(), 0);
}

#[tokio::test]
async fn failed_registration_leaves_no_handler_reachable() {
    let h = harness(LinkConfig::default());
    h.transport.reject_handler(&ProtocolId::hash());

    let err = h.service.start().await.err().expect("start must fail");
    assert!(matches!(err, NodeError::Network(_)));
    assert_eq!(h.transport.handler_count(), 0);
}

#[tokio::test]
async fn peer_exchange_serves_directory() {
    let h = harness(LinkConfig::default());
    let directory = Arc::clone(&h.service.context().directory);
    directory.upsert(info("QmPeerB", "10.0.0.2"));
    directory.upsert(info("QmPeerA", "10.0.0.1"));
    let running = h.service.start().await.unwrap();

    let records = read_inbound(&h.transport, &ProtocolId::peers()).await;
    let served: Vec<PeerAddrInfo> = records.iter().map(|r| decode_peer(r).unwrap()).collect();
    assert_eq!(served, vec![info("QmPeerA", "10.0.0.1"), info("QmPeerB", "10.0.0.2")]);

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn hash_announce_serves_pins_present_at_start() {
    let h = harness(LinkConfig::default());
    h.service.context().content.pin("Qm123").unwrap();
    let running = h.service.start().await.unwrap();

    let records = read_inbound(&h.transport, &ProtocolId::hash()).await;
    let hashes: Vec<String> = records.iter().map(|r| decode_hash(r).unwrap()).collect();
    assert_eq!(hashes, vec!["Qm123".to_string()]);

    running.shutdown().await.unwrap();
}

// ---------------------------------------------------------------------------
// Background loops
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn pin_changes_are_published_after_one_refresh_cycle() {
    let h = harness(LinkConfig::default());
    let ctx = Arc::clone(h.service.context());
    let running = h.service.start().await.unwrap();
    let cycle = ctx.config.pin_refresh_interval() + Duration::from_secs(1);

    assert!(ctx.tracker.get().is_empty());

    ctx.content.pin("QmNew").unwrap();
    assert!(!ctx.tracker.get().contains("QmNew"));
    tokio::time::sleep(cycle).await;
    assert!(ctx.tracker.get().contains("QmNew"));

    ctx.content.unpin("QmNew").unwrap();
    tokio::time::sleep(cycle).await;
    assert!(!ctx.tracker.get().contains("QmNew"));

    running.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_keeps_serving_last_snapshot() {
    let h = harness(LinkConfig::default());
    let ctx = Arc::clone(h.service.context());
    ctx.content.pin("QmKeep").unwrap();
    let running = h.service.start().await.unwrap();

    h.records.set_unavailable(true);
    tokio::time::sleep(ctx.config.pin_refresh_interval() + Duration::from_secs(1)).await;
    assert!(ctx.tracker.get().contains("QmKeep"));

    h.records.set_unavailable(false);
    running.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn discovery_syncs_connected_peers_and_their_peers() {
    let h = harness(LinkConfig::default());
    let ctx = Arc::clone(h.service.context());
    h.transport.add_connected(info("QmPeerA", "10.0.0.1"));
    let mut answer = peer_line(&info("QmPeerC", "10.0.0.3"));
    answer.extend(peer_line(&info("QmHome", "10.0.0.9")));
    h.transport.respond(&peer("QmPeerA"), &ProtocolId::peers(), answer);

    let running = h.service.start().await.unwrap();
    tokio::time::sleep(ctx.config.discovery_interval() + Duration::from_secs(1)).await;

    assert!(ctx.directory.contains(&peer("QmPeerA")));
    assert!(ctx.directory.contains(&peer("QmPeerC")));
    assert!(!ctx.directory.contains(&peer("QmHome")));
    assert_eq!(ctx.directory.failure_count(&peer("QmPeerA")), Some(0));

    running.shutdown().await.unwrap();
}

fn peer_line(info: &PeerAddrInfo) -> Vec<u8> {
    let mut line = link_protocol::encode_peer(info).unwrap();
    line.push(b'\n');
    line
}

#[tokio::test(start_paused = true)]
async fn backups_run_on_their_intervals() {
    let h = harness(LinkConfig::default());
    let ctx = Arc::clone(h.service.context());
    ctx.directory.upsert(info("QmPeerA", "10.0.0.1"));
    ctx.content.pin("QmA").unwrap();
    let running = h.service.start().await.unwrap();

    assert!(h.peers.is_empty());
    assert!(h.pins.is_empty());
    tokio::time::sleep(ctx.config.peer_backup_interval() + Duration::from_secs(1)).await;
    assert_eq!(h.peers.len(), 1);
    assert_eq!(h.pins.len(), 1);

    running.shutdown().await.unwrap();
}

// ---------------------------------------------------------------------------
// Shutdown / restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_flushes_and_closes_stores() {
    let h = harness(LinkConfig::default());
    h.service
        .context()
        .directory
        .upsert(info("QmPeerA", "10.0.0.1"));
    let running = h.service.start().await.unwrap();

    running.shutdown().await.unwrap();
    assert!(h.peers.is_closed());
    assert!(h.records.is_closed());
    assert!(h.pins.is_closed());
    assert!(h.transport.dispatch(&ProtocolId::peers(), peer("QmRemote")).is_none());
}

#[tokio::test]
async fn state_survives_restart_on_lmdb() {
    let repo = tempfile::tempdir().unwrap();
    let config = LinkConfig {
        map_size_mb: 16,
        ..LinkConfig::default()
    };

    let transport = Arc::new(NullTransport::new(peer("QmHome")));
    let service = LinkService::open(
        repo.path(),
        Some(config.clone()),
        Arc::clone(&transport) as Arc<dyn Transport>,
    )
    .unwrap();
    service.context().content.pin("QmKept").unwrap();
    service.context().directory.upsert(info("QmPeerA", "10.0.0.1"));
    service.start().await.unwrap().shutdown().await.unwrap();

    let service = LinkService::open(repo.path(), Some(config), transport).unwrap();
    let ctx = Arc::clone(service.context());
    let running = service.start().await.unwrap();
    assert_eq!(ctx.directory.get(&peer("QmPeerA")), Some(info("QmPeerA", "10.0.0.1")));
    assert!(ctx.tracker.get().contains("QmKept"));
    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn open_without_config_writes_default_file() {
    let repo = tempfile::tempdir().unwrap();
    let transport = Arc::new(NullTransport::new(peer("QmHome")));
    let service = LinkService::open(repo.path(), None, transport).unwrap();

    assert!(repo.path().join(CONFIG_FILE).exists());
    assert!(repo.path().join(".data").exists());
    assert_eq!(service.context().config, LinkConfig::default());
}
