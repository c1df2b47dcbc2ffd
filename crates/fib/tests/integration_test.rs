//! Integration tests for entry resolution
//!
//! These drive the FIB through its public table and entry API and check
//! the forwarding it builds and the commands it hands to hardware.

use fib_dpo::{Dpo, HwCommand, LbBucket, RecordingQueue};
use fib_node::{BackWalkFlags, BackWalkReason, NodePtr, NodeType};
use fib_types::{DpoProto, FibPrefix, FibProtocol, InterfaceIndex, MplsLabel};
use pretty_assertions::assert_eq;
use vnet_fib::{
    ChainType, EntryFlags, EntryIndex, Fib, FibConfig, FibError, FibEvent, RoutePath, SourceKind,
    SourceStatus,
};

fn setup() -> (Fib, RecordingQueue) {
    setup_with(FibConfig::default())
}

fn setup_with(config: FibConfig) -> (Fib, RecordingQueue) {
    let queue = RecordingQueue::new();
    (Fib::new(config, Box::new(queue.clone())), queue)
}

fn pfx(s: &str) -> FibPrefix {
    s.parse().unwrap()
}

fn itf(index: u32) -> InterfaceIndex {
    InterfaceIndex::new(index)
}

fn nh(index: u32, addr: &str) -> RoutePath {
    RoutePath::attached(itf(index), addr.parse().unwrap())
}

fn glean(index: u32) -> RoutePath {
    RoutePath::attached_glean(DpoProto::Ip4, itf(index))
}

/// Buckets of the load-balance cached for `chain`.
fn buckets(fib: &Fib, entry: EntryIndex, chain: ChainType) -> Vec<LbBucket> {
    let dpo = fib
        .cached_forwarding(entry, chain)
        .unwrap()
        .expect("chain not built");
    let id = dpo.load_balance().expect("not a load-balance");
    fib.load_balance(id).unwrap().buckets().to_vec()
}

fn drop_bucket(proto: DpoProto) -> Vec<LbBucket> {
    vec![LbBucket::new(Dpo::Drop(proto), 1)]
}

#[test]
fn test_best_source_wins() {
    let (mut fib, _) = setup();
    let prefix = pfx("10.1.0.0/16");
    let entry = fib
        .table_entry_path_add(0, prefix, SourceKind::Cli, EntryFlags::NONE, &nh(1, "10.0.0.1"))
        .unwrap();
    assert_eq!(fib.get_best_source(entry).unwrap(), Some(SourceKind::Cli));

    fib.table_entry_path_add(0, prefix, SourceKind::Api, EntryFlags::NONE, &nh(2, "10.0.0.2"))
        .unwrap();
    assert_eq!(fib.get_best_source(entry).unwrap(), Some(SourceKind::Api));

    fib.table_entry_special_add(
        0,
        prefix,
        SourceKind::Special,
        EntryFlags::NONE,
        Dpo::Drop(DpoProto::Ip4),
    )
    .unwrap();
    assert_eq!(fib.get_best_source(entry).unwrap(), Some(SourceKind::Special));
    assert_eq!(
        buckets(&fib, entry, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );

    // Removing the winner hands forwarding back to the next best.
    fib.table_entry_special_remove(0, &prefix, SourceKind::Special)
        .unwrap();
    assert_eq!(fib.get_best_source(entry).unwrap(), Some(SourceKind::Api));
    assert_eq!(fib.get_resolving_interface(entry).unwrap(), Some(itf(2)));
}

#[test]
fn test_winner_switch_updates_load_balance_in_place() {
    let (mut fib, queue) = setup();
    let prefix = pfx("10.1.0.0/16");
    let entry = fib
        .create(0, prefix, SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    let before = fib.cached_forwarding(entry, ChainType::UnicastIp4).unwrap();
    queue.clear_log();
    fib.set_journal(true);

    fib.path_add(entry, SourceKind::Interface, EntryFlags::NONE, &nh(2, "10.0.0.2"))
        .unwrap();

    assert_eq!(
        fib.take_journal(),
        vec![
            FibEvent::Deactivated { entry, source: SourceKind::Api },
            FibEvent::Activated { entry, source: SourceKind::Interface },
            FibEvent::Installed { entry, source: SourceKind::Interface },
        ]
    );
    let log = queue.log();
    assert_eq!(log.len(), 1, "unexpected commands: {:?}", log);
    assert!(matches!(log[0], HwCommand::LoadBalanceUpdate { .. }));
    assert_eq!(
        fib.cached_forwarding(entry, ChainType::UnicastIp4).unwrap(),
        before
    );

    let sources = fib.get(entry).unwrap().sources();
    assert_eq!(sources.len(), 2);
    assert!(sources[0].is_active());
    assert!(!sources[1].is_active());
}

#[test]
fn test_last_path_removes_entry() {
    let (mut fib, queue) = setup();
    let prefix = pfx("192.168.0.0/24");
    let entry = fib
        .table_entry_path_add(0, prefix, SourceKind::Api, EntryFlags::NONE, &nh(1, "10.0.0.1"))
        .unwrap();
    fib.table_entry_path_add(0, prefix, SourceKind::Api, EntryFlags::NONE, &nh(2, "10.0.0.2"))
        .unwrap();
    assert_eq!(buckets(&fib, entry, ChainType::UnicastIp4).len(), 2);

    let status = fib
        .table_entry_path_remove(0, &prefix, SourceKind::Api, &nh(1, "10.0.0.1"))
        .unwrap();
    assert_eq!(status, SourceStatus::StillPresent);
    assert_eq!(buckets(&fib, entry, ChainType::UnicastIp4).len(), 1);
    queue.clear_log();

    let status = fib
        .table_entry_path_remove(0, &prefix, SourceKind::Api, &nh(2, "10.0.0.2"))
        .unwrap();
    assert_eq!(status, SourceStatus::NoSourcesLeft);
    assert!(queue.log().contains(&HwCommand::RouteWithdraw { table_id: 0, prefix }));
    assert!(queue
        .log()
        .iter()
        .any(|cmd| matches!(cmd, HwCommand::LoadBalanceTeardown { .. })));
    assert_eq!(fib.table_lookup_exact(0, &prefix), None);
    assert!(matches!(fib.get(entry), Err(FibError::EntryNotFound(e)) if e == entry));

    // Only the default route is left.
    assert_eq!(fib.table(FibProtocol::Ip4, 0).unwrap().len(), 1);
}

#[test]
fn test_path_references_are_counted() {
    let (mut fib, queue) = setup();
    let prefix = pfx("172.16.0.0/12");
    let path = nh(1, "10.0.0.1");
    let entry = fib
        .table_entry_path_add(0, prefix, SourceKind::Api, EntryFlags::NONE, &path)
        .unwrap();
    let pl = fib.get_path_list(entry).unwrap();
    queue.clear_log();

    fib.table_entry_path_add(0, prefix, SourceKind::Api, EntryFlags::NONE, &path)
        .unwrap();
    assert!(queue.log().is_empty());
    assert_eq!(fib.get_path_list(entry).unwrap(), pl);
    let src = fib.get(entry).unwrap().source(SourceKind::Api).unwrap();
    assert_eq!(src.path_refs(&path), Some(2));

    let status = fib
        .table_entry_path_remove(0, &prefix, SourceKind::Api, &path)
        .unwrap();
    assert_eq!(status, SourceStatus::StillPresent);
    assert_eq!(fib.get_path_list(entry).unwrap(), pl);
    assert!(fib.get(entry).unwrap().is_installed());

    let status = fib
        .table_entry_path_remove(0, &prefix, SourceKind::Api, &path)
        .unwrap();
    assert_eq!(status, SourceStatus::NoSourcesLeft);
}

#[test]
fn test_recursive_loop_forwards_to_drop() {
    let (mut fib, _) = setup();
    let a_prefix = pfx("1.1.1.1/32");
    let b_prefix = pfx("2.2.2.2/32");
    let a = fib
        .table_entry_path_add(
            0,
            a_prefix,
            SourceKind::Api,
            EntryFlags::NONE,
            &RoutePath::recursive(b_prefix, 0),
        )
        .unwrap();

    // The next hop got a placeholder entry; A forwards through it.
    let b = fib.table_lookup_exact(0, &b_prefix).unwrap();
    assert_eq!(
        fib.get_best_source(b).unwrap(),
        Some(SourceKind::RecursiveResolution)
    );
    let a_lb = fib.cached_forwarding(a, ChainType::UnicastIp4).unwrap();
    let b_lb = fib.cached_forwarding(b, ChainType::UnicastIp4).unwrap().unwrap();
    assert_eq!(buckets(&fib, a, ChainType::UnicastIp4)[0].dpo, b_lb);

    // B via A closes the loop.
    fib.table_entry_path_add(
        0,
        b_prefix,
        SourceKind::Api,
        EntryFlags::NONE,
        &RoutePath::recursive(a_prefix, 0),
    )
    .unwrap();
    let a_pl = fib.get_path_list(a).unwrap().unwrap();
    assert!(fib.path_list(a_pl).unwrap().is_looped());
    assert_eq!(fib.cached_forwarding(a, ChainType::UnicastIp4).unwrap(), a_lb);
    assert_eq!(
        buckets(&fib, a, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );
    assert_eq!(
        buckets(&fib, b, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );

    // Breaking it restores forwarding through B.
    fib.table_entry_path_remove(
        0,
        &b_prefix,
        SourceKind::Api,
        &RoutePath::recursive(a_prefix, 0),
    )
    .unwrap();
    assert!(!fib.path_list(a_pl).unwrap().is_looped());
    assert_eq!(fib.cached_forwarding(a, ChainType::UnicastIp4).unwrap(), a_lb);
    assert_eq!(buckets(&fib, a, ChainType::UnicastIp4)[0].dpo, b_lb);
}

#[test]
fn test_mpls_eos_served_from_payload_chain() {
    let (mut fib, _) = setup();
    let label = MplsLabel::new(100).unwrap();
    let eos = fib
        .create(
            0,
            FibPrefix::mpls_eos(label, DpoProto::Ip4),
            SourceKind::Mpls,
            EntryFlags::NONE,
            &[nh(1, "10.0.0.1")],
        )
        .unwrap();
    assert_eq!(fib.get(eos).unwrap().default_chain(), ChainType::UnicastIp4);

    let dpo = fib.contribute_forwarding(eos, ChainType::MplsEos).unwrap();
    assert_eq!(dpo.proto(), DpoProto::Ip4);
    assert_eq!(fib.cached_forwarding(eos, ChainType::MplsEos).unwrap(), None);
    assert_eq!(
        fib.cached_forwarding(eos, ChainType::UnicastIp4).unwrap(),
        Some(dpo)
    );
    fib.dpo_release(&dpo);

    let neos = fib
        .create(
            0,
            FibPrefix::mpls_non_eos(label),
            SourceKind::Mpls,
            EntryFlags::NONE,
            &[nh(1, "10.0.0.1")],
        )
        .unwrap();
    let dpo = fib.contribute_forwarding(neos, ChainType::MplsNonEos).unwrap();
    assert_eq!(dpo.proto(), DpoProto::Mpls);
    let lb = buckets(&fib, neos, ChainType::MplsNonEos);
    assert_eq!(lb.len(), 1);
    assert_eq!(lb[0].dpo.proto(), DpoProto::Mpls);
    fib.dpo_release(&dpo);

    // MPLS tables have no default route and match exactly.
    assert_eq!(fib.table(FibProtocol::Mpls, 0).unwrap().len(), 2);
}

#[test]
fn test_adjacency_source_waits_for_attached_cover() {
    let (mut fib, queue) = setup();
    let cover_prefix = pfx("10.0.0.0/24");
    let host_prefix = pfx("10.0.0.5/32");
    fib.table_entry_path_add(0, cover_prefix, SourceKind::Api, EntryFlags::NONE, &nh(1, "10.9.9.9"))
        .unwrap();

    let host = fib
        .table_entry_path_add(
            0,
            host_prefix,
            SourceKind::Adjacency,
            EntryFlags::NONE,
            &nh(1, "10.0.0.5"),
        )
        .unwrap();
    assert_eq!(fib.get_best_source(host).unwrap(), Some(SourceKind::Adjacency));
    assert!(!fib.get(host).unwrap().is_installed());
    assert_eq!(fib.contribute_ip_forwarding(host).unwrap(), None);
    queue.clear_log();

    // The cover becomes attached: the host installs.
    fib.table_entry_update(
        0,
        cover_prefix,
        SourceKind::Api,
        EntryFlags::ATTACHED,
        &[glean(1)],
    )
    .unwrap();
    assert!(fib.get(host).unwrap().is_installed());
    assert!(queue.log().iter().any(|cmd| matches!(
        cmd,
        HwCommand::RouteInstall { prefix, .. } if *prefix == host_prefix
    )));

    // And withdraws when the cover stops being attached.
    queue.clear_log();
    fib.table_entry_update(0, cover_prefix, SourceKind::Api, EntryFlags::NONE, &[glean(1)])
        .unwrap();
    assert!(!fib.get(host).unwrap().is_installed());
    assert!(queue.log().contains(&HwCommand::RouteWithdraw {
        table_id: 0,
        prefix: host_prefix
    }));
    assert_eq!(fib.get(host).unwrap().sources().len(), 1);
}

#[test]
fn test_inserted_prefix_becomes_cover() {
    let (mut fib, _) = setup();
    let host = fib
        .table_entry_path_add(
            0,
            pfx("10.0.0.5/32"),
            SourceKind::Adjacency,
            EntryFlags::NONE,
            &nh(1, "10.0.0.5"),
        )
        .unwrap();
    // Only the default route covers it, and that is not attached.
    assert!(!fib.get(host).unwrap().is_installed());

    let cover = fib
        .table_entry_path_add(
            0,
            pfx("10.0.0.0/24"),
            SourceKind::Interface,
            EntryFlags::ATTACHED,
            &glean(1),
        )
        .unwrap();
    assert!(fib.get(host).unwrap().is_installed());
    assert_eq!(
        fib.get(host).unwrap().source(SourceKind::Adjacency).unwrap().cover(),
        Some(cover)
    );
    assert_eq!(fib.get(cover).unwrap().covered_count(), 1);

    // Removing the cover falls back to the default route.
    fib.table_entry_delete(0, &pfx("10.0.0.0/24"), SourceKind::Interface)
        .unwrap();
    assert!(!fib.get(host).unwrap().is_installed());
    assert_ne!(
        fib.get(host).unwrap().source(SourceKind::Adjacency).unwrap().cover(),
        Some(cover)
    );
}

#[test]
fn test_interface_down_forwards_to_drop() {
    let (mut fib, _) = setup();
    let entry = fib
        .create(
            0,
            pfx("10.2.0.0/16"),
            SourceKind::Api,
            EntryFlags::NONE,
            &[nh(1, "10.0.0.1"), nh(2, "10.0.0.2")],
        )
        .unwrap();
    assert_eq!(buckets(&fib, entry, ChainType::UnicastIp4).len(), 2);

    fib.interface_state_change(itf(1), false);
    let lb = buckets(&fib, entry, ChainType::UnicastIp4);
    assert_eq!(lb.len(), 1);
    assert!(!lb[0].dpo.is_drop());

    fib.interface_state_change(itf(2), false);
    assert_eq!(
        buckets(&fib, entry, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );

    fib.interface_state_change(itf(1), true);
    fib.interface_state_change(itf(2), true);
    assert_eq!(buckets(&fib, entry, ChainType::UnicastIp4).len(), 2);
    assert_eq!(fib.contribute_urpf(entry).unwrap(), vec![itf(1), itf(2)]);
}

#[test]
fn test_stale_handle_is_rejected() {
    let (mut fib, _) = setup();
    let prefix = pfx("10.3.0.0/16");
    let entry = fib
        .create(0, prefix, SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    assert_eq!(
        fib.table_entry_delete(0, &prefix, SourceKind::Api).unwrap(),
        SourceStatus::NoSourcesLeft
    );

    // The slot is reused by the next entry, but the old handle stays dead.
    let next = fib
        .create(0, prefix, SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    assert_ne!(next, entry);
    assert!(matches!(fib.get(entry), Err(FibError::EntryNotFound(_))));
    assert!(matches!(
        fib.path_add(entry, SourceKind::Cli, EntryFlags::NONE, &nh(1, "10.0.0.1")),
        Err(FibError::EntryNotFound(_))
    ));
    assert!(matches!(fib.unlock(entry), Err(FibError::EntryNotFound(_))));
    assert!(fib.get(next).is_ok());
}

#[test]
fn test_duplicate_create_rejected() {
    let (mut fib, _) = setup();
    let prefix = pfx("10.4.0.0/16");
    fib.create(0, prefix, SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    assert!(matches!(
        fib.create(0, prefix, SourceKind::Cli, EntryFlags::NONE, &[nh(1, "10.0.0.1")]),
        Err(FibError::EntryExists { table_id: 0, .. })
    ));
    assert!(matches!(
        fib.create(0, pfx("10.5.0.0/16"), SourceKind::Api, EntryFlags::NONE, &[]),
        Err(FibError::InvalidPaths(_))
    ));
}

#[test]
fn test_entry_pool_exhaustion() {
    let (mut fib, _) = setup_with(FibConfig {
        max_entries: 2,
        ..FibConfig::default()
    });
    // The default route takes the first slot.
    fib.create(0, pfx("10.6.0.0/16"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    let err = fib
        .create(0, pfx("10.7.0.0/16"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap_err();
    assert!(matches!(err, FibError::PoolExhausted(_)));
    assert_eq!(fib.pool_size(), 2);
    assert_eq!(fib.table_lookup_exact(0, &pfx("10.7.0.0/16")), None);
}

#[test]
fn test_attached_export_imports_hosts() {
    let (mut fib, _) = setup();
    fib.interface_bind_table(FibProtocol::Ip4, itf(2), 1);
    let subnet = pfx("10.0.0.0/24");
    let host_a = pfx("10.0.0.5/32");
    let host_b = pfx("10.0.0.6/32");

    let exporter = fib
        .table_entry_path_add(1, subnet, SourceKind::Interface, EntryFlags::ATTACHED, &glean(2))
        .unwrap();
    fib.table_entry_path_add(1, host_a, SourceKind::Adjacency, EntryFlags::NONE, &nh(2, "10.0.0.5"))
        .unwrap();

    let importer = fib
        .table_entry_path_add(
            0,
            subnet,
            SourceKind::Interface,
            EntryFlags::ATTACHED | EntryFlags::IMPORT,
            &glean(2),
        )
        .unwrap();

    let import = fib.import_record(importer).unwrap();
    assert_eq!(import.export_table(), 1);
    assert_eq!(import.exporter(), exporter);
    assert_eq!(import.imported(), &[host_a]);
    assert_eq!(fib.export_record(exporter).unwrap().importers().len(), 1);
    assert_eq!(fib.get_best_source(exporter).unwrap(), Some(SourceKind::Interface));

    let copy = fib.table_lookup_exact(0, &host_a).unwrap();
    assert_eq!(fib.get_best_source(copy).unwrap(), Some(SourceKind::AttachedExport));
    assert_eq!(fib.encode(copy).unwrap(), vec![nh(2, "10.0.0.5")]);

    // Hosts learned later are pushed to the importer.
    fib.table_entry_path_add(1, host_b, SourceKind::Adjacency, EntryFlags::NONE, &nh(2, "10.0.0.6"))
        .unwrap();
    assert!(fib.table_lookup_exact(0, &host_b).is_some());

    // And hosts that go away are withdrawn.
    fib.table_entry_path_remove(1, &host_a, SourceKind::Adjacency, &nh(2, "10.0.0.5"))
        .unwrap();
    assert_eq!(fib.table_lookup_exact(0, &host_a), None);
    assert_eq!(fib.import_record(importer).unwrap().imported(), &[host_b]);

    // Deleting the importer purges everything it imported.
    fib.table_entry_delete(0, &subnet, SourceKind::Interface).unwrap();
    assert_eq!(fib.table_lookup_exact(0, &host_b), None);
    assert!(fib.export_record(exporter).is_none());
    assert!(fib.get(exporter).unwrap().source(SourceKind::AttachedExport).is_none());
    assert!(fib.table_lookup_exact(1, &host_b).is_some());
}

#[test]
fn test_memory_usage_counts_objects() {
    let (mut fib, _) = setup();
    fib.create(
        0,
        pfx("10.8.0.0/16"),
        SourceKind::Api,
        EntryFlags::NONE,
        &[nh(1, "10.0.0.1").with_labels(vec![MplsLabel::new(33).unwrap()])],
    )
    .unwrap();

    let usage = fib.memory_usage();
    let find = |name: &str| usage.iter().find(|u| u.name == name).unwrap().in_use;
    assert_eq!(find("Entry"), 2);
    assert_eq!(find("Entry Source"), 2);
    assert_eq!(find("Entry Path-Extensions"), 1);
    assert_eq!(find("Path-list"), 1);
    assert_eq!(find("Adjacency"), 1);
    assert!(fib.show_memory().contains("Path-list"));
}

#[test]
fn test_interface_walk_reaches_recursive_dependents() {
    let (mut fib, _) = setup();
    let via = fib
        .table_entry_path_add(0, pfx("10.0.0.1/32"), SourceKind::Api, EntryFlags::NONE, &nh(1, "10.0.0.1"))
        .unwrap();
    let route = fib
        .table_entry_path_add(
            0,
            pfx("192.168.0.0/16"),
            SourceKind::Api,
            EntryFlags::NONE,
            &RoutePath::recursive(pfx("10.0.0.1/32"), 0),
        )
        .unwrap();
    assert_eq!(fib.get(via).unwrap().child_count(), 1);
    fib.set_journal(true);

    fib.interface_state_change(itf(1), false);
    let journal = fib.take_journal();
    let via_pos = journal
        .iter()
        .position(|e| *e == FibEvent::Installed { entry: via, source: SourceKind::Api })
        .unwrap();
    let route_pos = journal
        .iter()
        .position(|e| *e == FibEvent::Installed { entry: route, source: SourceKind::Api })
        .unwrap();
    assert!(via_pos < route_pos);
    assert_eq!(
        buckets(&fib, via, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );
    assert_eq!(fib.get_resolving_interface(route).unwrap(), Some(itf(1)));
}

#[test]
fn test_path_add_to_winner_restarts_it() {
    let (mut fib, _) = setup();
    let entry = fib
        .create(0, pfx("10.3.0.0/16"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    fib.set_journal(true);

    fib.path_add(entry, SourceKind::Api, EntryFlags::NONE, &nh(2, "10.0.0.2"))
        .unwrap();
    assert_eq!(
        fib.take_journal()[..3],
        [
            FibEvent::Deactivated { entry, source: SourceKind::Api },
            FibEvent::Activated { entry, source: SourceKind::Api },
            FibEvent::Installed { entry, source: SourceKind::Api },
        ]
    );
    assert_eq!(buckets(&fib, entry, ChainType::UnicastIp4).len(), 2);

    fib.update(entry, SourceKind::Api, EntryFlags::NONE, &[nh(3, "10.0.0.3")])
        .unwrap();
    assert_eq!(
        fib.take_journal()[..2],
        [
            FibEvent::Deactivated { entry, source: SourceKind::Api },
            FibEvent::Activated { entry, source: SourceKind::Api },
        ]
    );
    assert_eq!(fib.get_resolving_interface(entry).unwrap(), Some(itf(3)));
}

#[test]
fn test_winner_gaining_local_tracks_cover() {
    let (mut fib, _) = setup();
    let cover = fib
        .table_entry_path_add(0, pfx("10.0.0.0/24"), SourceKind::Interface, EntryFlags::ATTACHED, &glean(1))
        .unwrap();
    let host = fib
        .table_entry_path_add(0, pfx("10.0.0.1/32"), SourceKind::Interface, EntryFlags::NONE, &nh(1, "10.0.0.1"))
        .unwrap();
    let src = |fib: &Fib| fib.get(host).unwrap().source(SourceKind::Interface).unwrap().cover();
    assert_eq!(src(&fib), None);

    fib.table_entry_update(0, pfx("10.0.0.1/32"), SourceKind::Interface, EntryFlags::LOCAL, &[nh(1, "10.0.0.1")])
        .unwrap();
    assert_eq!(fib.get_flags(host).unwrap(), EntryFlags::LOCAL);
    assert_eq!(src(&fib), Some(cover));
    assert_eq!(
        buckets(&fib, host, ChainType::UnicastIp4),
        vec![LbBucket::new(Dpo::Receive(DpoProto::Ip4), 1)]
    );

    // Dropping LOCAL again stops the tracking.
    fib.table_entry_update(0, pfx("10.0.0.1/32"), SourceKind::Interface, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    assert_eq!(src(&fib), None);
}

#[test]
fn test_entry_walks_children_with_evaluate() {
    let (mut fib, _) = setup();
    let via = fib
        .table_entry_path_add(0, pfx("10.0.0.1/32"), SourceKind::Api, EntryFlags::NONE, &nh(1, "10.0.0.1"))
        .unwrap();
    let route = fib
        .table_entry_path_add(
            0,
            pfx("192.168.0.0/16"),
            SourceKind::Api,
            EntryFlags::NONE,
            &RoutePath::recursive(pfx("10.0.0.1/32"), 0),
        )
        .unwrap();
    let via_pl = fib.get_path_list(via).unwrap().unwrap();
    let route_pl = fib.get_path_list(route).unwrap().unwrap();
    let nodes = [
        NodePtr::new(NodeType::PathList, via_pl.untyped()),
        NodePtr::new(NodeType::Entry, via.untyped()),
        NodePtr::new(NodeType::PathList, route_pl.untyped()),
        NodePtr::new(NodeType::Entry, route.untyped()),
    ];
    fib.set_journal(true);

    fib.interface_state_change(itf(1), false);
    let walked: Vec<(NodePtr, BackWalkReason, BackWalkFlags)> = fib
        .take_journal()
        .into_iter()
        .filter_map(|event| match event {
            FibEvent::Walked { node, reason, flags } if nodes.contains(&node) => {
                Some((node, reason, flags))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        walked,
        vec![
            (nodes[0], BackWalkReason::INTERFACE_DOWN, BackWalkFlags::FORCE_SYNC),
            (nodes[1], BackWalkReason::INTERFACE_DOWN, BackWalkFlags::FORCE_SYNC),
            (nodes[2], BackWalkReason::EVALUATE, BackWalkFlags::NONE),
            (nodes[3], BackWalkReason::EVALUATE, BackWalkFlags::NONE),
        ]
    );
}

#[test]
fn test_deleted_interface_stays_down() {
    let (mut fib, _) = setup();
    let entry = fib
        .create(0, pfx("10.4.0.0/16"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.1")])
        .unwrap();
    fib.interface_delete(itf(1));
    assert_eq!(
        buckets(&fib, entry, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );

    // A neighbour learned after the delete starts out down.
    let late = fib
        .create(0, pfx("10.5.0.0/16"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "10.0.0.9")])
        .unwrap();
    assert_eq!(
        buckets(&fib, late, ChainType::UnicastIp4),
        drop_bucket(DpoProto::Ip4)
    );

    fib.interface_state_change(itf(1), true);
    assert!(!buckets(&fib, late, ChainType::UnicastIp4)[0].dpo.is_drop());
    assert!(!buckets(&fib, entry, ChainType::UnicastIp4)[0].dpo.is_drop());
}
