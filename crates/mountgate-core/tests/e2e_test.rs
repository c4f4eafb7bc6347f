//! End-to-end tests for the propagation hook.
//!
//! Each test drives the full lifecycle the owning module would:
//! 1. Build a configuration
//! 2. Install the hook on an in-process host
//! 3. Route `attach_recursive_mnt` calls through the host
//! 4. Flip the control surface
//! 5. Tear down and inspect the report

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use mountgate_common::config::MountGateConfig;
use mountgate_common::constants::{MNT_SHARED, TARGET_SYMBOL};
use mountgate_common::logging::init_test_logging;
use mountgate_common::types::{MountFlags, ScopeMode, SymbolAddr};
use mountgate_core::MountGate;
use mountgate_core::host::InProcessHost;
use mountgate_core::mount::{Mount, MountRef};
use mountgate_core::symbol::SymbolTable;

const ADDR: SymbolAddr = SymbolAddr::new(0xffff_ffc0_102a_4e10);

fn symbols() -> SymbolTable {
    [(TARGET_SYMBOL, ADDR)].into_iter().collect()
}

fn install(config: &MountGateConfig) -> (MountGate, Arc<InProcessHost>) {
    init_test_logging();
    let host = Arc::new(InProcessHost::new());
    let gate = MountGate::init(config, &symbols(), host.clone()).expect("hook should install");
    (gate, host)
}

/// Runs one hooked call whose body reports whether `dest` looked shared.
fn attach(host: &InProcessHost, src: &MountRef, dest: &MountRef) -> bool {
    host.call(ADDR, Some(src), Some(dest), || i32::from(dest.is_shared())) == 1
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn paused_shared_destination_attached_as_private() {
    let (gate, host) = install(&MountGateConfig::default());
    gate.set_paused(true);

    let src = Mount::shared_ref(10, "/dev/block/loop0", MountFlags::default());
    let dest = Mount::shared_ref(11, "/data", MountFlags::from_bits(MNT_SHARED | 0x10));

    let observed = host.call(ADDR, Some(&src), Some(&dest), || {
        i32::try_from(dest.flags().bits()).unwrap()
    });
    assert_eq!(observed, 0x10);
    assert_eq!(dest.flags(), MountFlags::from_bits(MNT_SHARED | 0x10));

    let report = gate.teardown();
    assert_eq!(report.missed, 0);
    assert_eq!(report.stats.hits, 1);
    assert_eq!(report.stats.spoofed, 1);
    assert_eq!(report.stats.restored, 1);
}

#[test]
fn resumed_hook_leaves_flags_alone() {
    let (gate, host) = install(&MountGateConfig::default());
    let src = Mount::shared_ref(10, "/dev/block/loop0", MountFlags::default());
    let dest = Mount::shared_ref(11, "/data", MountFlags::SHARED);

    assert!(attach(&host, &src, &dest));
    gate.set_paused(true);
    assert!(!attach(&host, &src, &dest));
    gate.set_paused(false);
    assert!(attach(&host, &src, &dest));
    assert!(dest.is_shared());

    let report = gate.teardown();
    assert_eq!(report.stats.hits, 3);
    assert_eq!(report.stats.spoofed, 1);
}

#[test]
fn private_destination_untouched_while_paused() {
    let (gate, host) = install(&MountGateConfig::default());
    gate.set_paused(true);
    let src = Mount::shared_ref(10, "/dev/block/loop0", MountFlags::default());
    let dest = Mount::shared_ref(11, "/data", MountFlags::from_bits(0x20));

    assert!(!attach(&host, &src, &dest));
    assert_eq!(dest.flags(), MountFlags::from_bits(0x20));
    assert_eq!(gate.teardown().stats.spoofed, 0);
}

#[test]
fn toggle_during_call_does_not_affect_that_call() {
    let (gate, host) = install(&MountGateConfig::default());
    let src = Mount::shared_ref(10, "/dev/block/loop0", MountFlags::default());
    let dest = Mount::shared_ref(11, "/data", MountFlags::SHARED);

    gate.set_paused(true);
    let shared_inside = host.call(ADDR, Some(&src), Some(&dest), || {
        gate.set_paused(false);
        i32::from(dest.is_shared())
    });
    assert_eq!(shared_inside, 0);
    assert!(dest.is_shared());

    let shared_inside = host.call(ADDR, Some(&src), Some(&dest), || {
        gate.set_paused(true);
        i32::from(dest.is_shared())
    });
    assert_eq!(shared_inside, 1);
    assert!(dest.is_shared());

    let _ = gate.teardown();
}

#[test]
fn uninstalled_hook_no_longer_intercepts() {
    let (gate, host) = install(&MountGateConfig::default());
    gate.set_paused(true);
    let control = Arc::clone(gate.control());
    let _ = gate.teardown();

    let src = Mount::shared_ref(10, "/dev/block/loop0", MountFlags::default());
    let dest = Mount::shared_ref(11, "/data", MountFlags::SHARED);
    assert!(control.is_paused());
    assert!(attach(&host, &src, &dest));
}

#[test]
fn bootstrap_variant_narrows_to_trusted_device() {
    let config = MountGateConfig {
        scope: ScopeMode::Bootstrap,
        ..MountGateConfig::default()
    };
    let (gate, host) = install(&config);

    let loop_src = Mount::shared_ref(20, "/dev/block/loop12", MountFlags::default());
    let other_src = Mount::shared_ref(21, "/dev/block/dm-4", MountFlags::default());
    let dest = Mount::shared_ref(22, "/system", MountFlags::SHARED);

    // Before the signal everything is in scope, and the loop device is captured.
    assert!(!attach(&host, &loop_src, &dest));
    assert_eq!(gate.control().trusted_device(), Some("/dev/block/loop12"));
    assert!(!attach(&host, &other_src, &dest));

    assert!(gate.mark_bootstrap_started());
    assert!(!gate.mark_bootstrap_started());

    assert!(attach(&host, &other_src, &dest));
    assert!(!attach(&host, &loop_src, &dest));
    assert!(dest.is_shared());

    let report = gate.teardown();
    assert_eq!(report.stats.spoofed, 3);
    assert_eq!(report.stats.restored, 3);
}

#[test]
fn config_from_json_drives_init() {
    let config = MountGateConfig::from_json(
        r#"{ "symbol": "attach_recursive_mnt", "max_active": 2, "scope": "toggle" }"#,
    )
    .expect("config should parse");
    let (gate, _host) = install(&config);
    let report = gate.teardown();
    let json = serde_json::to_value(report).expect("report serializes");
    assert_eq!(json["missed"], 0);
    assert_eq!(json["stats"]["hits"], 0);
}

// ── Concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_calls_restore_every_destination() {
    const THREADS: u64 = 8;
    const CALLS: usize = 500;

    let (gate, host) = install(&MountGateConfig::default());
    gate.set_paused(true);

    let dests: Vec<MountRef> = (0..THREADS)
        .map(|i| {
            let bits = MNT_SHARED | (1 << (i + 1));
            Mount::shared_ref(100 + i, format!("/mnt/{i}"), MountFlags::from_bits(bits))
        })
        .collect();
    let src = Mount::shared_ref(1, "/dev/block/loop0", MountFlags::default());

    std::thread::scope(|s| {
        for (i, dest) in dests.iter().enumerate() {
            let host = &host;
            let src = &src;
            let gate = &gate;
            let _ = s.spawn(move || {
                for n in 0..CALLS {
                    if i == 0 && n % 50 == 0 {
                        gate.set_paused(n % 100 == 0);
                    }
                    let _ = attach(host, src, dest);
                }
            });
        }
    });

    for (i, dest) in dests.iter().enumerate() {
        assert_eq!(dest.flags().bits(), MNT_SHARED | (1 << (i + 1)));
    }
    let report = gate.teardown();
    assert_eq!(report.missed, 0);
    assert_eq!(report.stats.spoofed, report.stats.restored);
}

#[test]
fn concurrent_calls_on_one_destination_keep_it_shared() {
    const THREADS: usize = 8;
    const CALLS: usize = 500;

    let (gate, host) = install(&MountGateConfig::default());
    gate.set_paused(true);
    let src = Mount::shared_ref(1, "/dev/block/loop0", MountFlags::default());
    let dest = Mount::shared_ref(2, "/", MountFlags::from_bits(MNT_SHARED | 0x10));

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            let _ = s.spawn(|| {
                for _ in 0..CALLS {
                    let _ = attach(&host, &src, &dest);
                }
            });
        }
    });

    assert_eq!(dest.flags(), MountFlags::from_bits(MNT_SHARED | 0x10));
    let report = gate.teardown();
    assert_eq!(report.stats.spoofed, report.stats.restored);
}

#[test]
fn excess_concurrent_calls_bypass_hook() {
    const CAPACITY: usize = 4;
    const THREADS: usize = 8;

    let config = MountGateConfig {
        max_active: CAPACITY,
        ..MountGateConfig::default()
    };
    let (gate, host) = install(&config);
    gate.set_paused(true);

    let src = Mount::shared_ref(1, "/dev/block/loop0", MountFlags::default());
    let dests: Vec<MountRef> = (0..THREADS as u64)
        .map(|i| Mount::shared_ref(200 + i, format!("/mnt/{i}"), MountFlags::SHARED))
        .collect();
    let barrier = Barrier::new(THREADS);
    let saw_shared = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for dest in &dests {
            let (host, src, barrier, saw_shared) = (&host, &src, &barrier, &saw_shared);
            let _ = s.spawn(move || {
                let _ = host.call(ADDR, Some(src), Some(dest), || {
                    // Every frame is inside the call at once.
                    let _ = barrier.wait();
                    if dest.is_shared() {
                        let _ = saw_shared.fetch_add(1, Ordering::Relaxed);
                    }
                    0
                });
            });
        }
    });

    assert_eq!(saw_shared.load(Ordering::Relaxed), THREADS - CAPACITY);
    assert!(dests.iter().all(|d| d.is_shared()));
    let report = gate.teardown();
    assert_eq!(report.missed, (THREADS - CAPACITY) as u64);
    assert_eq!(report.stats.hits, CAPACITY as u64);
}
