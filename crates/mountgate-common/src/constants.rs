//! System-wide constants and defaults.

/// Shared-propagation bit in a mount's flags word (`MNT_SHARED`).
pub const MNT_SHARED: u32 = 0x1000;

/// Internal VFS function the hook attaches to.
pub const TARGET_SYMBOL: &str = "attach_recursive_mnt";

/// Default number of per-invocation slots (concurrent hooked calls).
pub const DEFAULT_MAX_ACTIVE: usize = 64;

/// Kernel symbol table exposed through procfs.
pub const DEFAULT_KALLSYMS_PATH: &str = "/proc/kallsyms";

/// Device path prefixes recognised as a trusted mount source before the
/// bootstrap signal.
pub const DEFAULT_TRUSTED_DEVICE_PREFIXES: &[&str] = &["/dev/block/loop", "/dev/loop"];

/// Default `tracing` filter directive when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";
