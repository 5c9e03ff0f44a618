use std::time::Duration;

/// PSM of the HID control channel.
pub const PSM_HIDP_CTRL: u16 = 0x0011;

/// PSM of the HID interrupt channel.
pub const PSM_HIDP_INTR: u16 = 0x0013;

/// PSM of the Service Discovery Protocol.
pub const PSM_SDP: u16 = 0x0001;

/// Default MTU for both HID channels (incoming and outgoing).
pub const HIDP_DEFAULT_MTU: u16 = 48;

/// L2CAP flush timeout meaning "never flush".
pub const FLUSH_TIMEOUT_INFINITE: u16 = 0xffff;

/// Default listen backlog for the two HID listeners.
pub const DEFAULT_BACKLOG: u32 = 10;

/// Upper bound on a single wait of the server loop.
///
/// Stale half-pairs are expired on this cadence even when no connection
/// arrives.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default idle timeout handed to the driver, in minutes.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: u32 = 30;

/// Default inquiry length in 1.28 s units (about 10 seconds).
pub const DEFAULT_INQUIRY_LENGTH: u8 = 8;

/// Longest inquiry the kernel accepts, in 1.28 s units.
pub const MAX_INQUIRY_LENGTH: u8 = 60;

/// How long an accepted half-pair waits for its partner channel.
pub const DEFAULT_PAIR_WINDOW: Duration = Duration::from_secs(5);

/// Shortest wait a half-pair is given, one server loop interval.
pub const MIN_PAIR_WINDOW: Duration = POLL_INTERVAL;

/// Capacity of the driver's device name field, including the NUL.
pub const HIDP_NAME_LEN: usize = 128;
