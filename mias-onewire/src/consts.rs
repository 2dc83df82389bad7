//! ROM command constants for 1-Wire communication.

/// Command to match a specific ROM address. Followed by the 8 address bytes, LSB first.
pub const ONEWIRE_MATCH_ROM_CMD: u8 = 0x55;

/// Command to address every device on the bus at once.
///
/// Only meaningful for commands that do not produce a response, or on a
/// single-drop bus. Reads after a skip ROM on a multidrop bus return the
/// wired-AND of all responders.
pub const ONEWIRE_SKIP_ROM_CMD: u8 = 0xcc;

/// Command to search for devices on the 1-Wire bus
pub const ONEWIRE_SEARCH_CMD: u8 = 0xf0;
