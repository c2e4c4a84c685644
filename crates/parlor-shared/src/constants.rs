/// Maximum FLAP payload size accepted from a client.
pub const MAX_FLAP_PAYLOAD: usize = 65_535;

/// Maximum size of an opaque auth token.
pub const MAX_TOKEN_SIZE: usize = 1024;

/// Chat exchange used by AIM clients for public rooms.
pub const PUBLIC_CHAT_EXCHANGE: u16 = 4;

/// Capability UUID advertising chat support.
pub const CAP_CHAT: [u8; 16] = [
    0x74, 0x8F, 0x24, 0x20, 0x62, 0x87, 0x11, 0xD1, 0x82, 0x22, 0x44, 0x45, 0x53, 0x54, 0x00,
    0x00,
];
