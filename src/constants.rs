// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_CLIENT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1200;

// Game limits
pub const DEFAULT_MAX_ROUND: u32 = 13;
pub const DEFAULT_MAX_PLAYERS: usize = 6;
pub const MAX_ROUND_LIMIT: u32 = 13;
pub const MAX_PLAYERS_LIMIT: usize = 9;
pub const MAX_ROLLS_PER_TURN: u8 = 3;
pub const DICE_COUNT: usize = 5;

// Admission controller constants
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;
pub const DEFAULT_ADMISSION_PAUSE_MS: u64 = 100;

// Wire format
pub const SERVER_TAG: &str = "[SERVER]";
pub const NEED_RESPONSE: &str = "<NEED RESPONSE>";
pub const RETRIEVE_MARKER: &str = "(RETRIEVE)";
pub const REJECT_NOTICE: &str = "You can not send this request in current state.";
