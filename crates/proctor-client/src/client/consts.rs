pub const PROCTOR_WS_URL: &str = "PROCTOR_WS_URL";

pub const BASE_URL: &str = "ws://localhost:8000";
pub const PROCTOR_PATH: &str = "ws/proctor";

pub const AUTHORIZATION_HEADER: &str = "Authorization";

pub const DEFAULT_CAPACITY: usize = 16;
