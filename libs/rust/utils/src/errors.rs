//env
pub const SETTINGS_PATH_NOT_SET: &str = "NOUNIVERSE_SETTINGS_PATH not set!";
pub const GRAPH_API_KEY_NOT_SET: &str = "GRAPH_API_KEY not set!";
pub const ETHEREUM_RPC_URL_NOT_SET: &str = "ETHEREUM_RPC_URL not set!";

//settings
pub const SETTINGS_LOAD_FAILED: &str = "Failed to load settings";
pub const SETTINGS_PERSIST_FAILED: &str = "Failed to persist settings";
pub const UNKNOWN_WIDGET_KIND: &str = "Unknown widget kind";

//ipfs
pub const NO_PINNING_SERVICE_CONFIGURED: &str =
    "No IPFS upload service configured. Set Pinata or web3.storage credentials";
pub const GATEWAYS_EXHAUSTED: &str = "Failed to fetch from all IPFS gateways";
