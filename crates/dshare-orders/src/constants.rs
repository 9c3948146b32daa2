/// Permits expire this many seconds after the latest block's timestamp.
pub const PERMIT_DEADLINE_SECS: u64 = 300;

/// Domain version assumed for tokens that don't expose `version()`.
pub const DEFAULT_TOKEN_VERSION: &str = "1";

/// Release file of the order processor contract, relative to the working directory.
pub const DEFAULT_DEPLOYMENT_PATH: &str = "lib/sbt-deployments/src/v0.3.0/order_processor.json";

/// Key under `networkAddresses` used when the chain has no explicit entry.
pub const DEFAULT_NETWORK_KEY: &str = "default";

/// BIP-44 derivation index used for mnemonic-based signers (`m/44'/60'/0'/0/0`).
pub const MNEMONIC_ACCOUNT_INDEX: u32 = 0;

/// Upper bound on broadcasting a transaction.
pub const SEND_TIMEOUT_SECS: u64 = 30;

/// Upper bound on waiting for a transaction receipt.
pub const RECEIPT_TIMEOUT_SECS: u64 = 60;

/// Delay between `eth_getTransactionReceipt` polls.
pub const RECEIPT_POLL_INTERVAL_SECS: u64 = 1;

/// Delay between `OrderFill` log queries in the fill listener.
pub const FILL_POLL_INTERVAL_SECS: u64 = 12;
