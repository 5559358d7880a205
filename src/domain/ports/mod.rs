mod account_port;
mod channel_port;
mod credential_storage_port;

pub use account_port::AccountPort;
pub use channel_port::ChannelPort;
pub use credential_storage_port::CredentialStoragePort;
