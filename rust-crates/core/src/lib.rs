pub mod api_client;

pub mod snapshot;

pub mod poller;

pub mod roller;

pub mod turn;

pub mod view;

mod error;

pub use error::RemoteError;

pub type Result<T, E = RemoteError> = std::result::Result<T, E>;
