pub mod host;
pub mod periodic;

pub(crate) mod registry;

#[cfg(feature = "logging")]
pub(crate) mod log;

pub use host::HostHandler;
pub use periodic::PeriodicTaskHandler;

#[cfg(feature = "logging")]
pub use log::LogHandler;

pub(crate) use registry::HandlerRegistry;
