pub mod logging;
pub mod sentry;
pub mod shell;
