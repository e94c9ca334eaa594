mod checkout;
mod clean;
mod snapshot;
mod status;
mod update;

pub use checkout::cmd_checkout;
pub use clean::cmd_clean;
pub use snapshot::cmd_snapshot;
pub use status::cmd_status;
pub use update::cmd_update;
