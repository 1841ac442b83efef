pub mod aggregate;
pub mod backup;
pub mod cleanup;
pub mod dispatch;
pub mod run;
pub mod shared;
pub mod status;
