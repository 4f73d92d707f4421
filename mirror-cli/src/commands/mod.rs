pub mod context;
pub mod delete;
pub mod register;
pub mod status;
pub mod sync;
pub mod upload;
