//! Handlers following the module convention, used with
//! `register_handlers!`.

pub mod user_create;
pub mod user_get;
