pub mod consent;
pub mod session;
