pub(crate) mod db;
pub mod settings;
pub mod storage;
