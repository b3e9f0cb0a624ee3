pub mod config_cmd;
pub mod encode;
pub mod model;
