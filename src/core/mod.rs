pub mod coordinator;
pub mod dao;
pub mod domain;
pub mod port;
pub mod use_case;
