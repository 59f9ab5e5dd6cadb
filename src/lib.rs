pub mod catalog;
pub mod data;
pub mod domain;
pub mod engine;
