pub mod agent;
pub mod batch;
pub mod chat;
pub mod configuration;
pub mod cost;
pub mod errors;
pub mod fewshot;
pub mod finam;
pub mod generator;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod prompt_template;
pub mod providers;
pub mod systems;
