// Domain modules

pub mod auth;
