pub mod dns;
pub mod domain;
pub mod patterns;
pub mod smtp;
