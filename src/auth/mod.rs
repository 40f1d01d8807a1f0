pub mod broker;
pub mod extractor;
pub mod gate;
pub mod jwt;
pub mod password;
pub mod token;
pub mod verification;
