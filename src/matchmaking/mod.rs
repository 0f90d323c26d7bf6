//! Matchmaking: pairs ready users into battles

pub mod pairing;

pub use pairing::evaluate;
