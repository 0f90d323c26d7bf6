//! Shared utilities

pub mod time;

use tokio::sync::mpsc;

/// Closest thing to an unbuffered channel: a send waits until the single
/// slot has been taken by the receiver.
pub fn rendezvous<T>() -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(1)
}
