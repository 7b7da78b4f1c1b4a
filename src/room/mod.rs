//! Room lifecycle and process-wide directory

pub mod directory;
pub mod lifecycle;

pub use directory::RoomDirectory;
pub use lifecycle::{JoinInfo, Room, RoomCommand, RoomError, RoomHandle};
