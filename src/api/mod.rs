pub mod auth;
pub mod client;
pub mod models;
pub mod player;

mod albums;
mod artists;
mod playlists;
mod tracks;
mod user;
