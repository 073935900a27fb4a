//! Background maintenance tasks spawned at startup.

pub mod janitor;
