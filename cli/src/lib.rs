//! Command-line moderation for the locksmith site's comments database.

pub mod cli;
pub mod commands;
pub mod db;
