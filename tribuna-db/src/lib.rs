pub mod client;
mod record;
