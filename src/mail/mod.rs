pub mod clean;
pub mod decoders;
pub mod gmail_client;
