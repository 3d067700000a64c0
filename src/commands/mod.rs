pub mod combine;
pub mod export;
pub mod fetch;
pub mod generate;
pub mod status;
pub mod translations;
