pub mod qr;
pub mod user;
