pub mod hex;
pub mod openpgp;
