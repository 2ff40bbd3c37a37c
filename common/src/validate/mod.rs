//! Validation of retrieved content

pub mod openpgp;
