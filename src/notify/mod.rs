//! Notification fan-out: digest assembly and mail delivery

pub mod digest;
pub mod mailer;

pub use digest::{Digest, build_digest};
pub use mailer::{HttpMailer, Mailer};
