mod digest;

pub use digest::callback_digest;
