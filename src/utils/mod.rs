pub mod cipher;
pub mod clock;
pub mod logging;
pub mod pkcs12;
