pub mod account;
pub mod certificate;
pub mod company;
pub mod fiscal_document;
pub mod numbering;
pub mod response;
