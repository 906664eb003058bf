pub mod certificate_service;
pub mod functional_patterns;
pub mod nfe_document_service;
pub mod numbering_service;
