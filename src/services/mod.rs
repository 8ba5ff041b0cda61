pub mod naming;
pub mod storage_service;
pub mod validation;
