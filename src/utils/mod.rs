pub mod form;
pub mod kood;
pub mod kood_index;
pub mod validation;
