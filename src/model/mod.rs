pub mod client;
pub mod contract;
pub mod employee;
pub mod product;
pub mod role;
