//! Resources managed by rhsm-register

mod rhsm_register;

pub use rhsm_register::RhsmRegister;
