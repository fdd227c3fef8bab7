//! Repository implementations

mod account;
mod balance;

pub use account::AccountRepo;
pub use balance::BalanceRepo;
