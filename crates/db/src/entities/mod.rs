//! `SeaORM` entity definitions.

pub mod accounts;
pub mod transactions;

pub mod prelude {
    //! Entity re-exports.
    pub use super::accounts::Entity as Accounts;
    pub use super::transactions::Entity as Transactions;
}
