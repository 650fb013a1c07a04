//! Transaction scopes.

use crate::Result;

/// An open transaction.
///
/// Dropping a scope without calling [`TransactionScope::commit`] rolls the
/// transaction back, so every early return and `?` path is covered.
pub trait TransactionScope {
    /// Commits all changes made since the scope was opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; the changes are rolled back.
    fn commit(self: Box<Self>) -> Result<()>;

    /// Discards all changes made since the scope was opened.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(self: Box<Self>) -> Result<()>;
}

/// Storage that can group writes into one atomic unit.
pub trait Transactional: Send + Sync {
    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction is already open or storage cannot be
    /// accessed.
    fn begin(&self) -> Result<Box<dyn TransactionScope + '_>>;
}
