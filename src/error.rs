use crate::member::MemberId;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported by partitions and the [`RankIndex`](crate::RankIndex).
///
/// A failed operation leaves every structure exactly as it was before the call.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// An argument is outside its domain (zero identity, attribute outside
    /// `[1, S]`, zero delta, unknown partition, ...).
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A member with this identity is already registered.
    #[error("member {0} already exists")]
    AlreadyExists(MemberId),
    /// No member with this identity is registered.
    #[error("member {0} not found")]
    NotFound(MemberId),
    /// The query cannot be answered from the partition's current contents.
    #[error("insufficient data: {0}")]
    InsufficientData(&'static str),
    /// Memory for a bulk structural change could not be reserved.
    #[error("allocation failure")]
    AllocationFailure,
}
