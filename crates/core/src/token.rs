//! Access/refresh token generation boundary.

/// Produces opaque token strings.
///
/// Implementations must be collision-free within practical bounds and must not
/// embed aggregate identity or secrets in the output. Calls may happen
/// concurrently from many dispatches.
pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

impl<T> TokenGenerator for std::sync::Arc<T>
where
    T: TokenGenerator + ?Sized,
{
    fn generate(&self) -> String {
        (**self).generate()
    }
}
