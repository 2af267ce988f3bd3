use tokenforge_core::StreamId;

/// A command targets a specific aggregate stream.
///
/// Commands represent **intent** and are transient: they live for one dispatch
/// and are never persisted. Their outcome, accepted or rejected, is recorded
/// as events.
///
/// Commands must be:
/// - **Cloneable**: retried dispatches reuse the same command
/// - **Send + Sync + 'static**: dispatches may run on any thread
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable command name, used for logging.
    fn command_type(&self) -> &'static str;

    /// Stream of the aggregate this command is addressed to.
    ///
    /// Resolvable before any event exists for a brand-new aggregate.
    fn target_stream_id(&self) -> StreamId;
}
