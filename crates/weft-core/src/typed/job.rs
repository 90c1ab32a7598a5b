//! Job trait - ties a job type name to a payload type.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A kind of job the queue can carry.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ResizeImage {
///     asset_id: u64,
/// }
///
/// impl Job for ResizeImage {
///     const TYPE: &'static str = "assets.resize.v1";
///
///     fn describe(&self) -> String {
///         format!("Resizing asset {}", self.asset_id)
///     }
/// }
/// ```
///
/// The value itself is the payload; the code that runs it is a
/// `Handler<Self>` registered with the queue.
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Job type name, stored with every payload and used to find the handler.
    const TYPE: &'static str;

    /// Human-readable label shown in job listings.
    fn describe(&self) -> String {
        Self::TYPE.to_string()
    }
}
