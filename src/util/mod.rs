pub mod backpressure;

pub use backpressure::OverflowPolicy;
pub(crate) use backpressure::{evict_oldest, Admission, Bound, Sequenced};
