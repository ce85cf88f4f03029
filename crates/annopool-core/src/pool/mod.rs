//! The work pool: skeleton, live state, reservations and the sampler.

mod lease;
mod sampler;
mod skeleton;
mod state;

pub use lease::{Lease, LeaseTable};
pub use sampler::select_unit;
pub use skeleton::{Skeleton, SkeletonError};
pub use state::{CategoryPool, MarkOutcome, ObjectPool, PoolState};
