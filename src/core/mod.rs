pub mod protocol;
pub mod scheduler;
pub mod segments;
pub mod transform;

pub use protocol::{classify, serialize, ProtocolLine};
pub use scheduler::{ControlEvent, RelayContext, Scheduler, SchedulerState};
pub use segments::{Segment, Tick};
pub use transform::TimeTransformer;
