pub mod camera;
pub mod clock;
pub mod machine;
pub mod registry;
pub mod runner;

pub use camera::{Camera, CameraError, Frame, SnapshotCamera};
pub use clock::{Clock, ManualClock, TokioClock};
pub use machine::{Effect, ExamDescriptor, SessionMachine};
pub use registry::{ActiveSession, SessionRegistry};
pub use runner::{Collaborators, SessionRunner};
